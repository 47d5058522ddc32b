//! Lock mode handling for reads.

use quarry_query::statement::Select;
use quarry_query::LockMode;
use std::time::Duration;

/// Translates a requested lock mode into statement options and flush work.
#[derive(Clone, Copy, Debug)]
pub struct LockCoordinator {
    timeout: Duration,
}

impl LockCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pessimistic reads ask storage for exclusive row locks.
    pub fn apply(&self, select: &mut Select, mode: LockMode) {
        select.lock = match mode {
            LockMode::Pessimistic => Some(self.timeout),
            LockMode::None | LockMode::Optimistic => None,
        };
    }

    /// Optimistic reads have their versions checked when the unit of work flushes.
    pub fn verifies(&self, mode: LockMode) -> bool {
        mode == LockMode::Optimistic
    }
}
