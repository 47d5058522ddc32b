//! Unresolved query plans.

use crate::ast::{Assignment, Predicate};
use crate::projection::Projection;
use crate::sort::Sort;
use crate::statement::JoinKind;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// What a plan does with the rows its filter selects.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Action {
    #[default]
    Select,
    Count,
    Exists,
    /// Loads matching entities and removes them through the working set.
    Delete,
    /// Updates matching rows directly in storage.
    BulkUpdate(Vec<Assignment>),
    /// Deletes matching rows directly in storage.
    BulkDelete,
}

impl Action {
    /// Returns true for actions that bypass the working set.
    pub fn is_bulk(&self) -> bool {
        matches!(self, Action::BulkUpdate(_) | Action::BulkDelete)
    }
}

/// Concurrency control requested for the rows a plan reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LockMode {
    #[default]
    None,
    /// Verify the version of every loaded row when the unit of work commits.
    Optimistic,
    /// Exclusive storage row locks held until the unit of work ends.
    Pessimistic,
}

/// A join written out in query text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinSpec {
    pub relation: String,
    pub kind: JoinKind,
    pub fetch: bool,
}

/// A plan skeleton: what to query, before any path is resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    pub entity: String,
    pub action: Action,
    pub distinct: bool,
    pub filter: Predicate,
    pub projection: Projection,
    pub sort: Sort,
    /// Row cap from `First<N>`/`Top<N>`.
    pub limit: Option<usize>,
    pub joins: Vec<JoinSpec>,
    /// Fetch-graph hints: relations to load eagerly.
    pub fetch: Vec<String>,
    pub lock: LockMode,
    pub read_only: bool,
}

impl QueryPlan {
    /// A plan selecting every entity of `entity`.
    pub fn select(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            action: Action::Select,
            distinct: false,
            filter: Predicate::no_op(),
            projection: Projection::Entity,
            sort: Sort::unsorted(),
            limit: None,
            joins: Vec::new(),
            fetch: Vec::new(),
            lock: LockMode::None,
            read_only: false,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_join(mut self, relation: &str, kind: JoinKind, fetch: bool) -> Self {
        self.joins.push(JoinSpec {
            relation: relation.to_string(),
            kind,
            fetch,
        });
        self
    }

    /// Adds fetch-graph hints.
    pub fn with_fetch(mut self, relations: &[&str]) -> Self {
        for relation in relations {
            if !self.fetch.iter().any(|r| r == relation) {
                self.fetch.push(relation.to_string());
            }
        }
        self
    }

    pub fn with_lock(mut self, lock: LockMode) -> Self {
        self.lock = lock;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }
}
