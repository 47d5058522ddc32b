//! Row lock table.
//!
//! Locks are exclusive, keyed by `(entity, identity)` and held until the
//! owning transaction ends. The table itself never blocks: `try_acquire`
//! either grants every requested lock or none of them, and reports the
//! first conflicting row. Waiting is left to the engine.

use crate::TxId;
use hashbrown::{HashMap, HashSet};
use quarry_core::Value;

/// A lockable row.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub entity: String,
    pub identity: Value,
}

impl LockKey {
    pub fn new(entity: impl Into<String>, identity: Value) -> Self {
        Self {
            entity: entity.into(),
            identity,
        }
    }
}

/// A request that conflicts with a lock held elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blocked {
    pub key: LockKey,
    pub holder: TxId,
}

#[derive(Debug, Default)]
pub struct LockTable {
    holders: HashMap<LockKey, TxId>,
    held: HashMap<TxId, HashSet<LockKey>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants exclusive locks on every identity, or none.
    ///
    /// Locks already held by `tx` are re-entrant.
    pub fn try_acquire(
        &mut self,
        tx: TxId,
        entity: &str,
        identities: &[Value],
    ) -> Result<(), Blocked> {
        for identity in identities {
            let key = LockKey::new(entity, identity.clone());
            if let Some(&holder) = self.holders.get(&key) {
                if holder != tx {
                    return Err(Blocked { key, holder });
                }
            }
        }
        for identity in identities {
            let key = LockKey::new(entity, identity.clone());
            self.holders.insert(key.clone(), tx);
            self.held.entry(tx).or_default().insert(key);
        }
        Ok(())
    }

    /// Releases every lock held by `tx` and returns how many were held.
    pub fn release_all(&mut self, tx: TxId) -> usize {
        let Some(keys) = self.held.remove(&tx) else {
            return 0;
        };
        for key in &keys {
            self.holders.remove(key);
        }
        keys.len()
    }

    /// Returns the transaction holding the row lock, if any.
    pub fn holder(&self, entity: &str, identity: &Value) -> Option<TxId> {
        self.holders
            .get(&LockKey::new(entity, identity.clone()))
            .copied()
    }

    pub fn holds(&self, tx: TxId, entity: &str, identity: &Value) -> bool {
        self.holder(entity, identity) == Some(tx)
    }

    /// Returns the number of locks held by `tx`.
    pub fn held_by(&self, tx: TxId) -> usize {
        self.held.get(&tx).map_or(0, HashSet::len)
    }
}
