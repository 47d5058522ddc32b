//! Identity-keyed cache of the entities a unit of work has loaded.
//!
//! Each entry keeps the row as last read from or written to storage (the
//! snapshot) next to the row the caller has modified (current). An entry
//! is dirty when the two differ. Flushing writes dirty entries and then
//! resets their snapshot.

use log::trace;
use quarry_core::{Error, Result, Row, Value};
use std::collections::BTreeMap;

/// Entity type plus identity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub entity: String,
    pub identity: Value,
}

impl EntityKey {
    pub fn new(entity: impl Into<String>, identity: Value) -> Self {
        Self {
            entity: entity.into(),
            identity,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub snapshot: Row,
    pub current: Row,
    /// Loaded through a read-only query: never flushed.
    pub read_only: bool,
    /// Scheduled for deletion at the next flush.
    pub removed: bool,
    /// Version must be checked at the next flush even if clean.
    pub verify: bool,
    /// Version when the entity entered this working set.
    base_version: u64,
}

impl Entry {
    fn new(row: Row, read_only: bool) -> Self {
        Self {
            base_version: row.version(),
            snapshot: row.clone(),
            current: row,
            read_only,
            removed: false,
            verify: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.snapshot.values() != self.current.values()
    }

    /// Version of the row as last seen in storage.
    pub fn version(&self) -> u64 {
        self.snapshot.version()
    }

    /// True when `version` was observed by this unit of work, i.e. a caller
    /// holding a copy at that version is not working from stale state.
    pub fn accepts(&self, version: u64) -> bool {
        version >= self.base_version && version <= self.current.version()
    }

    fn is_pending(&self) -> bool {
        self.removed || (!self.read_only && (self.is_dirty() || self.verify))
    }
}

#[derive(Debug, Default)]
pub(crate) struct WorkingSet {
    entries: BTreeMap<EntityKey, Entry>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Registers a row read from storage and returns the managed row.
    ///
    /// An entity already in the set keeps its current state: a query never
    /// overwrites unflushed changes. A read-write load clears the read-only
    /// flag of an existing entry.
    pub fn load(&mut self, key: EntityKey, row: Row, read_only: bool) -> &Row {
        let entry = self
            .entries
            .entry(key)
            .and_modify(|existing| {
                if !read_only {
                    existing.read_only = false;
                }
                trace!("event=entity_merged module=working_set version={}", existing.version());
            })
            .or_insert_with(|| Entry::new(row, read_only));
        &entry.current
    }

    /// Registers a row that was just written, replacing any entry.
    pub fn put(&mut self, key: EntityKey, row: Row) {
        self.entries.insert(key, Entry::new(row, false));
    }

    /// Replaces the caller-visible row of a managed entity.
    pub fn update_current(&mut self, key: &EntityKey, mut row: Row) -> Result<()> {
        let entry = self.entries.get_mut(key).ok_or_else(|| unmanaged(key))?;
        row.set_version(entry.current.version());
        entry.current = row;
        Ok(())
    }

    /// Replaces both snapshot and current state with a fresh storage read.
    pub fn refresh(&mut self, key: &EntityKey, row: Row) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.base_version = row.version();
            entry.snapshot = row.clone();
            entry.current = row;
        }
    }

    pub fn mark_removed(&mut self, key: &EntityKey) -> Result<()> {
        let entry = self.entries.get_mut(key).ok_or_else(|| unmanaged(key))?;
        entry.removed = true;
        Ok(())
    }

    pub fn mark_verify(&mut self, key: &EntityKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.verify = true;
        }
    }

    /// Records a successful write of `key` at `version`.
    pub fn written(&mut self, key: &EntityKey, version: u64) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.current.set_version(version);
            entry.snapshot = entry.current.clone();
            entry.verify = false;
        }
    }

    pub fn forget(&mut self, key: &EntityKey) -> Option<Entry> {
        self.entries.remove(key)
    }

    /// Evicts entries of `entity`; all of them when `identities` is `None`.
    ///
    /// Fails without evicting anything when a target entry has unflushed
    /// changes. Returns the number of evicted entries.
    pub fn invalidate(&mut self, entity: &str, identities: Option<&[Value]>) -> Result<usize> {
        let targets: Vec<EntityKey> = self
            .entries
            .iter()
            .filter(|(key, _)| key.entity == entity)
            .filter(|(key, _)| identities.map_or(true, |ids| ids.contains(&key.identity)))
            .map(|(key, _)| key.clone())
            .collect();
        if let Some(dirty) = targets.iter().find(|key| {
            self.entries
                .get(*key)
                .map_or(false, |e| e.removed || (!e.read_only && e.is_dirty()))
        }) {
            return Err(Error::cache_invalidation(format!(
                "{}#{} has unflushed changes",
                dirty.entity, dirty.identity
            )));
        }
        for key in &targets {
            self.entries.remove(key);
        }
        Ok(targets.len())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys with work for the next flush, in key order.
    pub fn pending_keys(&self) -> Vec<EntityKey> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_pending())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.entries.values().any(Entry::is_pending)
    }
}

fn unmanaged(key: &EntityKey) -> Error {
    Error::invalid_operation(format!("{}#{} is not managed", key.entity, key.identity))
}
