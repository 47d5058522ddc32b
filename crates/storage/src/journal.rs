//! Per-transaction undo journal.
//!
//! Writes are applied to the tables immediately; the journal remembers
//! enough to put every touched row back if the transaction rolls back.

use crate::table::Table;
use hashbrown::HashMap;
use quarry_core::{Row, Value};

/// A single recorded change.
#[derive(Clone, Debug)]
pub enum JournalEntry {
    Insert {
        entity: String,
        identity: Value,
    },
    Update {
        entity: String,
        identity: Value,
        old: Row,
    },
    Delete {
        entity: String,
        identity: Value,
        row: Row,
    },
}

impl JournalEntry {
    pub fn entity(&self) -> &str {
        match self {
            JournalEntry::Insert { entity, .. }
            | JournalEntry::Update { entity, .. }
            | JournalEntry::Delete { entity, .. } => entity,
        }
    }

    pub fn identity(&self) -> &Value {
        match self {
            JournalEntry::Insert { identity, .. }
            | JournalEntry::Update { identity, .. }
            | JournalEntry::Delete { identity, .. } => identity,
        }
    }
}

#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_insert(&mut self, entity: &str, identity: Value) {
        self.entries.push(JournalEntry::Insert {
            entity: entity.into(),
            identity,
        });
    }

    pub fn record_update(&mut self, entity: &str, identity: Value, old: Row) {
        self.entries.push(JournalEntry::Update {
            entity: entity.into(),
            identity,
            old,
        });
    }

    pub fn record_delete(&mut self, entity: &str, identity: Value, row: Row) {
        self.entries.push(JournalEntry::Delete {
            entity: entity.into(),
            identity,
            row,
        });
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Undoes every entry, newest first, and returns how many were undone.
    pub fn rollback(self, tables: &mut HashMap<String, Table>) -> usize {
        let undone = self.entries.len();
        for entry in self.entries.into_iter().rev() {
            let Some(table) = tables.get_mut(entry.entity()) else {
                continue;
            };
            match entry {
                JournalEntry::Insert { identity, .. } => {
                    table.delete(&identity);
                }
                JournalEntry::Update { identity, old, .. } => table.restore(identity, old),
                JournalEntry::Delete { identity, row, .. } => table.restore(identity, row),
            }
        }
        undone
    }
}
