//! Row storage for one entity.
//!
//! Rows are keyed by identity and scanned in identity order. Generated
//! identities come from a per-table sequence that is never rolled back.

use quarry_core::schema::{EntityModel, IdStrategy};
use quarry_core::{DataType, Error, Result, Row, Value};
use std::collections::BTreeMap;

pub struct Table {
    model: EntityModel,
    rows: BTreeMap<Value, Row>,
    sequence: i64,
}

impl Table {
    pub fn new(model: EntityModel) -> Self {
        Self {
            model,
            rows: BTreeMap::new(),
            sequence: 0,
        }
    }

    pub fn model(&self) -> &EntityModel {
        &self.model
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, identity: &Value) -> Option<&Row> {
        self.rows.get(identity)
    }

    pub fn scan(&self) -> impl Iterator<Item = (&Value, &Row)> {
        self.rows.iter()
    }

    /// Fills in a generated identity when the row carries none.
    ///
    /// Explicit identities on generated entities are accepted and advance
    /// the sequence past them.
    pub fn assign_identity(&mut self, row: &mut Row) -> Result<Value> {
        let id_position = self.model.id_position();
        let current = self.model.identity_of(row).clone();
        match self.model.id_strategy() {
            IdStrategy::Generated if current.is_default_identity() => {
                self.sequence += 1;
                let identity = match self.model.id().data_type() {
                    DataType::Int32 => i32::try_from(self.sequence)
                        .map(Value::Int32)
                        .map_err(|_| Error::storage(format!("{} sequence exhausted", self.model.name())))?,
                    _ => Value::Int64(self.sequence),
                };
                row.set(id_position, identity.clone());
                Ok(identity)
            }
            IdStrategy::Generated => {
                if let Some(n) = current.as_i64() {
                    self.sequence = self.sequence.max(n);
                } else if let Some(n) = current.as_i32() {
                    self.sequence = self.sequence.max(i64::from(n));
                }
                Ok(current)
            }
            IdStrategy::Assigned if current.is_default_identity() => Err(Error::invalid_operation(
                format!("{} requires an assigned identity before insert", self.model.name()),
            )),
            IdStrategy::Assigned => Ok(current),
        }
    }

    /// Stores a new row at version 1.
    pub fn insert(&mut self, identity: Value, mut row: Row) -> Result<&Row> {
        self.model.check_row(&row)?;
        if self.rows.contains_key(&identity) {
            return Err(Error::storage(format!(
                "duplicate identity {}#{}",
                self.model.name(),
                identity
            )));
        }
        row.set_version(1);
        Ok(self.rows.entry(identity).or_insert(row))
    }

    /// Replaces a stored row, bumping its version. Returns the previous row.
    pub fn update(&mut self, identity: &Value, mut row: Row) -> Result<Row> {
        self.model.check_row(&row)?;
        if self.model.identity_of(&row) != identity {
            return Err(Error::invalid_operation(format!(
                "identity of {}#{} cannot change",
                self.model.name(),
                identity
            )));
        }
        let stored = self.rows.get_mut(identity).ok_or_else(|| {
            Error::storage(format!("{}#{} does not exist", self.model.name(), identity))
        })?;
        row.set_version(stored.version().wrapping_add(1));
        Ok(std::mem::replace(stored, row))
    }

    pub fn delete(&mut self, identity: &Value) -> Option<Row> {
        self.rows.remove(identity)
    }

    /// Puts a row back exactly as it was, version included.
    pub fn restore(&mut self, identity: Value, row: Row) {
        self.rows.insert(identity, row);
    }
}
