//! Row structure for quarry.
//!
//! A `Row` holds the attribute values of one entity, indexed by attribute
//! position in its `EntityModel`, together with the version marker used for
//! optimistic concurrency control.

use crate::value::Value;
use alloc::vec::Vec;

/// The attribute values of one entity.
#[derive(Clone, Debug)]
pub struct Row {
    /// Version number for change detection. Incremented by storage on each update.
    version: u64,
    /// Values indexed by attribute position.
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row with the given values.
    /// Version 0 marks a row that has never been written to storage.
    pub fn new(values: Vec<Value>) -> Self {
        Self { version: 0, values }
    }

    /// Creates a new row with the given version and values.
    pub fn new_with_version(version: u64, values: Vec<Value>) -> Self {
        Self { version, values }
    }

    /// Creates a row of `len` nulls.
    pub fn nulls(len: usize) -> Self {
        Self::new(alloc::vec![Value::Null; len])
    }

    /// Returns the version number.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Sets the version number.
    #[inline]
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    /// Increments the version number and returns the new value.
    #[inline]
    pub fn increment_version(&mut self) -> u64 {
        self.version = self.version.wrapping_add(1);
        self.version
    }

    /// Returns a reference to the values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns a mutable reference to the values.
    #[inline]
    pub fn values_mut(&mut self) -> &mut Vec<Value> {
        &mut self.values
    }

    /// Consumes the row and returns its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Gets a value at the given attribute position.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Gets a mutable reference to a value at the given attribute position.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.values.get_mut(index)
    }

    /// Sets a value at the given attribute position.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        if index < self.values.len() {
            self.values[index] = value;
            true
        } else {
            false
        }
    }

    /// Returns the positions whose values differ from `other`.
    pub fn changed_positions(&self, other: &Row) -> Vec<usize> {
        let len = self.values.len().max(other.values.len());
        (0..len)
            .filter(|&i| self.values.get(i) != other.values.get(i))
            .collect()
    }

    /// Returns the number of values in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Eq for Row {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_row_new() {
        let row = Row::new(vec![Value::Int64(1), Value::String("member1".into())]);
        assert_eq!(row.version(), 0);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(1), Some(&Value::String("member1".into())));
    }

    #[test]
    fn test_row_set() {
        let mut row = Row::nulls(2);
        assert!(row.set(0, Value::Int32(10)));
        assert!(!row.set(5, Value::Int32(10)));
        assert_eq!(row.get(0), Some(&Value::Int32(10)));
    }

    #[test]
    fn test_row_version() {
        let mut row = Row::new_with_version(4, vec![]);
        assert_eq!(row.increment_version(), 5);
        row.set_version(1);
        assert_eq!(row.version(), 1);
        assert!(row.is_empty());
    }

    #[test]
    fn test_changed_positions() {
        let a = Row::new(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)]);
        let b = Row::new(vec![Value::Int32(1), Value::Int32(5), Value::Int32(3)]);
        assert_eq!(a.changed_positions(&b), vec![1]);
        assert!(a.changed_positions(&a).is_empty());
    }

    #[test]
    fn test_equality_ignores_version() {
        let a = Row::new_with_version(1, vec![Value::Int32(1)]);
        let b = Row::new_with_version(9, vec![Value::Int32(1)]);
        assert_eq!(a, b);
    }
}
