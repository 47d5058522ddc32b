//! Many-to-one relationship hops.

use alloc::string::String;

/// A declared many-to-one relation from one entity to another.
///
/// The relation is backed by a foreign-key attribute of the same name
/// holding the target's identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    name: String,
    target: String,
    fk_position: usize,
}

impl Relation {
    pub(crate) fn new(name: impl Into<String>, target: impl Into<String>, fk_position: usize) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            fk_position,
        }
    }

    /// Returns the relation name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the target entity name.
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the row position of the foreign-key value.
    #[inline]
    pub fn fk_position(&self) -> usize {
        self.fk_position
    }
}
