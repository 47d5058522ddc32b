//! Attribute definition for entity models.

use super::audit::AuditField;
use crate::types::DataType;
use crate::value::Value;
use alloc::string::String;

/// The role an attribute plays in its entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    /// The identity attribute.
    Id,
    /// A plain value attribute.
    Basic,
    /// The foreign key backing a many-to-one relation of the same name.
    ForeignKey { target: String },
    /// A column maintained by the auditing interceptor.
    Audit(AuditField),
}

/// An attribute definition in an entity model.
#[derive(Clone, Debug)]
pub struct Attribute {
    name: String,
    data_type: DataType,
    nullable: bool,
    kind: AttributeKind,
    /// Position of the attribute's value in a `Row` (0-based).
    position: usize,
}

impl Attribute {
    /// Creates a new basic attribute.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: data_type.is_nullable_by_default(),
            kind: AttributeKind::Basic,
            position: 0,
        }
    }

    /// Sets whether this attribute is nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub(crate) fn with_kind(mut self, kind: AttributeKind) -> Self {
        self.kind = kind;
        self
    }

    pub(crate) fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns true for attributes callers set directly (not id, audit or FK).
    pub fn is_basic(&self) -> bool {
        self.kind == AttributeKind::Basic
    }

    /// Returns the value a freshly constructed entity holds for this attribute.
    pub fn initial_value(&self) -> Value {
        if self.nullable || self.kind != AttributeKind::Basic {
            Value::Null
        } else {
            Value::default_for_type(self.data_type)
        }
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.data_type == other.data_type
    }
}
