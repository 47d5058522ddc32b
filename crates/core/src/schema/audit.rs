//! Composable audit capabilities.
//!
//! An entity opts into any subset of the four audit fields. Each enabled
//! field becomes a nullable column appended to the entity's attributes.

use crate::types::DataType;

/// One of the four audited fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuditField {
    CreatedDate,
    LastModifiedDate,
    CreatedBy,
    LastModifiedBy,
}

impl AuditField {
    /// All fields in column order.
    pub const ALL: [AuditField; 4] = [
        AuditField::CreatedDate,
        AuditField::LastModifiedDate,
        AuditField::CreatedBy,
        AuditField::LastModifiedBy,
    ];

    /// Returns the attribute name used for this field.
    pub fn column_name(self) -> &'static str {
        match self {
            AuditField::CreatedDate => "created_date",
            AuditField::LastModifiedDate => "last_modified_date",
            AuditField::CreatedBy => "created_by",
            AuditField::LastModifiedBy => "last_modified_by",
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            AuditField::CreatedDate | AuditField::LastModifiedDate => DataType::DateTime,
            AuditField::CreatedBy | AuditField::LastModifiedBy => DataType::String,
        }
    }

    /// Creation fields are written once and never revised.
    pub fn is_creation(self) -> bool {
        matches!(self, AuditField::CreatedDate | AuditField::CreatedBy)
    }
}

/// The set of audit fields an entity carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuditCapabilities {
    pub creation_time: bool,
    pub modification_time: bool,
    pub creator: bool,
    pub modifier: bool,
}

impl AuditCapabilities {
    /// No auditing.
    pub const fn none() -> Self {
        Self {
            creation_time: false,
            modification_time: false,
            creator: false,
            modifier: false,
        }
    }

    /// Creation and modification timestamps only.
    pub const fn timestamps() -> Self {
        Self {
            creation_time: true,
            modification_time: true,
            creator: false,
            modifier: false,
        }
    }

    /// Timestamps plus creator and modifier identities.
    pub const fn full() -> Self {
        Self {
            creation_time: true,
            modification_time: true,
            creator: true,
            modifier: true,
        }
    }

    /// Returns the union of two capability sets.
    pub const fn with(self, other: AuditCapabilities) -> Self {
        Self {
            creation_time: self.creation_time || other.creation_time,
            modification_time: self.modification_time || other.modification_time,
            creator: self.creator || other.creator,
            modifier: self.modifier || other.modifier,
        }
    }

    pub fn has(&self, field: AuditField) -> bool {
        match field {
            AuditField::CreatedDate => self.creation_time,
            AuditField::LastModifiedDate => self.modification_time,
            AuditField::CreatedBy => self.creator,
            AuditField::LastModifiedBy => self.modifier,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.creation_time || self.modification_time || self.creator || self.modifier)
    }

    /// Iterates over the enabled fields in column order.
    pub fn fields(self) -> impl Iterator<Item = AuditField> {
        AuditField::ALL.into_iter().filter(move |f| self.has(*f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_capability_composition() {
        let caps = AuditCapabilities::timestamps().with(AuditCapabilities {
            creator: true,
            ..AuditCapabilities::none()
        });
        assert!(caps.has(AuditField::CreatedDate));
        assert!(caps.has(AuditField::CreatedBy));
        assert!(!caps.has(AuditField::LastModifiedBy));
    }

    #[test]
    fn test_fields_order() {
        let fields: Vec<_> = AuditCapabilities::full().fields().collect();
        assert_eq!(fields, AuditField::ALL.to_vec());
        assert!(AuditCapabilities::none().is_empty());
        assert_eq!(AuditCapabilities::none().fields().count(), 0);
    }

    #[test]
    fn test_creation_fields() {
        assert!(AuditField::CreatedDate.is_creation());
        assert!(!AuditField::LastModifiedDate.is_creation());
        assert_eq!(AuditField::CreatedBy.data_type(), DataType::String);
    }
}
