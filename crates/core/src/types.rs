//! Data type definitions for entity attributes.

/// Supported attribute types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type (true/false)
    Boolean,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point number
    Float64,
    /// UTF-8 string
    String,
    /// Date and time stored as Unix timestamp (milliseconds)
    DateTime,
    /// Binary data
    Bytes,
}

impl DataType {
    /// Returns whether this type is nullable by default.
    pub fn is_nullable_by_default(&self) -> bool {
        matches!(self, DataType::Bytes)
    }

    /// Returns whether values of this type are totally ordered and usable as identities.
    pub fn is_identity_capable(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::String)
    }

    /// Returns whether a fresh entity's default for this type is a real value
    /// rather than a placeholder for "unset".
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            DataType::Boolean | DataType::Int32 | DataType::Int64 | DataType::Float64
        )
    }

    /// Returns whether this type supports `+`/`-` arithmetic in update assignments.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Float64)
    }

    /// Returns whether this type supports string matching comparators.
    pub fn is_textual(&self) -> bool {
        matches!(self, DataType::String)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_equality() {
        assert_eq!(DataType::Int32, DataType::Int32);
        assert_ne!(DataType::Int32, DataType::Int64);
    }

    #[test]
    fn test_nullable_by_default() {
        assert!(!DataType::Boolean.is_nullable_by_default());
        assert!(!DataType::Int32.is_nullable_by_default());
        assert!(!DataType::String.is_nullable_by_default());
        assert!(DataType::Bytes.is_nullable_by_default());
    }

    #[test]
    fn test_primitive() {
        assert!(DataType::Int32.is_primitive());
        assert!(DataType::Boolean.is_primitive());
        assert!(!DataType::String.is_primitive());
        assert!(!DataType::DateTime.is_primitive());
    }

    #[test]
    fn test_identity_capable() {
        assert!(DataType::Int64.is_identity_capable());
        assert!(DataType::String.is_identity_capable());
        assert!(!DataType::Float64.is_identity_capable());
        assert!(!DataType::Bytes.is_identity_capable());
    }

    #[test]
    fn test_numeric_and_textual() {
        assert!(DataType::Int32.is_numeric());
        assert!(DataType::Float64.is_numeric());
        assert!(!DataType::String.is_numeric());
        assert!(DataType::String.is_textual());
        assert!(!DataType::DateTime.is_textual());
    }
}
