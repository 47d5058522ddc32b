//! Error types for quarry.

use crate::types::DataType;
use alloc::string::String;

/// Result type alias for quarry operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised while building plans or executing them.
///
/// Plan-build failures (`Descriptor`, `UnsupportedOperator`, `InvalidSchema`,
/// `EntityNotFound`) surface when a repository is constructed. The rest are
/// execution failures. A missing row is never an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Unparseable or unresolvable query intent.
    #[error("descriptor error: {message}")]
    Descriptor { message: String },
    /// A recognized comparator keyword with no supported evaluation.
    #[error("unsupported operator: {operator}")]
    UnsupportedOperator { operator: String },
    /// A single-result query matched more than one row.
    #[error("query did not return a unique result: {actual} rows matched")]
    NonUniqueResult { actual: usize },
    /// Version mismatch at write time. `actual` is 0 when the row is gone.
    #[error("optimistic lock failure on {entity}#{identity}: expected version {expected}, found {actual}")]
    OptimisticLock {
        entity: String,
        identity: String,
        expected: u64,
        actual: u64,
    },
    /// A pessimistic lock could not be acquired within the wait window.
    #[error("lock on {entity}#{identity} not acquired within {waited_ms} ms")]
    LockTimeout {
        entity: String,
        identity: String,
        waited_ms: u64,
    },
    /// Opaque storage failure.
    #[error("storage error: {message}")]
    Storage { message: String },
    /// Type mismatch error.
    #[error("type mismatch: expected {expected:?}, got {got:?}")]
    TypeMismatch { expected: DataType, got: DataType },
    /// Invalid entity definition.
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },
    /// Entity type not registered in the metamodel.
    #[error("entity not found: {name}")]
    EntityNotFound { name: String },
    /// API misuse, e.g. a missing argument.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },
    /// Invalidation after a bulk write failed; the unit of work was rolled back.
    #[error("cache invalidation failed: {message}")]
    CacheInvalidation { message: String },
}

impl Error {
    /// Creates a descriptor error.
    pub fn descriptor(message: impl Into<String>) -> Self {
        Error::Descriptor {
            message: message.into(),
        }
    }

    /// Creates an unsupported operator error.
    pub fn unsupported_operator(operator: impl Into<String>) -> Self {
        Error::UnsupportedOperator {
            operator: operator.into(),
        }
    }

    pub fn non_unique(actual: usize) -> Self {
        Error::NonUniqueResult { actual }
    }

    /// Creates an optimistic lock error.
    pub fn optimistic_lock(
        entity: impl Into<String>,
        identity: impl Into<String>,
        expected: u64,
        actual: u64,
    ) -> Self {
        Error::OptimisticLock {
            entity: entity.into(),
            identity: identity.into(),
            expected,
            actual,
        }
    }

    /// Creates a lock timeout error.
    pub fn lock_timeout(
        entity: impl Into<String>,
        identity: impl Into<String>,
        waited_ms: u64,
    ) -> Self {
        Error::LockTimeout {
            entity: entity.into(),
            identity: identity.into(),
            waited_ms,
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: DataType, got: DataType) -> Self {
        Error::TypeMismatch { expected, got }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an entity not found error.
    pub fn entity_not_found(name: impl Into<String>) -> Self {
        Error::EntityNotFound { name: name.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    pub fn cache_invalidation(message: impl Into<String>) -> Self {
        Error::CacheInvalidation {
            message: message.into(),
        }
    }

    /// Returns true for errors raised while building a plan.
    pub fn is_plan_error(&self) -> bool {
        matches!(
            self,
            Error::Descriptor { .. }
                | Error::UnsupportedOperator { .. }
                | Error::InvalidSchema { .. }
                | Error::EntityNotFound { .. }
        )
    }
}
