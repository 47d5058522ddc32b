//! Quarry Storage - the storage collaborator behind the repository layer.
//!
//! This crate provides:
//!
//! - `Storage`: the narrow execute-statement interface with transaction boundaries
//! - `MemoryStorage`: a thread-safe in-memory reference engine
//! - `LockTable`: exclusive row locks held until a transaction ends
//! - `Journal`: per-transaction undo log used for rollback
//! - `StorageStats`: statement counters, used by tests to observe query shapes
//!
//! # Example
//!
//! ```rust
//! use quarry_core::schema::{EntityModelBuilder, IdStrategy, Metamodel};
//! use quarry_core::{DataType, Row, Value};
//! use quarry_query::statement::{Outcome, Select, Statement};
//! use quarry_storage::{MemoryStorage, Storage};
//!
//! let member = EntityModelBuilder::new("Member")
//!     .unwrap()
//!     .id("id", DataType::Int64, IdStrategy::Generated)
//!     .unwrap()
//!     .attribute("username", DataType::String)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let metamodel = Metamodel::builder().entity(member).build().unwrap();
//! let storage = MemoryStorage::new(&metamodel);
//!
//! let tx = storage.begin().unwrap();
//! let row = Row::new(vec![Value::Null, Value::from("member1")]);
//! let inserted = storage
//!     .execute(tx, &Statement::Insert { entity: "Member".into(), row })
//!     .unwrap();
//! assert_eq!(inserted, Outcome::Inserted { identity: Value::Int64(1), version: 1 });
//!
//! let rows = storage.execute(tx, &Statement::Select(Select::all("Member"))).unwrap();
//! storage.commit(tx).unwrap();
//! assert!(matches!(rows, Outcome::Rows(r) if r.len() == 1));
//! ```

pub mod journal;
pub mod lock;
mod memory;
mod stats;
mod table;

pub use journal::{Journal, JournalEntry};
pub use lock::{Blocked, LockKey, LockTable};
pub use memory::{MemoryStorage, DEFAULT_WRITE_LOCK_TIMEOUT};
pub use stats::StorageStats;

use quarry_core::Result;
use quarry_query::statement::{Outcome, Statement};

/// Transaction identifier issued by `Storage::begin`.
pub type TxId = u64;

/// A storage engine reachable through bound statements.
///
/// Implementations must be shareable across threads; each unit of work
/// drives its own transaction.
pub trait Storage: Send + Sync {
    fn begin(&self) -> Result<TxId>;

    fn execute(&self, tx: TxId, statement: &Statement) -> Result<Outcome>;

    fn commit(&self, tx: TxId) -> Result<()>;

    /// Discards every write made by `tx` and releases its locks.
    fn rollback(&self, tx: TxId) -> Result<()>;
}
