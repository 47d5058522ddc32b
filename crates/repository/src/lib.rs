//! Quarry Repository - declarative data access over a quarry storage engine.
//!
//! This crate provides:
//!
//! - `Repository`: derived and explicit query methods, CRUD, predicate and
//!   example queries for one entity type
//! - `UnitOfWork`: a storage transaction plus the identity-keyed working set
//!   that tracks loaded entities and flushes their changes
//! - `Database`: the shared entry point opening units of work
//! - `AuditingInterceptor`: creation and modification stamps
//! - `RepositoryConfig`: paging, locking and cache invalidation settings
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use quarry_core::schema::{EntityModelBuilder, IdStrategy, Metamodel};
//! use quarry_core::DataType;
//! use quarry_query::{Arguments, PageRequest, Sort};
//! use quarry_repository::{Database, Method, Repository, ReturnShape};
//! use quarry_storage::MemoryStorage;
//!
//! let member = EntityModelBuilder::new("Member")
//!     .unwrap()
//!     .id("id", DataType::Int64, IdStrategy::Generated)
//!     .unwrap()
//!     .attribute("username", DataType::String)
//!     .unwrap()
//!     .attribute("age", DataType::Int32)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let metamodel = Arc::new(Metamodel::builder().entity(member).build().unwrap());
//! let db = Database::new(metamodel.clone(), Arc::new(MemoryStorage::new(&metamodel)));
//!
//! let members = Repository::builder(metamodel, "Member")
//!     .method(Method::derived("findByAge").returning(ReturnShape::Page))
//!     .build()
//!     .unwrap();
//!
//! let mut uow = db.begin().unwrap();
//! for (name, age) in [("member1", 10), ("member2", 10), ("member3", 20)] {
//!     let m = members.create(&uow).unwrap().with("username", name).unwrap().with("age", age).unwrap();
//!     members.save(&mut uow, m).unwrap();
//! }
//!
//! let request = PageRequest::of_sorted(0, 1, Sort::by(&["username"]).descending());
//! let page = members.page(&mut uow, "findByAge", &Arguments::of([10]), &request).unwrap();
//! assert_eq!(page.total_elements(), 2);
//! assert_eq!(page.total_pages(), 2);
//! let first = page.content()[0].as_entity().unwrap();
//! assert_eq!(first.get_str("username"), Some("member2"));
//! uow.commit().unwrap();
//! ```

pub mod audit;
pub mod config;
mod database;
pub mod example;
mod executor;
mod lock;
pub mod method;
mod record;
mod repository;
mod unit_of_work;
mod working_set;

pub use audit::{AuditingInterceptor, AuditorAware, Clock, FixedAuditor, ManualClock, RandomAuditor, SystemClock};
pub use config::{InvalidationStrategy, RepositoryConfig};
pub use database::Database;
pub use example::{Example, ExampleMatcher, StringMatcher};
pub use executor::QueryExecutor;
pub use lock::LockCoordinator;
pub use method::{Method, MethodConflict, MethodKind, ReturnShape};
pub use record::{EntityRecord, Record};
pub use repository::{Repository, RepositoryBuilder};
pub use unit_of_work::UnitOfWork;
pub use working_set::EntityKey;
