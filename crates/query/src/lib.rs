//! Quarry Query - predicates, query intent and plans.
//!
//! This crate turns query intent into storage statements:
//!
//! - `ast`: Immutable predicate trees, operators and update expressions
//! - `descriptor`: Method descriptors such as `findByUsernameAndAgeGreaterThan`
//! - `text`: Explicit query text (`select m from Member m where ...`)
//! - `planner`: Plan skeletons, validation, join derivation and argument binding
//! - `statement`: Bound statements executed by a storage engine
//! - `executor`: Filter evaluation, ordering, update assignments and projection mapping
//! - `sort`, `paging`, `projection`: Request and result shapes
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use quarry_core::schema::{EntityModelBuilder, IdStrategy, Metamodel};
//! use quarry_core::DataType;
//! use quarry_query::descriptor::MethodDescriptor;
//! use quarry_query::planner::{Arguments, PreparedPlan};
//! use quarry_query::sort::Sort;
//!
//! let member = EntityModelBuilder::new("Member")
//!     .unwrap()
//!     .id("id", DataType::Int64, IdStrategy::Generated)
//!     .unwrap()
//!     .attribute("username", DataType::String)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let metamodel = Arc::new(Metamodel::builder().entity(member).build().unwrap());
//!
//! let descriptor = MethodDescriptor::parse("findByUsername").unwrap();
//! let plan = descriptor.to_plan(&metamodel, "Member").unwrap();
//! let prepared = PreparedPlan::prepare(plan, metamodel).unwrap();
//! let select = prepared
//!     .bind_select(&Arguments::of(["AAA"]), 0, None, &Sort::unsorted())
//!     .unwrap();
//! assert_eq!(select.entity, "Member");
//! ```

#![no_std]

extern crate alloc;

pub mod ast;
pub mod descriptor;
pub mod executor;
pub mod paging;
pub mod planner;
pub mod projection;
pub mod sort;
pub mod statement;
pub mod text;

#[cfg(test)]
mod testing;

pub use ast::{Operator, ParamRef, Predicate};
pub use paging::{Page, PageRequest, Slice};
pub use planner::{Arguments, LockMode, PreparedPlan, QueryPlan};
pub use projection::Projection;
pub use sort::{Direction, Order, Sort};
