//! Quarry Core - values, rows and the entity metamodel.
//!
//! This crate provides the foundational types shared by every quarry layer:
//!
//! - `DataType`: Supported attribute types (Boolean, Int32, Int64, Float64, String, DateTime, Bytes)
//! - `Value`: Runtime values held by entity attributes
//! - `Row`: The attribute values of one entity plus its version marker
//! - `schema`: The entity metamodel (attributes, relations, audit capabilities, path resolution)
//! - `Error`: The error taxonomy for plan building and execution
//!
//! # Example
//!
//! ```rust
//! use quarry_core::schema::{EntityModelBuilder, IdStrategy, Metamodel};
//! use quarry_core::DataType;
//!
//! let team = EntityModelBuilder::new("Team")
//!     .unwrap()
//!     .id("id", DataType::Int64, IdStrategy::Generated)
//!     .unwrap()
//!     .attribute("name", DataType::String)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let member = EntityModelBuilder::new("Member")
//!     .unwrap()
//!     .id("id", DataType::Int64, IdStrategy::Generated)
//!     .unwrap()
//!     .attribute("username", DataType::String)
//!     .unwrap()
//!     .many_to_one("team", "Team", DataType::Int64)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let metamodel = Metamodel::builder().entity(team).entity(member).build().unwrap();
//! let path = metamodel.resolve_path("Member", "team.name").unwrap();
//! assert_eq!(path.entity(), "Team");
//! assert!(path.hop().is_some());
//! ```

#![no_std]

extern crate alloc;

mod error;
pub mod pattern_match;
mod row;
pub mod schema;
mod types;
mod value;

pub use error::{Error, Result};
pub use row::Row;
pub use types::DataType;
pub use value::Value;
