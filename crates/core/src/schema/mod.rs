//! Entity metamodel for quarry.
//!
//! This module contains the attribute graph definitions: attributes,
//! many-to-one relations, audit capabilities, entity models and the
//! metamodel registry that resolves property paths.

mod attribute;
mod audit;
mod entity;
mod metamodel;
mod relation;

pub use attribute::{Attribute, AttributeKind};
pub use audit::{AuditCapabilities, AuditField};
pub use entity::{EntityModel, EntityModelBuilder, IdStrategy};
pub use metamodel::{uncapitalize, AttributeRef, HopRef, Metamodel, MetamodelBuilder};
pub use relation::Relation;
