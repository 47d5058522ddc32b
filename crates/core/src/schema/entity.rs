//! Entity model definition.

use super::attribute::{Attribute, AttributeKind};
use super::audit::{AuditCapabilities, AuditField};
use super::relation::Relation;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::types::DataType;
use crate::value::Value;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

static NULL: Value = Value::Null;

/// How an entity's identity is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdStrategy {
    /// Storage assigns the identity on insert.
    Generated,
    /// The caller assigns the identity before the first save.
    Assigned,
}

/// The attribute graph of one entity type.
#[derive(Clone, Debug)]
pub struct EntityModel {
    name: String,
    attributes: Vec<Attribute>,
    id_position: usize,
    id_strategy: IdStrategy,
    relations: Vec<Relation>,
    audit: AuditCapabilities,
    versioned: bool,
}

impl EntityModel {
    /// Returns the entity name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the attributes in row order.
    #[inline]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns the number of values in a row of this entity.
    #[inline]
    pub fn arity(&self) -> usize {
        self.attributes.len()
    }

    /// Gets an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Gets an attribute position by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.attribute(name).map(|a| a.position())
    }

    /// Returns the identity attribute.
    pub fn id(&self) -> &Attribute {
        &self.attributes[self.id_position]
    }

    #[inline]
    pub fn id_position(&self) -> usize {
        self.id_position
    }

    #[inline]
    pub fn id_strategy(&self) -> IdStrategy {
        self.id_strategy
    }

    #[inline]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Gets a declared relation by name.
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name() == name)
    }

    #[inline]
    pub fn audit(&self) -> AuditCapabilities {
        self.audit
    }

    /// Returns the row position of an audit field, if the entity carries it.
    pub fn audit_position(&self, field: AuditField) -> Option<usize> {
        self.attributes
            .iter()
            .find(|a| a.kind() == &AttributeKind::Audit(field))
            .map(|a| a.position())
    }

    /// Returns whether updates are checked against the row version.
    #[inline]
    pub fn is_versioned(&self) -> bool {
        self.versioned
    }

    /// Returns the identity value held by `row`.
    pub fn identity_of<'a>(&self, row: &'a Row) -> &'a Value {
        row.get(self.id_position).unwrap_or(&NULL)
    }

    /// Creates a row with every attribute at its initial value.
    pub fn new_row(&self) -> Row {
        Row::new(self.attributes.iter().map(|a| a.initial_value()).collect())
    }

    /// Classifies a row as never persisted.
    ///
    /// Generated identities are new when unset. Assigned identities are
    /// always populated, so the freshness marker decides instead: an unset
    /// creation timestamp, or version 0 when the entity is versioned.
    pub fn is_new(&self, row: &Row) -> bool {
        match self.id_strategy {
            IdStrategy::Generated => self.identity_of(row).is_default_identity(),
            IdStrategy::Assigned => match self.audit_position(AuditField::CreatedDate) {
                Some(pos) => row.get(pos).map_or(true, Value::is_null),
                None => row.version() == 0,
            },
        }
    }

    /// Checks that `row` fits this entity's attribute types.
    pub fn check_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.arity() {
            return Err(Error::invalid_operation(format!(
                "{} expects {} values, got {}",
                self.name,
                self.arity(),
                row.len()
            )));
        }
        for (attr, value) in self.attributes.iter().zip(row.values()) {
            match value.data_type() {
                None if !attr.is_nullable() && attr.kind() == &AttributeKind::Basic => {
                    return Err(Error::invalid_operation(format!(
                        "{}.{} is not nullable",
                        self.name,
                        attr.name()
                    )));
                }
                Some(dt) if dt != attr.data_type() => {
                    return Err(Error::type_mismatch(attr.data_type(), dt));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Builder for creating entity models.
pub struct EntityModelBuilder {
    name: String,
    attributes: Vec<Attribute>,
    id: Option<(usize, IdStrategy)>,
    relations: Vec<Relation>,
    audit: AuditCapabilities,
    versioned: bool,
}

impl EntityModelBuilder {
    /// Creates a new entity builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        Ok(Self {
            name,
            attributes: Vec::new(),
            id: None,
            relations: Vec::new(),
            audit: AuditCapabilities::none(),
            versioned: false,
        })
    }

    /// Validates a name follows naming rules.
    fn check_naming_rules(name: &str) -> Result<()> {
        let first = match name.chars().next() {
            Some(c) => c,
            None => return Err(Error::invalid_schema("Name cannot be empty")),
        };
        if !first.is_ascii_alphabetic() {
            return Err(Error::invalid_schema(format!(
                "Name must start with a letter: {}",
                name
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_schema(format!(
                "Name contains invalid characters: {}",
                name
            )));
        }
        Ok(())
    }

    fn push(&mut self, attribute: Attribute) -> Result<usize> {
        Self::check_naming_rules(attribute.name())?;
        if self.attributes.iter().any(|a| a.name() == attribute.name()) {
            return Err(Error::invalid_schema(format!(
                "Attribute already exists: {}.{}",
                self.name,
                attribute.name()
            )));
        }
        let position = self.attributes.len();
        self.attributes.push(attribute.with_position(position));
        Ok(position)
    }

    /// Declares the identity attribute.
    pub fn id(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        strategy: IdStrategy,
    ) -> Result<Self> {
        if self.id.is_some() {
            return Err(Error::invalid_schema(format!(
                "{} already declares an identity",
                self.name
            )));
        }
        if !data_type.is_identity_capable() {
            return Err(Error::invalid_schema(format!(
                "{:?} cannot be used as an identity",
                data_type
            )));
        }
        if strategy == IdStrategy::Generated && !data_type.is_numeric() {
            return Err(Error::invalid_schema("Generated identities must be integers"));
        }
        let attr = Attribute::new(name, data_type)
            .nullable(true)
            .with_kind(AttributeKind::Id);
        let position = self.push(attr)?;
        self.id = Some((position, strategy));
        Ok(self)
    }

    /// Adds a basic attribute.
    pub fn attribute(mut self, name: impl Into<String>, data_type: DataType) -> Result<Self> {
        self.push(Attribute::new(name, data_type))?;
        Ok(self)
    }

    /// Marks attributes as nullable.
    pub fn nullable(mut self, names: &[&str]) -> Self {
        for name in names {
            if let Some(attr) = self.attributes.iter_mut().find(|a| a.name() == *name) {
                *attr = attr.clone().nullable(true);
            }
        }
        self
    }

    /// Declares a many-to-one relation backed by a foreign key of `fk_type`.
    pub fn many_to_one(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        fk_type: DataType,
    ) -> Result<Self> {
        let name = name.into();
        let target = target.into();
        Self::check_naming_rules(&target)?;
        let attr = Attribute::new(name.clone(), fk_type)
            .nullable(true)
            .with_kind(AttributeKind::ForeignKey {
                target: target.clone(),
            });
        let position = self.push(attr)?;
        self.relations.push(Relation::new(name, target, position));
        Ok(self)
    }

    /// Attaches audit capabilities.
    pub fn auditing(mut self, capabilities: AuditCapabilities) -> Self {
        self.audit = self.audit.with(capabilities);
        self
    }

    /// Enables optimistic version checks on every update.
    pub fn versioned(mut self) -> Self {
        self.versioned = true;
        self
    }

    /// Builds the entity model.
    pub fn build(mut self) -> Result<EntityModel> {
        let (id_position, id_strategy) = self
            .id
            .ok_or_else(|| Error::invalid_schema(format!("{} has no identity", self.name)))?;

        if id_strategy == IdStrategy::Assigned && !self.audit.creation_time && !self.versioned {
            return Err(Error::invalid_schema(format!(
                "{} assigns identities but has no freshness marker; \
                 enable creation-time auditing or versioning",
                self.name
            )));
        }

        for field in self.audit.fields() {
            let attr = Attribute::new(field.column_name(), field.data_type())
                .nullable(true)
                .with_kind(AttributeKind::Audit(field));
            self.push(attr)?;
        }

        Ok(EntityModel {
            name: self.name,
            attributes: self.attributes,
            id_position,
            id_strategy,
            relations: self.relations,
            audit: self.audit,
            versioned: self.versioned,
        })
    }
}
