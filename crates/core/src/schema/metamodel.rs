//! The metamodel registry and property-path resolution.

use super::attribute::{Attribute, AttributeKind};
use super::entity::EntityModel;
use crate::error::{Error, Result};
use crate::types::DataType;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::HashMap;

/// A relationship hop crossed by a resolved path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HopRef {
    relation: String,
    target: String,
    fk_position: usize,
}

impl HopRef {
    /// Returns the relation name on the root entity.
    #[inline]
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Returns the related entity name.
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the root-row position of the foreign key.
    #[inline]
    pub fn fk_position(&self) -> usize {
        self.fk_position
    }
}

/// A property path resolved against the metamodel.
///
/// The path starts at `root` and optionally crosses one declared relation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeRef {
    root: String,
    hop: Option<HopRef>,
    entity: String,
    attribute: String,
    position: usize,
    data_type: DataType,
    nullable: bool,
}

impl AttributeRef {
    /// Returns the entity the path starts from.
    #[inline]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the entity owning the final attribute.
    #[inline]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[inline]
    pub fn hop(&self) -> Option<&HopRef> {
        self.hop.as_ref()
    }

    #[inline]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Returns the attribute's row position within `entity()`.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns the dotted path, e.g. `team.name`.
    pub fn path(&self) -> String {
        match &self.hop {
            Some(hop) => format!("{}.{}", hop.relation, self.attribute),
            None => self.attribute.clone(),
        }
    }
}

/// Registry of entity models.
#[derive(Clone, Debug, Default)]
pub struct Metamodel {
    entities: HashMap<String, EntityModel>,
}

/// Builder for a metamodel; validates relation targets on `build`.
#[derive(Default)]
pub struct MetamodelBuilder {
    entities: Vec<EntityModel>,
}

impl MetamodelBuilder {
    /// Registers an entity model.
    pub fn entity(mut self, model: EntityModel) -> Self {
        self.entities.push(model);
        self
    }

    /// Builds the metamodel.
    pub fn build(self) -> Result<Metamodel> {
        let mut entities = HashMap::with_capacity(self.entities.len());
        for model in self.entities {
            let name = model.name().to_string();
            if entities.insert(name.clone(), model).is_some() {
                return Err(Error::invalid_schema(format!(
                    "Entity registered twice: {}",
                    name
                )));
            }
        }
        for model in entities.values() {
            for relation in model.relations() {
                let target: &EntityModel = entities.get(relation.target()).ok_or_else(|| {
                    Error::invalid_schema(format!(
                        "{}.{} targets unknown entity {}",
                        model.name(),
                        relation.name(),
                        relation.target()
                    ))
                })?;
                let fk = &model.attributes()[relation.fk_position()];
                if fk.data_type() != target.id().data_type() {
                    return Err(Error::invalid_schema(format!(
                        "{}.{} is {:?} but {} identities are {:?}",
                        model.name(),
                        relation.name(),
                        fk.data_type(),
                        target.name(),
                        target.id().data_type()
                    )));
                }
            }
        }
        Ok(Metamodel { entities })
    }
}

impl Metamodel {
    pub fn builder() -> MetamodelBuilder {
        MetamodelBuilder::default()
    }

    /// Gets an entity model by name.
    pub fn entity(&self, name: &str) -> Result<&EntityModel> {
        self.entities
            .get(name)
            .ok_or_else(|| Error::entity_not_found(name))
    }

    /// Returns true if the entity is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Iterates over the registered entity names.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(|k| k.as_str())
    }

    /// Resolves a dotted property path such as `username` or `team.name`.
    ///
    /// At most one relationship hop is allowed, and it must be declared.
    pub fn resolve_path(&self, root: &str, path: &str) -> Result<AttributeRef> {
        let model = self.entity(root)?;
        let mut segments = path.split('.');
        let head = segments.next().unwrap_or_default();
        let tail = segments.next();
        if segments.next().is_some() {
            return Err(Error::descriptor(format!(
                "Path '{}' on {} crosses more than one relationship",
                path, root
            )));
        }

        match tail {
            None => {
                let attr = model.attribute(head).ok_or_else(|| no_property(head, root))?;
                Ok(make_ref(root, None, model.name(), attr))
            }
            Some(tail) => {
                let relation = model.relation(head).ok_or_else(|| {
                    if model.attribute(head).is_some() {
                        Error::descriptor(format!(
                            "'{}' on {} is not a declared relation",
                            head, root
                        ))
                    } else {
                        no_property(head, root)
                    }
                })?;
                let target = self.entity(relation.target())?;
                let attr = target
                    .attribute(tail)
                    .ok_or_else(|| no_property(tail, target.name()))?;
                let hop = HopRef {
                    relation: relation.name().to_string(),
                    target: target.name().to_string(),
                    fk_position: relation.fk_position(),
                };
                Ok(make_ref(root, Some(hop), target.name(), attr))
            }
        }
    }

    /// Resolves a capitalized property expression from a method descriptor.
    ///
    /// `Username` resolves to `username`, `TeamName` to `team.name` when
    /// `team` is a declared relation, and `Team_Name` splits explicitly.
    pub fn resolve_property(&self, root: &str, expression: &str) -> Result<AttributeRef> {
        let model = self.entity(root)?;
        if expression.contains('_') {
            let dotted: Vec<String> = expression.split('_').map(uncapitalize).collect();
            return self.resolve_path(root, &dotted.join("."));
        }

        let whole = uncapitalize(expression);
        if model.attribute(&whole).is_some() {
            return self.resolve_path(root, &whole);
        }

        // Try the longest relation prefix first.
        let boundaries: Vec<usize> = expression
            .char_indices()
            .skip(1)
            .filter(|(_, c)| c.is_ascii_uppercase())
            .map(|(i, _)| i)
            .collect();
        for &split in boundaries.iter().rev() {
            let head = uncapitalize(&expression[..split]);
            if model.relation(&head).is_some() {
                let tail = uncapitalize(&expression[split..]);
                return self.resolve_path(root, &format!("{}.{}", head, tail));
            }
        }
        Err(no_property(&whole, root))
    }
}

fn make_ref(root: &str, hop: Option<HopRef>, entity: &str, attr: &Attribute) -> AttributeRef {
    AttributeRef {
        root: root.to_string(),
        hop,
        entity: entity.to_string(),
        attribute: attr.name().to_string(),
        position: attr.position(),
        data_type: attr.data_type(),
        nullable: attr.is_nullable() || attr.kind() != &AttributeKind::Basic,
    }
}

fn no_property(name: &str, entity: &str) -> Error {
    Error::descriptor(format!("No property '{}' found for type '{}'", name, entity))
}

/// Lower-cases the first character: `TeamName` becomes `teamName`.
pub fn uncapitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_lowercase().chain(chars).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AuditCapabilities, EntityModelBuilder, IdStrategy};

    fn metamodel() -> Metamodel {
        let team = EntityModelBuilder::new("Team")
            .unwrap()
            .id("id", DataType::Int64, IdStrategy::Generated)
            .unwrap()
            .attribute("name", DataType::String)
            .unwrap()
            .build()
            .unwrap();
        let member = EntityModelBuilder::new("Member")
            .unwrap()
            .id("id", DataType::Int64, IdStrategy::Generated)
            .unwrap()
            .attribute("username", DataType::String)
            .unwrap()
            .attribute("age", DataType::Int32)
            .unwrap()
            .attribute("teamName", DataType::String)
            .unwrap()
            .many_to_one("team", "Team", DataType::Int64)
            .unwrap()
            .auditing(AuditCapabilities::timestamps())
            .build()
            .unwrap();
        Metamodel::builder().entity(team).entity(member).build().unwrap()
    }

    #[test]
    fn test_resolve_root_path() {
        let mm = metamodel();
        let path = mm.resolve_path("Member", "age").unwrap();
        assert_eq!(path.entity(), "Member");
        assert_eq!(path.position(), 2);
        assert_eq!(path.data_type(), DataType::Int32);
        assert!(path.hop().is_none());
    }

    #[test]
    fn test_resolve_hop_path() {
        let mm = metamodel();
        let path = mm.resolve_path("Member", "team.name").unwrap();
        assert_eq!(path.entity(), "Team");
        assert_eq!(path.root(), "Member");
        assert_eq!(path.hop().map(|h| h.fk_position()), Some(4));
        assert_eq!(path.path(), "team.name");
    }

    #[test]
    fn test_resolve_path_errors() {
        let mm = metamodel();
        assert!(matches!(
            mm.resolve_path("Member", "nickname"),
            Err(Error::Descriptor { .. })
        ));
        assert!(matches!(
            mm.resolve_path("Member", "age.value"),
            Err(Error::Descriptor { .. })
        ));
        assert!(matches!(
            mm.resolve_path("Member", "team.name.length"),
            Err(Error::Descriptor { .. })
        ));
        assert!(matches!(
            mm.resolve_path("Order", "id"),
            Err(Error::EntityNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_property_prefers_whole_attribute() {
        let mm = metamodel();
        // `teamName` exists on Member, so it wins over `team.name`.
        let path = mm.resolve_property("Member", "TeamName").unwrap();
        assert!(path.hop().is_none());
        let path = mm.resolve_property("Member", "Team_Name").unwrap();
        assert_eq!(path.entity(), "Team");
    }

    #[test]
    fn test_resolve_property_splits_relation() {
        let mm = metamodel();
        let path = mm.resolve_property("Member", "TeamId").unwrap();
        assert_eq!(path.path(), "team.id");
        assert!(mm.resolve_property("Member", "Nickname").is_err());
    }

    #[test]
    fn test_build_rejects_unknown_target() {
        let member = EntityModelBuilder::new("Member")
            .unwrap()
            .id("id", DataType::Int64, IdStrategy::Generated)
            .unwrap()
            .many_to_one("team", "Team", DataType::Int64)
            .unwrap()
            .build()
            .unwrap();
        assert!(Metamodel::builder().entity(member).build().is_err());
    }

    #[test]
    fn test_build_rejects_fk_type_mismatch() {
        let team = EntityModelBuilder::new("Team")
            .unwrap()
            .id("id", DataType::Int64, IdStrategy::Generated)
            .unwrap()
            .build()
            .unwrap();
        let member = EntityModelBuilder::new("Member")
            .unwrap()
            .id("id", DataType::Int64, IdStrategy::Generated)
            .unwrap()
            .many_to_one("team", "Team", DataType::String)
            .unwrap()
            .build()
            .unwrap();
        let result = Metamodel::builder().entity(team).entity(member).build();
        assert!(matches!(result, Err(Error::InvalidSchema { .. })));
    }
}
