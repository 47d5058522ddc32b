//! Query results handed to callers.

use quarry_core::schema::{AttributeKind, Metamodel};
use quarry_core::{Error, Result, Row, Value};
use quarry_query::executor::{FromView, Projected, View};
use std::fmt;
use std::sync::Arc;

/// One entity: its row plus name-based access through the metamodel.
///
/// Related entities loaded by a fetch join travel with the record.
#[derive(Clone)]
pub struct EntityRecord {
    metamodel: Arc<Metamodel>,
    entity: String,
    row: Row,
    related: Vec<(String, Option<EntityRecord>)>,
}

impl EntityRecord {
    pub(crate) fn new(metamodel: Arc<Metamodel>, entity: impl Into<String>, row: Row) -> Self {
        Self {
            metamodel,
            entity: entity.into(),
            row,
            related: Vec::new(),
        }
    }

    /// A record with every attribute at its initial value.
    pub fn create(metamodel: Arc<Metamodel>, entity: &str) -> Result<Self> {
        let row = metamodel.entity(entity)?.new_row();
        Ok(Self::new(metamodel, entity, row))
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn identity(&self) -> &Value {
        match self.metamodel.entity(&self.entity) {
            Ok(model) => model.identity_of(&self.row),
            Err(_) => &Value::Null,
        }
    }

    /// Stored version; 0 until the record has been written.
    pub fn version(&self) -> u64 {
        self.row.version()
    }

    pub fn row(&self) -> &Row {
        &self.row
    }

    pub fn into_row(self) -> Row {
        self.row
    }

    /// Reads an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let position = self.metamodel.entity(&self.entity).ok()?.position(name)?;
        self.row.get(position)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Writes an attribute by name, coercing numeric values to its type.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let model = self.metamodel.entity(&self.entity)?;
        let attr = model.attribute(name).ok_or_else(|| {
            Error::invalid_operation(format!("{} has no attribute '{}'", self.entity, name))
        })?;
        let value = match value.data_type() {
            None => Value::Null,
            Some(dt) if dt == attr.data_type() => value,
            Some(dt) => value
                .coerce_to(attr.data_type())
                .ok_or_else(|| Error::type_mismatch(attr.data_type(), dt))?,
        };
        let position = attr.position();
        self.row.set(position, value);
        Ok(())
    }

    /// Builder-style `set`.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Points a many-to-one relation at `target`.
    pub fn set_related(&mut self, relation: &str, target: &EntityRecord) -> Result<()> {
        let model = self.metamodel.entity(&self.entity)?;
        match model.attribute(relation).map(|a| a.kind()) {
            Some(AttributeKind::ForeignKey { target: expected }) if expected == target.entity() => {
                let identity = target.identity().clone();
                self.set(relation, identity)
            }
            _ => Err(Error::invalid_operation(format!(
                "{} has no relation '{}' to {}",
                self.entity,
                relation,
                target.entity()
            ))),
        }
    }

    /// The related entity loaded with this record, if the relation was fetched.
    pub fn related(&self, relation: &str) -> Option<&EntityRecord> {
        self.related
            .iter()
            .find(|(name, _)| name == relation)
            .and_then(|(_, record)| record.as_ref())
    }

    pub fn is_fetched(&self, relation: &str) -> bool {
        self.related.iter().any(|(name, _)| name == relation)
    }

    pub(crate) fn attach(&mut self, relation: &str, record: Option<EntityRecord>) {
        self.related.retain(|(name, _)| name != relation);
        self.related.push((relation.to_string(), record));
    }

    pub(crate) fn replace_row(&mut self, row: Row) {
        self.row = row;
    }
}

impl PartialEq for EntityRecord {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity && self.row == other.row && self.version() == other.version()
    }
}

impl fmt::Debug for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRecord")
            .field("entity", &self.entity)
            .field("version", &self.row.version())
            .field("values", &self.row.values())
            .finish()
    }
}

/// One result of a repository method.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Entity(EntityRecord),
    View(View),
    Scalar(Value),
}

impl Record {
    pub fn as_entity(&self) -> Option<&EntityRecord> {
        match self {
            Record::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_entity(self) -> Result<EntityRecord> {
        match self {
            Record::Entity(e) => Ok(e),
            other => Err(Error::invalid_operation(format!("{} is not an entity", other.kind()))),
        }
    }

    pub fn as_view(&self) -> Option<&View> {
        match self {
            Record::View(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Record::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Converts a view result into a caller-defined type.
    pub fn to_typed<T: FromView>(&self) -> Result<T> {
        match self {
            Record::View(view) => T::from_view(view),
            other => Err(Error::invalid_operation(format!("{} is not a view", other.kind()))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Record::Entity(_) => "entity",
            Record::View(_) => "view",
            Record::Scalar(_) => "scalar",
        }
    }
}

impl From<Projected> for Record {
    fn from(projected: Projected) -> Self {
        match projected {
            Projected::View(view) => Record::View(view),
            Projected::Scalar(value) => Record::Scalar(value),
        }
    }
}

impl From<EntityRecord> for Record {
    fn from(record: EntityRecord) -> Self {
        Record::Entity(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::schema::{EntityModelBuilder, IdStrategy};
    use quarry_core::DataType;
    use quarry_query::executor::ViewValue;

    fn metamodel() -> Arc<Metamodel> {
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
            .many_to_one("team", "Team", DataType::Int64)
            .unwrap()
            .build()
            .unwrap();
        Arc::new(Metamodel::builder().entity(team).entity(member).build().unwrap())
    }

    #[test]
    fn test_get_and_set() {
        let mut member = EntityRecord::create(metamodel(), "Member").unwrap();
        member.set("username", "member1").unwrap();
        member.set("age", 30i64).unwrap();
        assert_eq!(member.get_str("username"), Some("member1"));
        assert_eq!(member.get("age"), Some(&Value::Int32(30)));
        assert_eq!(member.identity(), &Value::Null);
        assert_eq!(member.version(), 0);
    }

    #[test]
    fn test_set_rejects_unknown_and_mistyped() {
        let mut member = EntityRecord::create(metamodel(), "Member").unwrap();
        assert!(matches!(
            member.set("nickname", "x"),
            Err(Error::InvalidOperation { .. })
        ));
        assert!(matches!(
            member.set("age", "thirty"),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_set_related() {
        let metamodel = metamodel();
        let mut team = EntityRecord::create(metamodel.clone(), "Team").unwrap();
        team.set("id", 7i64).unwrap();
        let mut member = EntityRecord::create(metamodel, "Member").unwrap();
        member.set_related("team", &team).unwrap();
        assert_eq!(member.get("team"), Some(&Value::Int64(7)));
        assert!(member.set_related("username", &team).is_err());
    }

    #[test]
    fn test_attach_related() {
        let metamodel = metamodel();
        let team = EntityRecord::create(metamodel.clone(), "Team").unwrap();
        let mut member = EntityRecord::create(metamodel, "Member").unwrap();
        assert!(!member.is_fetched("team"));
        member.attach("team", Some(team));
        assert!(member.is_fetched("team"));
        assert_eq!(member.related("team").map(|t| t.entity()), Some("Team"));
    }

    #[test]
    fn test_record_conversions() {
        let view = View::new("UsernameOnly", vec![("username".into(), ViewValue::Value(Value::from("m1")))]);
        let record = Record::from(Projected::View(view.clone()));
        assert_eq!(record.as_view(), Some(&view));
        assert_eq!(record.to_typed::<View>().unwrap(), view);
        assert!(record.clone().into_entity().is_err());
        assert_eq!(Record::Scalar(Value::Int64(3)).as_scalar(), Some(&Value::Int64(3)));
    }
}
