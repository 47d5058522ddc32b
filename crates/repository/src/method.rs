//! Repository method declarations.
//!
//! A method is either derived from its name (`findByUsernameAndAgeGreaterThan`)
//! or carries explicit query text. Declarations are compiled into executors
//! when the repository is built, so a bad method fails construction rather
//! than its first call.

use crate::executor::QueryExecutor;
use quarry_core::schema::Metamodel;
use quarry_core::{Error, Result};
use quarry_query::descriptor::MethodDescriptor;
use quarry_query::planner::Action;
use quarry_query::text::parse_query;
use quarry_query::{LockMode, PreparedPlan, Projection, QueryPlan};
use std::fmt;
use std::sync::Arc;

/// Where a method's query comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Derived,
    Query,
    Modifying,
}

impl MethodKind {
    pub fn is_explicit(self) -> bool {
        self != MethodKind::Derived
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MethodKind::Derived => "derived",
            MethodKind::Query => "query",
            MethodKind::Modifying => "modifying",
        })
    }
}

/// What a method hands back to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReturnShape {
    List,
    /// Zero or one result; more is an error.
    One,
    Page,
    Slice,
    Count,
    Exists,
    /// Number of entities written by a delete or bulk query.
    Affected,
}

impl ReturnShape {
    fn default_for(action: &Action) -> Self {
        match action {
            Action::Select => ReturnShape::List,
            Action::Count => ReturnShape::Count,
            Action::Exists => ReturnShape::Exists,
            Action::Delete | Action::BulkUpdate(_) | Action::BulkDelete => ReturnShape::Affected,
        }
    }

    fn supports(self, action: &Action) -> bool {
        match action {
            Action::Select => matches!(
                self,
                ReturnShape::List | ReturnShape::One | ReturnShape::Page | ReturnShape::Slice
            ),
            Action::Count => self == ReturnShape::Count,
            Action::Exists => self == ReturnShape::Exists,
            Action::Delete | Action::BulkUpdate(_) | Action::BulkDelete => {
                self == ReturnShape::Affected
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Method {
    name: String,
    kind: MethodKind,
    text: Option<String>,
    returns: Option<ReturnShape>,
    count_query: Option<String>,
    projection: Option<Projection>,
    fetch: Vec<String>,
    lock: Option<LockMode>,
    read_only: Option<bool>,
}

impl Method {
    fn new(name: &str, kind: MethodKind, text: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            text: text.map(str::to_string),
            returns: None,
            count_query: None,
            projection: None,
            fetch: Vec::new(),
            lock: None,
            read_only: None,
        }
    }

    /// A method whose query is derived from its name.
    pub fn derived(name: &str) -> Self {
        Self::new(name, MethodKind::Derived, None)
    }

    /// A read method with explicit query text.
    pub fn query(name: &str, text: &str) -> Self {
        Self::new(name, MethodKind::Query, Some(text))
    }

    /// A bulk `update` or `delete` with explicit query text.
    pub fn modifying(name: &str, text: &str) -> Self {
        Self::new(name, MethodKind::Modifying, Some(text))
    }

    pub fn returning(mut self, shape: ReturnShape) -> Self {
        self.returns = Some(shape);
        self
    }

    /// Explicit count query used for page totals.
    pub fn count_query(mut self, text: &str) -> Self {
        self.count_query = Some(text.to_string());
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Relations to load together with the result entities.
    pub fn entity_graph(mut self, relations: &[&str]) -> Self {
        for relation in relations {
            if !self.fetch.iter().any(|r| r == relation) {
                self.fetch.push(relation.to_string());
            }
        }
        self
    }

    pub fn lock(mut self, mode: LockMode) -> Self {
        self.lock = Some(mode);
        self
    }

    /// Results are not tracked for changes.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Compiles the declaration against `entity`.
    pub(crate) fn compile(
        &self,
        metamodel: &Arc<Metamodel>,
        entity: &str,
    ) -> Result<(ReturnShape, QueryExecutor)> {
        let mut plan = self.skeleton(metamodel, entity)?;
        if let Some(projection) = &self.projection {
            plan = plan.with_projection(projection.clone());
        }
        let fetch: Vec<&str> = self.fetch.iter().map(String::as_str).collect();
        plan = plan.with_fetch(&fetch);
        if let Some(lock) = self.lock {
            plan = plan.with_lock(lock);
        }
        if let Some(read_only) = self.read_only {
            plan = plan.read_only(read_only);
        }

        let shape = self
            .returns
            .unwrap_or_else(|| ReturnShape::default_for(&plan.action));
        if !shape.supports(&plan.action) {
            return Err(Error::descriptor(format!(
                "method {} cannot return {:?} from a {:?} query",
                self.name, shape, plan.action
            )));
        }

        let mut executor = QueryExecutor::new(PreparedPlan::prepare(plan, Arc::clone(metamodel))?);
        if let Some(text) = &self.count_query {
            let count = parse_query(text)?;
            if count.action != Action::Count || count.entity != entity {
                return Err(Error::descriptor(format!(
                    "count query of {} must count {}",
                    self.name, entity
                )));
            }
            executor = executor.with_count_plan(PreparedPlan::prepare(count, Arc::clone(metamodel))?);
        }
        Ok((shape, executor))
    }

    fn skeleton(&self, metamodel: &Metamodel, entity: &str) -> Result<QueryPlan> {
        let text = match (&self.kind, &self.text) {
            (MethodKind::Derived, _) => {
                return MethodDescriptor::parse(&self.name)?.to_plan(metamodel, entity);
            }
            (_, Some(text)) => text,
            (_, None) => {
                return Err(Error::descriptor(format!("method {} has no query text", self.name)))
            }
        };
        let plan = parse_query(text)?;
        if plan.entity != entity {
            return Err(Error::descriptor(format!(
                "method {} queries {} on a {} repository",
                self.name, plan.entity, entity
            )));
        }
        match (self.kind, plan.action.is_bulk()) {
            (MethodKind::Query, true) => Err(Error::descriptor(format!(
                "method {} writes data and must be declared modifying",
                self.name
            ))),
            (MethodKind::Modifying, false) => Err(Error::descriptor(format!(
                "modifying method {} must be an update or delete",
                self.name
            ))),
            _ => Ok(plan),
        }
    }

    /// True when the name alone describes a valid derived query.
    pub(crate) fn is_derivable(&self, metamodel: &Metamodel, entity: &str) -> bool {
        MethodDescriptor::parse(&self.name)
            .and_then(|d| d.to_plan(metamodel, entity))
            .is_ok()
    }
}

/// An explicit and a derived query competing for the same method name.
///
/// The explicit query always wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodConflict {
    pub method: String,
    pub kept: MethodKind,
    pub shadowed: MethodKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::schema::{EntityModelBuilder, IdStrategy};
    use quarry_core::DataType;

    fn metamodel() -> Arc<Metamodel> {
        let member = EntityModelBuilder::new("Member")
            .unwrap()
            .id("id", DataType::Int64, IdStrategy::Generated)
            .unwrap()
            .attribute("username", DataType::String)
            .unwrap()
            .attribute("age", DataType::Int32)
            .unwrap()
            .build()
            .unwrap();
        Arc::new(Metamodel::builder().entity(member).build().unwrap())
    }

    #[test]
    fn test_default_shapes() {
        let mm = metamodel();
        let (shape, _) = Method::derived("findByUsername").compile(&mm, "Member").unwrap();
        assert_eq!(shape, ReturnShape::List);
        let (shape, _) = Method::derived("countByAge").compile(&mm, "Member").unwrap();
        assert_eq!(shape, ReturnShape::Count);
        let (shape, _) = Method::modifying("bulkAgePlus", "update Member m set m.age = m.age + 1 where m.age >= :age")
            .compile(&mm, "Member")
            .unwrap();
        assert_eq!(shape, ReturnShape::Affected);
    }

    #[test]
    fn test_incompatible_shape_rejected() {
        let err = Method::derived("countByAge")
            .returning(ReturnShape::Page)
            .compile(&metamodel(), "Member")
            .unwrap_err();
        assert!(matches!(err, Error::Descriptor { .. }));
    }

    #[test]
    fn test_bulk_text_needs_modifying() {
        let mm = metamodel();
        let err = Method::query("bump", "update Member m set m.age = 1")
            .compile(&mm, "Member")
            .unwrap_err();
        assert!(matches!(err, Error::Descriptor { .. }));
        let err = Method::modifying("read", "select m from Member m")
            .compile(&mm, "Member")
            .unwrap_err();
        assert!(matches!(err, Error::Descriptor { .. }));
    }

    #[test]
    fn test_wrong_entity_rejected() {
        let err = Method::query("teams", "select t from Team t")
            .compile(&metamodel(), "Member")
            .unwrap_err();
        assert!(err.is_plan_error());
    }

    #[test]
    fn test_count_query_must_count() {
        let err = Method::query("all", "select m from Member m")
            .returning(ReturnShape::Page)
            .count_query("select m from Member m")
            .compile(&metamodel(), "Member")
            .unwrap_err();
        assert!(matches!(err, Error::Descriptor { .. }));
    }

    #[test]
    fn test_is_derivable() {
        let mm = metamodel();
        assert!(Method::query("findByUsername", "select m from Member m").is_derivable(&mm, "Member"));
        assert!(!Method::query("membersByQuery", "select m from Member m").is_derivable(&mm, "Member"));
    }
}
