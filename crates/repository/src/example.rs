//! Query by example.
//!
//! A probe entity plus a matcher becomes a predicate: every set attribute
//! of the probe that is not ignored contributes one condition. Strings and
//! timestamps still at their initial value count as unset. Attributes of
//! primitive type hold their default (e.g. `0`) on a fresh probe and take
//! part unless ignored.

use crate::record::EntityRecord;
use quarry_core::schema::{Attribute, AttributeKind, Metamodel};
use quarry_core::{DataType, Result, Value};
use quarry_query::Predicate;

/// How string attributes of the probe are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StringMatcher {
    #[default]
    Exact,
    Starting,
    Ending,
    Containing,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExampleMatcher {
    ignored: Vec<String>,
    strings: StringMatcher,
    ignore_case: bool,
    any: bool,
}

impl ExampleMatcher {
    /// All conditions must hold.
    pub fn matching() -> Self {
        Self::default()
    }

    /// At least one condition must hold.
    pub fn matching_any() -> Self {
        Self {
            any: true,
            ..Self::default()
        }
    }

    pub fn with_ignore_paths(mut self, paths: &[&str]) -> Self {
        self.ignored.extend(paths.iter().map(|p| p.to_string()));
        self
    }

    pub fn with_string_matcher(mut self, strings: StringMatcher) -> Self {
        self.strings = strings;
        self
    }

    pub fn with_ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    fn is_ignored(&self, path: &str) -> bool {
        self.ignored.iter().any(|p| p == path)
    }
}

#[derive(Clone, Debug)]
pub struct Example {
    probe: EntityRecord,
    matcher: ExampleMatcher,
}

impl Example {
    pub fn of(probe: EntityRecord) -> Self {
        Self::matching(probe, ExampleMatcher::matching())
    }

    pub fn matching(probe: EntityRecord, matcher: ExampleMatcher) -> Self {
        Self { probe, matcher }
    }

    pub fn probe(&self) -> &EntityRecord {
        &self.probe
    }

    /// Builds the predicate this example stands for.
    ///
    /// A set relation matches on the identity of the related entity.
    pub fn to_predicate(&self, metamodel: &Metamodel) -> Result<Predicate> {
        let model = metamodel.entity(self.probe.entity())?;
        let mut conditions = Vec::new();
        for attr in model.attributes() {
            let Some(value) = self.probe.row().get(attr.position()) else {
                continue;
            };
            if is_unset(attr, value) || self.matcher.is_ignored(attr.name()) {
                continue;
            }
            let condition = match attr.kind() {
                AttributeKind::ForeignKey { target } => {
                    let target_id = metamodel.entity(target)?.id().name().to_string();
                    let path = format!("{}.{}", attr.name(), target_id);
                    if self.matcher.is_ignored(&path) {
                        continue;
                    }
                    Predicate::eq(&path, value.clone())
                }
                _ if attr.data_type() == DataType::String => self.string_condition(attr.name(), value),
                _ => Predicate::eq(attr.name(), value.clone()),
            };
            conditions.push(condition);
        }

        Ok(if self.matcher.any {
            Predicate::any(&conditions)
        } else {
            Predicate::all(&conditions)
        })
    }

    fn string_condition(&self, path: &str, value: &Value) -> Predicate {
        let text = value.as_str().unwrap_or_default().to_string();
        let condition = match self.matcher.strings {
            StringMatcher::Exact => Predicate::eq(path, text),
            StringMatcher::Starting => Predicate::starts_with(path, text),
            StringMatcher::Ending => Predicate::ends_with(path, text),
            StringMatcher::Containing => Predicate::contains(path, text),
        };
        if self.matcher.ignore_case {
            condition.ignoring_case()
        } else {
            condition
        }
    }
}

fn is_unset(attr: &Attribute, value: &Value) -> bool {
    value.is_null() || (!attr.data_type().is_primitive() && *value == attr.initial_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::schema::{EntityModelBuilder, IdStrategy};
    use quarry_query::ast::PredicateKind;
    use std::sync::Arc;

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

    fn paths(predicate: &Predicate) -> Vec<String> {
        let mut paths = Vec::new();
        predicate.for_each_condition(&mut |c| paths.push(c.path.clone()));
        paths
    }

    #[test]
    fn test_primitive_default_included() {
        let mm = metamodel();
        let probe = EntityRecord::create(mm.clone(), "Member")
            .unwrap()
            .with("username", "m1")
            .unwrap();
        let predicate = Example::of(probe.clone()).to_predicate(&mm).unwrap();
        assert_eq!(paths(&predicate), vec!["username", "age"]);

        let matcher = ExampleMatcher::matching().with_ignore_paths(&["age"]);
        let predicate = Example::matching(probe, matcher).to_predicate(&mm).unwrap();
        assert_eq!(paths(&predicate), vec!["username"]);
    }

    #[test]
    fn test_relation_matches_on_identity() {
        let mm = metamodel();
        let probe = EntityRecord::create(mm.clone(), "Member")
            .unwrap()
            .with("team", 3i64)
            .unwrap();
        let matcher = ExampleMatcher::matching().with_ignore_paths(&["age"]);
        let predicate = Example::matching(probe, matcher).to_predicate(&mm).unwrap();
        assert_eq!(paths(&predicate), vec!["team.id"]);
    }

    #[test]
    fn test_unset_string_skipped() {
        let mm = metamodel();
        let probe = EntityRecord::create(mm.clone(), "Member")
            .unwrap()
            .with("age", 10)
            .unwrap();
        let predicate = Example::of(probe).to_predicate(&mm).unwrap();
        assert_eq!(paths(&predicate), vec!["age"]);
    }

    #[test]
    fn test_empty_probe_matches_everything() {
        let mm = metamodel();
        let probe = EntityRecord::create(mm.clone(), "Team").unwrap();
        let predicate = Example::of(probe).to_predicate(&mm).unwrap();
        assert!(matches!(predicate.kind(), PredicateKind::NoOp));
    }

    #[test]
    fn test_string_matcher_ignore_case() {
        let mm = metamodel();
        let probe = EntityRecord::create(mm.clone(), "Team")
            .unwrap()
            .with("name", "TEAM")
            .unwrap();
        let matcher = ExampleMatcher::matching()
            .with_string_matcher(StringMatcher::Starting)
            .with_ignore_case();
        let predicate = Example::matching(probe, matcher).to_predicate(&mm).unwrap();
        let mut seen = Vec::new();
        predicate.for_each_condition(&mut |c| seen.push((c.operator, c.ignore_case)));
        assert_eq!(seen, vec![(quarry_query::Operator::StartingWith, true)]);
    }
}
