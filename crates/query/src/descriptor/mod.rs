//! Method descriptors: query intent encoded in a method name.
//!
//! A descriptor such as `findTop3DistinctByUsernameAndAgeGreaterThanOrderByAgeDesc`
//! is split into a subject (`find`, qualifiers `Top3`, `Distinct`), a
//! predicate clause (`UsernameAndAgeGreaterThan`) and an order clause
//! (`AgeDesc`). `Or` binds looser than `And`. Each predicate part consumes
//! consecutive positional parameters starting at `?1`.
//!
//! ```
//! use quarry_query::descriptor::{MethodDescriptor, Subject};
//!
//! let d = MethodDescriptor::parse("findByUsernameAndAgeGreaterThan").unwrap();
//! assert_eq!(d.subject(), Subject::Find);
//! assert_eq!(d.parameter_count(), 2);
//! ```

mod part;

pub use part::{IgnoreCase, Part};

use crate::ast::{Condition, ParamRef, Predicate, Term};
use crate::planner::{Action, QueryPlan};
use crate::sort::{Direction, Order, Sort};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use part::{split_on_keyword, split_order_clause, strip_any_suffix};
use quarry_core::schema::Metamodel;
use quarry_core::{DataType, Error, Result};

/// The action a descriptor names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subject {
    Find,
    Count,
    Exists,
    Delete,
}

const PREFIXES: &[(&str, Subject)] = &[
    ("find", Subject::Find),
    ("read", Subject::Find),
    ("get", Subject::Find),
    ("query", Subject::Find),
    ("search", Subject::Find),
    ("stream", Subject::Find),
    ("count", Subject::Count),
    ("exists", Subject::Exists),
    ("delete", Subject::Delete),
    ("remove", Subject::Delete),
];

/// A parsed method descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    subject: Subject,
    distinct: bool,
    limit: Option<usize>,
    /// Or-groups of and-connected parts.
    groups: Vec<Vec<Part>>,
    /// `(property, descending)` pairs.
    order: Vec<(String, bool)>,
}

impl MethodDescriptor {
    /// Parses a descriptor. Property names are checked later by `to_plan`.
    pub fn parse(name: &str) -> Result<Self> {
        let (prefix, subject) = PREFIXES
            .iter()
            .find(|(prefix, _)| {
                name.starts_with(prefix)
                    && name[prefix.len()..]
                        .chars()
                        .next()
                        .map_or(true, |c| c.is_ascii_uppercase())
            })
            .copied()
            .ok_or_else(|| {
                Error::descriptor(format!("'{}' does not start with a query action", name))
            })?;
        let rest = &name[prefix.len()..];

        let (subject_clause, predicate_clause) = match find_by(rest) {
            Some(i) => (&rest[..i], &rest[i + 2..]),
            None => (rest, ""),
        };

        let distinct = subject_clause.contains("Distinct");
        let limit = parse_limit(subject_clause)?;
        if limit.is_some() && subject != Subject::Find {
            return Err(Error::descriptor(format!(
                "'{}' limits results but is not a find method",
                name
            )));
        }

        let (predicate_clause, order) = if let Some(order) = predicate_clause.strip_prefix("OrderBy") {
            ("", split_order_clause(order)?)
        } else {
            let mut pieces = split_on_keyword(predicate_clause, "OrderBy");
            match pieces.len() {
                1 => (pieces.remove(0), Vec::new()),
                2 => (pieces[0], split_order_clause(pieces[1])?),
                _ => {
                    return Err(Error::descriptor(format!(
                        "'{}' has more than one OrderBy clause",
                        name
                    )))
                }
            }
        };

        let (predicate_clause, all_ignore_case) =
            match strip_any_suffix(predicate_clause, &["AllIgnoreCase", "AllIgnoringCase"]) {
                Some(body) => (body, true),
                None => (predicate_clause, false),
            };

        let mut groups = Vec::new();
        if !predicate_clause.is_empty() {
            for or_part in split_on_keyword(predicate_clause, "Or") {
                let mut parts = Vec::new();
                for and_part in split_on_keyword(or_part, "And") {
                    if and_part.is_empty() {
                        return Err(Error::descriptor(format!(
                            "'{}' has an empty predicate part",
                            name
                        )));
                    }
                    parts.push(Part::parse(and_part, all_ignore_case)?);
                }
                groups.push(parts);
            }
        }

        Ok(Self {
            name: name.to_string(),
            subject,
            distinct,
            limit,
            groups,
            order,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Returns the `First<N>`/`Top<N>` cap.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Iterates over every predicate part in declaration order.
    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.groups.iter().flatten()
    }

    /// Returns the number of positional parameters the method takes.
    pub fn parameter_count(&self) -> usize {
        self.parts().map(|p| p.operator.arity().slots()).sum()
    }

    /// Resolves every property against `entity` and builds the plan.
    pub fn to_plan(&self, metamodel: &Metamodel, entity: &str) -> Result<QueryPlan> {
        let mut next_param = 1;
        let mut disjuncts = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let mut conjuncts = Vec::with_capacity(group.len());
            for part in group {
                let attr = metamodel.resolve_property(entity, &part.property)?;
                let is_string = attr.data_type() == DataType::String;
                let ignore_case = match part.ignore_case {
                    IgnoreCase::Never => false,
                    IgnoreCase::WhenPossible => is_string && part.operator.supports_ignore_case(),
                    IgnoreCase::Always if is_string => true,
                    IgnoreCase::Always => {
                        return Err(Error::descriptor(format!(
                            "Unable to ignore case of {:?} property '{}' in {}",
                            attr.data_type(),
                            attr.path(),
                            self.name
                        )))
                    }
                };
                let slots = part.operator.arity().slots();
                let operands = (next_param..next_param + slots)
                    .map(|i| Term::Param(ParamRef::Positional(i)))
                    .collect();
                next_param += slots;
                conjuncts.push(Predicate::condition(Condition {
                    path: attr.path(),
                    operator: part.operator,
                    operands,
                    ignore_case,
                }));
            }
            disjuncts.push(Predicate::all(&conjuncts));
        }
        let filter = Predicate::any(&disjuncts);

        let mut orders = Vec::with_capacity(self.order.len());
        for (property, descending) in &self.order {
            let attr = metamodel.resolve_property(entity, property)?;
            orders.push(Order {
                property: attr.path(),
                direction: if *descending {
                    Direction::Desc
                } else {
                    Direction::Asc
                },
                ignore_case: false,
            });
        }

        let action = match self.subject {
            Subject::Find => Action::Select,
            Subject::Count => Action::Count,
            Subject::Exists => Action::Exists,
            Subject::Delete => Action::Delete,
        };
        let mut plan = QueryPlan::select(entity)
            .with_action(action)
            .with_filter(filter)
            .with_sort(Sort::by_orders(orders))
            .distinct(self.distinct);
        plan.limit = self.limit;
        log::debug!(
            "event=descriptor_planned module=descriptor method={} entity={} params={}",
            self.name,
            entity,
            self.parameter_count()
        );
        Ok(plan)
    }
}

/// Finds the first `By` that starts a predicate clause.
fn find_by(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    (0..s.len().saturating_sub(1)).find(|&i| {
        bytes[i] == b'B'
            && bytes[i + 1] == b'y'
            && bytes.get(i + 2).map_or(true, |c| c.is_ascii_uppercase())
    })
}

/// Parses `First<N>`/`Top<N>` after an optional `Distinct`.
fn parse_limit(subject: &str) -> Result<Option<usize>> {
    let s = subject.strip_prefix("Distinct").unwrap_or(subject);
    let digits_start = if let Some(rest) = s.strip_prefix("First") {
        rest
    } else if let Some(rest) = s.strip_prefix("Top") {
        rest
    } else {
        return Ok(None);
    };
    let digits: String = digits_start.chars().take_while(|c| c.is_ascii_digit()).collect();
    let after = &digits_start[digits.len()..];
    if after.chars().next().is_some_and(|c| !c.is_ascii_uppercase()) {
        return Ok(None);
    }
    if digits.is_empty() {
        return Ok(Some(1));
    }
    match digits.parse::<usize>() {
        Ok(0) | Err(_) => Err(Error::descriptor(format!(
            "Invalid result limit '{}'",
            subject
        ))),
        Ok(n) => Ok(Some(n)),
    }
}
