//! Filter evaluation.
//!
//! `Filter` is the bound form of a predicate tree: paths are resolved to
//! columns and parameters to values. Comparisons against null or a missing
//! related row are false; `IsNull` is the only way to match them.

use crate::ast::Operator;
use crate::statement::{ColumnRef, ResultRow};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use quarry_core::pattern_match;
use quarry_core::Value;

/// A bound predicate tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// Matches every row.
    All,
    Compare {
        column: ColumnRef,
        operator: Operator,
        operands: Vec<Value>,
        ignore_case: bool,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Evaluates the filter against a row and its joined rows.
    pub fn matches(&self, row: &ResultRow) -> bool {
        match self {
            Filter::All => true,
            Filter::Compare {
                column,
                operator,
                operands,
                ignore_case,
            } => compare(row.value(column), *operator, operands, *ignore_case),
            Filter::And(children) => children.iter().all(|f| f.matches(row)),
            Filter::Or(children) => children.iter().any(|f| f.matches(row)),
            Filter::Not(inner) => !inner.matches(row),
        }
    }

    /// Returns the joins the filter reads, by index.
    pub fn joins(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_joins(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_joins(&self, out: &mut Vec<usize>) {
        match self {
            Filter::All => {}
            Filter::Compare { column, .. } => out.extend(column.join),
            Filter::And(children) | Filter::Or(children) => {
                children.iter().for_each(|f| f.collect_joins(out))
            }
            Filter::Not(inner) => inner.collect_joins(out),
        }
    }
}

fn compare(value: Option<&Value>, operator: Operator, operands: &[Value], ignore_case: bool) -> bool {
    let value = match value {
        Some(v) if !v.is_null() => v,
        _ => return operator == Operator::IsNull,
    };
    let first = operands.first();
    match operator {
        Operator::IsNull => false,
        Operator::IsNotNull => true,
        Operator::True => value.as_bool() == Some(true),
        Operator::False => value.as_bool() == Some(false),
        Operator::Equals => ordered(value, first, ignore_case, Ordering::is_eq),
        Operator::NotEquals => ordered(value, first, ignore_case, Ordering::is_ne),
        Operator::GreaterThan | Operator::After => {
            ordered(value, first, ignore_case, Ordering::is_gt)
        }
        Operator::GreaterThanEqual => ordered(value, first, ignore_case, Ordering::is_ge),
        Operator::LessThan | Operator::Before => ordered(value, first, ignore_case, Ordering::is_lt),
        Operator::LessThanEqual => ordered(value, first, ignore_case, Ordering::is_le),
        Operator::Between => match (operands.first(), operands.get(1)) {
            (Some(low), Some(high)) if !low.is_null() && !high.is_null() => {
                cmp(value, low, ignore_case) != Ordering::Less
                    && cmp(value, high, ignore_case) != Ordering::Greater
            }
            _ => false,
        },
        Operator::In => operands
            .iter()
            .any(|o| cmp(value, o, ignore_case) == Ordering::Equal),
        Operator::NotIn => operands
            .iter()
            .all(|o| !o.is_null() && cmp(value, o, ignore_case) != Ordering::Equal),
        Operator::Like | Operator::NotLike => {
            let (Some(text), Some(pattern)) = (value.as_str(), first.and_then(Value::as_str)) else {
                return false;
            };
            let hit = if ignore_case {
                pattern_match::like_ignore_case(text, pattern)
            } else {
                pattern_match::like(text, pattern)
            };
            hit == (operator == Operator::Like)
        }
        Operator::StartingWith
        | Operator::EndingWith
        | Operator::Containing
        | Operator::NotContaining => {
            let (Some(text), Some(needle)) = (value.as_str(), first.and_then(Value::as_str)) else {
                return false;
            };
            let (text, needle) = fold(text, needle, ignore_case);
            match operator {
                Operator::StartingWith => text.starts_with(needle.as_str()),
                Operator::EndingWith => text.ends_with(needle.as_str()),
                Operator::Containing => text.contains(needle.as_str()),
                _ => !text.contains(needle.as_str()),
            }
        }
    }
}

fn ordered(value: &Value, operand: Option<&Value>, ignore_case: bool, accept: fn(Ordering) -> bool) -> bool {
    match operand {
        Some(o) if !o.is_null() => accept(cmp(value, o, ignore_case)),
        _ => false,
    }
}

fn fold(a: &str, b: &str, ignore_case: bool) -> (String, String) {
    if ignore_case {
        (a.to_lowercase(), b.to_lowercase())
    } else {
        (String::from(a), String::from(b))
    }
}

/// Compares two values, folding case for strings when requested.
pub(crate) fn cmp(a: &Value, b: &Value, ignore_case: bool) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) if ignore_case => {
            x.to_lowercase().cmp(&y.to_lowercase())
        }
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use quarry_core::Row;

    fn member(username: &str, age: i32, team: Option<&str>) -> ResultRow {
        ResultRow {
            row: Row::new(vec![Value::Int64(1), Value::from(username), Value::Int32(age)]),
            joined: vec![team.map(|t| Row::new(vec![Value::Int64(9), Value::from(t)]))],
        }
    }

    fn leaf(column: ColumnRef, operator: Operator, operands: Vec<Value>) -> Filter {
        Filter::Compare {
            column,
            operator,
            operands,
            ignore_case: false,
        }
    }

    #[test]
    fn test_comparisons() {
        let row = member("member1", 20, Some("teamA"));
        let age = ColumnRef::root(2);
        assert!(leaf(age, Operator::GreaterThanEqual, vec![Value::Int32(20)]).matches(&row));
        assert!(!leaf(age, Operator::GreaterThan, vec![Value::Int32(20)]).matches(&row));
        // Cross-width numeric comparison.
        assert!(leaf(age, Operator::LessThan, vec![Value::Int64(21)]).matches(&row));
        assert!(leaf(age, Operator::Between, vec![Value::Int32(10), Value::Int32(20)]).matches(&row));
        assert!(leaf(age, Operator::In, vec![Value::Int32(10), Value::Int32(20)]).matches(&row));
        assert!(!leaf(age, Operator::NotIn, vec![Value::Int32(20)]).matches(&row));
    }

    #[test]
    fn test_string_operators() {
        let row = member("Member1", 20, None);
        let name = ColumnRef::root(1);
        assert!(leaf(name, Operator::StartingWith, vec![Value::from("Mem")]).matches(&row));
        assert!(!leaf(name, Operator::StartingWith, vec![Value::from("mem")]).matches(&row));
        let folded = Filter::Compare {
            column: name,
            operator: Operator::StartingWith,
            operands: vec![Value::from("mem")],
            ignore_case: true,
        };
        assert!(folded.matches(&row));
        assert!(leaf(name, Operator::Like, vec![Value::from("%ber_")]).matches(&row));
        assert!(leaf(name, Operator::NotContaining, vec![Value::from("xyz")]).matches(&row));
        assert!(leaf(name, Operator::EndingWith, vec![Value::from("1")]).matches(&row));
    }

    #[test]
    fn test_null_semantics() {
        let row = member("member1", 20, None);
        let team_name = ColumnRef::joined(0, 1);
        assert!(leaf(team_name, Operator::IsNull, vec![]).matches(&row));
        assert!(!leaf(team_name, Operator::Equals, vec![Value::from("teamA")]).matches(&row));
        assert!(!leaf(team_name, Operator::NotEquals, vec![Value::from("teamA")]).matches(&row));
        let has_team = Filter::Not(Box::new(leaf(team_name, Operator::IsNull, vec![])));
        assert!(has_team.matches(&member("member2", 1, Some("teamA"))));
        assert!(!has_team.matches(&row));
    }

    #[test]
    fn test_connectives() {
        let row = member("member1", 20, Some("teamA"));
        let f = Filter::Or(vec![
            leaf(ColumnRef::root(1), Operator::Equals, vec![Value::from("nobody")]),
            Filter::And(vec![
                leaf(ColumnRef::root(2), Operator::GreaterThan, vec![Value::Int32(10)]),
                leaf(ColumnRef::joined(0, 1), Operator::Equals, vec![Value::from("teamA")]),
            ]),
        ]);
        assert!(f.matches(&row));
        assert_eq!(f.joins(), vec![0]);
        assert!(Filter::All.matches(&row));
    }
}
