//! Immutable, composable predicate trees.
//!
//! A `Predicate` is a cheap handle onto a shared node. Composition with
//! `and`, `or` and `negate` always builds a new tree and never touches the
//! operands, so predicates can be stored in statics of a repository and
//! reused across calls.
//!
//! ```
//! use quarry_query::ast::Predicate;
//!
//! let adults = Predicate::ge("age", 18);
//! let named = Predicate::when_text("username", Some(""), Predicate::eq);
//! // A blank filter value contributes nothing.
//! assert_eq!(adults.and(&named), adults);
//! ```

use super::operator::Operator;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use quarry_core::Value;

/// A reference to a runtime argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamRef {
    /// 1-based positional slot (`?1`, or the n-th descriptor parameter).
    Positional(usize),
    /// Named slot (`:username`).
    Named(String),
}

impl fmt::Display for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamRef::Positional(i) => write!(f, "?{}", i),
            ParamRef::Named(name) => write!(f, ":{}", name),
        }
    }
}

/// One operand of a condition.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Value(Value),
    Param(ParamRef),
}

impl Term {
    pub fn value(v: impl Into<Value>) -> Self {
        Term::Value(v.into())
    }
}

/// A leaf condition: attribute path, operator and operands.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    /// Dotted path relative to the root entity, e.g. `team.name`.
    pub path: String,
    pub operator: Operator,
    pub operands: Vec<Term>,
    pub ignore_case: bool,
}

#[derive(Debug, PartialEq)]
enum Node {
    NoOp,
    Leaf(Condition),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Predicate),
}

/// A borrowed view of a predicate node, for consumers that walk the tree.
#[derive(Debug)]
pub enum PredicateKind<'a> {
    NoOp,
    Leaf(&'a Condition),
    And(&'a [Predicate]),
    Or(&'a [Predicate]),
    Not(&'a Predicate),
}

/// An immutable predicate tree.
#[derive(Clone, PartialEq)]
pub struct Predicate {
    node: Arc<Node>,
}

impl Predicate {
    fn from_node(node: Node) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    /// The predicate that means "filter not applicable".
    pub fn no_op() -> Self {
        Self::from_node(Node::NoOp)
    }

    /// Creates a leaf predicate.
    pub fn condition(condition: Condition) -> Self {
        Self::from_node(Node::Leaf(condition))
    }

    /// Creates a leaf over literal or parameter operands.
    pub fn leaf(path: impl Into<String>, operator: Operator, operands: Vec<Term>) -> Self {
        Self::condition(Condition {
            path: path.into(),
            operator,
            operands,
            ignore_case: false,
        })
    }

    pub fn is_no_op(&self) -> bool {
        matches!(*self.node, Node::NoOp)
    }

    /// Returns a borrowed view of the root node.
    pub fn kind(&self) -> PredicateKind<'_> {
        match &*self.node {
            Node::NoOp => PredicateKind::NoOp,
            Node::Leaf(c) => PredicateKind::Leaf(c),
            Node::And(children) => PredicateKind::And(children),
            Node::Or(children) => PredicateKind::Or(children),
            Node::Not(inner) => PredicateKind::Not(inner),
        }
    }

    /// Conjunction. A no-op on either side yields the other side.
    pub fn and(&self, other: &Predicate) -> Predicate {
        self.combine(other, true)
    }

    /// Disjunction. A no-op on either side yields the other side.
    pub fn or(&self, other: &Predicate) -> Predicate {
        self.combine(other, false)
    }

    fn combine(&self, other: &Predicate, conjunction: bool) -> Predicate {
        if self.is_no_op() {
            return other.clone();
        }
        if other.is_no_op() {
            return self.clone();
        }
        let mut children = Vec::new();
        for side in [self, other] {
            match (&*side.node, conjunction) {
                (Node::And(nested), true) | (Node::Or(nested), false) => {
                    children.extend(nested.iter().cloned())
                }
                _ => children.push(side.clone()),
            }
        }
        if conjunction {
            Self::from_node(Node::And(children))
        } else {
            Self::from_node(Node::Or(children))
        }
    }

    /// Logical negation. The no-op negates to itself; double negation unwraps.
    pub fn negate(&self) -> Predicate {
        match &*self.node {
            Node::NoOp => self.clone(),
            Node::Not(inner) => inner.clone(),
            _ => Self::from_node(Node::Not(self.clone())),
        }
    }

    /// Conjunction of every predicate in `iter`; the no-op when empty.
    pub fn all<'a>(iter: impl IntoIterator<Item = &'a Predicate>) -> Predicate {
        iter.into_iter().fold(Predicate::no_op(), |acc, p| acc.and(p))
    }

    /// Disjunction of every predicate in `iter`; the no-op when empty.
    pub fn any<'a>(iter: impl IntoIterator<Item = &'a Predicate>) -> Predicate {
        iter.into_iter().fold(Predicate::no_op(), |acc, p| acc.or(p))
    }

    /// Returns a copy whose leaves compare strings ignoring case.
    pub fn ignoring_case(&self) -> Predicate {
        self.map_leaves(&mut |c| {
            let mut c = c.clone();
            c.ignore_case = c.operator.supports_ignore_case();
            c
        })
    }

    fn map_leaves(&self, f: &mut dyn FnMut(&Condition) -> Condition) -> Predicate {
        match &*self.node {
            Node::NoOp => self.clone(),
            Node::Leaf(c) => Self::condition(f(c)),
            Node::And(children) => {
                Self::from_node(Node::And(children.iter().map(|p| p.map_leaves(f)).collect()))
            }
            Node::Or(children) => {
                Self::from_node(Node::Or(children.iter().map(|p| p.map_leaves(f)).collect()))
            }
            Node::Not(inner) => Self::from_node(Node::Not(inner.map_leaves(f))),
        }
    }

    /// Visits every leaf condition in depth-first order.
    pub fn for_each_condition<'a>(&'a self, f: &mut dyn FnMut(&'a Condition)) {
        match &*self.node {
            Node::NoOp => {}
            Node::Leaf(c) => f(c),
            Node::And(children) | Node::Or(children) => {
                children.iter().for_each(|p| p.for_each_condition(f))
            }
            Node::Not(inner) => inner.for_each_condition(f),
        }
    }

    /// Returns every parameter referenced by the tree.
    pub fn params(&self) -> Vec<&ParamRef> {
        let mut out = Vec::new();
        self.for_each_condition(&mut |c| {
            for term in &c.operands {
                if let Term::Param(p) = term {
                    out.push(p);
                }
            }
        });
        out
    }

    // ---------------------------------------------------------------
    // Leaf constructors
    // ---------------------------------------------------------------

    pub fn eq(path: &str, value: impl Into<Value>) -> Self {
        Self::leaf(path, Operator::Equals, vec![Term::Value(value.into())])
    }

    pub fn ne(path: &str, value: impl Into<Value>) -> Self {
        Self::leaf(path, Operator::NotEquals, vec![Term::Value(value.into())])
    }

    pub fn gt(path: &str, value: impl Into<Value>) -> Self {
        Self::leaf(path, Operator::GreaterThan, vec![Term::Value(value.into())])
    }

    pub fn ge(path: &str, value: impl Into<Value>) -> Self {
        Self::leaf(path, Operator::GreaterThanEqual, vec![Term::Value(value.into())])
    }

    pub fn lt(path: &str, value: impl Into<Value>) -> Self {
        Self::leaf(path, Operator::LessThan, vec![Term::Value(value.into())])
    }

    pub fn le(path: &str, value: impl Into<Value>) -> Self {
        Self::leaf(path, Operator::LessThanEqual, vec![Term::Value(value.into())])
    }

    pub fn between(path: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::leaf(
            path,
            Operator::Between,
            vec![Term::Value(low.into()), Term::Value(high.into())],
        )
    }

    pub fn in_list<V: Into<Value>>(path: &str, values: impl IntoIterator<Item = V>) -> Self {
        let operands = values.into_iter().map(|v| Term::Value(v.into())).collect();
        Self::leaf(path, Operator::In, operands)
    }

    pub fn not_in<V: Into<Value>>(path: &str, values: impl IntoIterator<Item = V>) -> Self {
        let operands = values.into_iter().map(|v| Term::Value(v.into())).collect();
        Self::leaf(path, Operator::NotIn, operands)
    }

    pub fn is_null(path: &str) -> Self {
        Self::leaf(path, Operator::IsNull, Vec::new())
    }

    pub fn is_not_null(path: &str) -> Self {
        Self::leaf(path, Operator::IsNotNull, Vec::new())
    }

    pub fn like(path: &str, pattern: impl Into<String>) -> Self {
        Self::leaf(path, Operator::Like, vec![Term::Value(Value::String(pattern.into()))])
    }

    pub fn not_like(path: &str, pattern: impl Into<String>) -> Self {
        Self::leaf(path, Operator::NotLike, vec![Term::Value(Value::String(pattern.into()))])
    }

    pub fn starts_with(path: &str, prefix: impl Into<String>) -> Self {
        Self::leaf(path, Operator::StartingWith, vec![Term::Value(Value::String(prefix.into()))])
    }

    pub fn ends_with(path: &str, suffix: impl Into<String>) -> Self {
        Self::leaf(path, Operator::EndingWith, vec![Term::Value(Value::String(suffix.into()))])
    }

    pub fn contains(path: &str, infix: impl Into<String>) -> Self {
        Self::leaf(path, Operator::Containing, vec![Term::Value(Value::String(infix.into()))])
    }

    pub fn not_contains(path: &str, infix: impl Into<String>) -> Self {
        Self::leaf(
            path,
            Operator::NotContaining,
            vec![Term::Value(Value::String(infix.into()))],
        )
    }

    pub fn is_true(path: &str) -> Self {
        Self::leaf(path, Operator::True, Vec::new())
    }

    pub fn is_false(path: &str) -> Self {
        Self::leaf(path, Operator::False, Vec::new())
    }

    /// Datetime strictly before `millis`.
    pub fn before(path: &str, millis: i64) -> Self {
        Self::leaf(path, Operator::Before, vec![Term::Value(Value::DateTime(millis))])
    }

    /// Datetime strictly after `millis`.
    pub fn after(path: &str, millis: i64) -> Self {
        Self::leaf(path, Operator::After, vec![Term::Value(Value::DateTime(millis))])
    }

    /// A leaf bound to a runtime parameter.
    pub fn param(path: &str, operator: Operator, param: ParamRef) -> Self {
        Self::leaf(path, operator, vec![Term::Param(param)])
    }

    /// Builds `make(path, value)` when the value is present, else the no-op.
    pub fn when<V>(path: &str, value: Option<V>, make: fn(&str, V) -> Predicate) -> Self {
        match value {
            Some(v) => make(path, v),
            None => Predicate::no_op(),
        }
    }

    /// Like `when`, but a blank string also yields the no-op.
    pub fn when_text(
        path: &str,
        value: Option<&str>,
        make: fn(&str, String) -> Predicate,
    ) -> Self {
        match value {
            Some(v) if !v.trim().is_empty() => make(path, String::from(v)),
            _ => Predicate::no_op(),
        }
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::no_op()
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.node {
            Node::NoOp => f.write_str("<no-op>"),
            Node::Leaf(c) => {
                let operands: Vec<String> = c
                    .operands
                    .iter()
                    .map(|t| match t {
                        Term::Value(v) => format!("{}", v),
                        Term::Param(p) => format!("{}", p),
                    })
                    .collect();
                write!(f, "{} {}", c.path, c.operator)?;
                if !operands.is_empty() {
                    write!(f, " [{}]", operands.join(", "))?;
                }
                if c.ignore_case {
                    f.write_str(" ignore-case")?;
                }
                Ok(())
            }
            Node::And(children) | Node::Or(children) => {
                let sep = if matches!(*self.node, Node::And(_)) {
                    " and "
                } else {
                    " or "
                };
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
            Node::Not(inner) => write!(f, "not {}", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_no_op_absorption() {
        let p = Predicate::eq("username", "member1");
        let q = Predicate::gt("age", 10);
        let noop = Predicate::no_op();
        assert_eq!(p.and(&q).and(&noop), p.and(&q));
        assert_eq!(noop.and(&p), p);
        assert_eq!(p.or(&noop), p);
        assert_eq!(noop.or(&noop), noop);
        assert_eq!(noop.negate(), noop);
    }

    #[test]
    fn test_composition_is_persistent() {
        let p = Predicate::eq("username", "member1");
        let q = Predicate::gt("age", 10);
        let combined = p.and(&q);
        // Operands are unchanged by composition.
        assert_eq!(p, Predicate::eq("username", "member1"));
        assert!(matches!(combined.kind(), PredicateKind::And(children) if children.len() == 2));
    }

    #[test]
    fn test_and_flattens() {
        let a = Predicate::eq("a", 1);
        let b = Predicate::eq("b", 2);
        let c = Predicate::eq("c", 3);
        let tree = a.and(&b).and(&c);
        match tree.kind() {
            PredicateKind::And(children) => assert_eq!(children.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
        // Mixed connectives nest.
        let mixed = a.or(&b).and(&c);
        assert!(matches!(mixed.kind(), PredicateKind::And(children) if children.len() == 2));
    }

    #[test]
    fn test_double_negation() {
        let p = Predicate::is_null("team.name");
        assert_eq!(p.negate().negate(), p);
        assert!(matches!(p.negate().kind(), PredicateKind::Not(_)));
    }

    #[test]
    fn test_when_helpers() {
        assert!(Predicate::when_text("team.name", None, Predicate::eq).is_no_op());
        assert!(Predicate::when_text("team.name", Some("   "), Predicate::eq).is_no_op());
        assert_eq!(
            Predicate::when_text("team.name", Some("teamA"), Predicate::eq),
            Predicate::eq("team.name", "teamA")
        );
        assert!(Predicate::when("age", None::<i32>, Predicate::ge).is_no_op());
    }

    #[test]
    fn test_params_and_display() {
        let p = Predicate::param("username", Operator::Equals, ParamRef::Named("name".into()))
            .and(&Predicate::param("age", Operator::GreaterThan, ParamRef::Positional(2)));
        assert_eq!(p.params().len(), 2);
        assert_eq!(p.to_string(), "(username Equals [:name] and age GreaterThan [?2])");
    }

    #[test]
    fn test_ignoring_case() {
        let p = Predicate::eq("username", "M").and(&Predicate::gt("age", 1)).ignoring_case();
        let mut flags = Vec::new();
        p.for_each_condition(&mut |c| flags.push(c.ignore_case));
        assert_eq!(flags, vec![true, false]);
    }
}
