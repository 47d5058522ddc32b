//! Comparison operators and the descriptor keyword table.

use core::fmt;

/// A comparison operator applied by a predicate leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Between,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Like,
    NotLike,
    StartingWith,
    EndingWith,
    Containing,
    NotContaining,
    True,
    False,
    Before,
    After,
}

/// How many operands an operator consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    /// No operand (`IsNull`, `True`).
    Nullary,
    /// One scalar operand.
    Unary,
    /// Two scalar operands (`Between`).
    Binary,
    /// One collection operand (`In`, `NotIn`).
    Collection,
}

impl Arity {
    /// Returns the number of parameter slots a descriptor reserves.
    pub fn slots(self) -> usize {
        match self {
            Arity::Nullary => 0,
            Arity::Unary | Arity::Collection => 1,
            Arity::Binary => 2,
        }
    }
}

impl Operator {
    pub fn arity(self) -> Arity {
        match self {
            Operator::IsNull | Operator::IsNotNull | Operator::True | Operator::False => {
                Arity::Nullary
            }
            Operator::Between => Arity::Binary,
            Operator::In | Operator::NotIn => Arity::Collection,
            _ => Arity::Unary,
        }
    }

    /// Returns true for operators that only apply to string attributes.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            Operator::Like
                | Operator::NotLike
                | Operator::StartingWith
                | Operator::EndingWith
                | Operator::Containing
                | Operator::NotContaining
        )
    }

    /// Returns true for operators that honor an ignore-case modifier.
    pub fn supports_ignore_case(self) -> bool {
        self.is_textual()
            || matches!(
                self,
                Operator::Equals | Operator::NotEquals | Operator::In | Operator::NotIn
            )
    }

    /// Returns the logical complement, used when a `not` wraps a single leaf.
    pub fn complement(self) -> Option<Operator> {
        Some(match self {
            Operator::Equals => Operator::NotEquals,
            Operator::NotEquals => Operator::Equals,
            Operator::In => Operator::NotIn,
            Operator::NotIn => Operator::In,
            Operator::IsNull => Operator::IsNotNull,
            Operator::IsNotNull => Operator::IsNull,
            Operator::Like => Operator::NotLike,
            Operator::NotLike => Operator::Like,
            Operator::Containing => Operator::NotContaining,
            Operator::NotContaining => Operator::Containing,
            _ => return None,
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A comparator keyword recognized at the end of a descriptor part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Supported(Operator),
    /// Recognized but not evaluated by quarry.
    Unsupported(&'static str),
}

/// Every comparator keyword, longest first so suffix matching is greedy.
pub const KEYWORDS: &[(&str, Keyword)] = &[
    ("IsGreaterThanEqual", Keyword::Supported(Operator::GreaterThanEqual)),
    ("GreaterThanEqual", Keyword::Supported(Operator::GreaterThanEqual)),
    ("IsLessThanEqual", Keyword::Supported(Operator::LessThanEqual)),
    ("IsNotContaining", Keyword::Supported(Operator::NotContaining)),
    ("IsStartingWith", Keyword::Supported(Operator::StartingWith)),
    ("IsGreaterThan", Keyword::Supported(Operator::GreaterThan)),
    ("LessThanEqual", Keyword::Supported(Operator::LessThanEqual)),
    ("NotContaining", Keyword::Supported(Operator::NotContaining)),
    ("MatchesRegex", Keyword::Unsupported("MatchesRegex")),
    ("IsEndingWith", Keyword::Supported(Operator::EndingWith)),
    ("IsContaining", Keyword::Supported(Operator::Containing)),
    ("StartingWith", Keyword::Supported(Operator::StartingWith)),
    ("GreaterThan", Keyword::Supported(Operator::GreaterThan)),
    ("NotContains", Keyword::Supported(Operator::NotContaining)),
    ("IsLessThan", Keyword::Supported(Operator::LessThan)),
    ("IsNotEmpty", Keyword::Unsupported("IsNotEmpty")),
    ("EndingWith", Keyword::Supported(Operator::EndingWith)),
    ("Containing", Keyword::Supported(Operator::Containing)),
    ("StartsWith", Keyword::Supported(Operator::StartingWith)),
    ("IsBetween", Keyword::Supported(Operator::Between)),
    ("IsNotNull", Keyword::Supported(Operator::IsNotNull)),
    ("IsNotLike", Keyword::Supported(Operator::NotLike)),
    ("IsBefore", Keyword::Supported(Operator::Before)),
    ("LessThan", Keyword::Supported(Operator::LessThan)),
    ("EndsWith", Keyword::Supported(Operator::EndingWith)),
    ("Contains", Keyword::Supported(Operator::Containing)),
    ("NotEmpty", Keyword::Unsupported("NotEmpty")),
    ("IsAfter", Keyword::Supported(Operator::After)),
    ("Between", Keyword::Supported(Operator::Between)),
    ("NotNull", Keyword::Supported(Operator::IsNotNull)),
    ("NotLike", Keyword::Supported(Operator::NotLike)),
    ("IsEmpty", Keyword::Unsupported("IsEmpty")),
    ("IsFalse", Keyword::Supported(Operator::False)),
    ("Matches", Keyword::Unsupported("Matches")),
    ("IsNotIn", Keyword::Supported(Operator::NotIn)),
    ("IsNull", Keyword::Supported(Operator::IsNull)),
    ("IsLike", Keyword::Supported(Operator::Like)),
    ("IsTrue", Keyword::Supported(Operator::True)),
    ("Before", Keyword::Supported(Operator::Before)),
    ("Equals", Keyword::Supported(Operator::Equals)),
    ("Within", Keyword::Unsupported("Within")),
    ("Exists", Keyword::Unsupported("Exists")),
    ("After", Keyword::Supported(Operator::After)),
    ("IsNot", Keyword::Supported(Operator::NotEquals)),
    ("False", Keyword::Supported(Operator::False)),
    ("NotIn", Keyword::Supported(Operator::NotIn)),
    ("Regex", Keyword::Unsupported("Regex")),
    ("Empty", Keyword::Unsupported("Empty")),
    ("Null", Keyword::Supported(Operator::IsNull)),
    ("Like", Keyword::Supported(Operator::Like)),
    ("True", Keyword::Supported(Operator::True)),
    ("Near", Keyword::Unsupported("Near")),
    ("IsIn", Keyword::Supported(Operator::In)),
    ("Not", Keyword::Supported(Operator::NotEquals)),
    ("Is", Keyword::Supported(Operator::Equals)),
    ("In", Keyword::Supported(Operator::In)),
];

/// Splits a descriptor part into its property expression and comparator.
///
/// Returns the longest keyword suffix that leaves a non-empty property;
/// a part without a keyword compares for equality.
pub fn split_keyword(part: &str) -> (&str, Keyword) {
    for (keyword, kind) in KEYWORDS {
        if part.len() > keyword.len() && part.ends_with(keyword) {
            let property = &part[..part.len() - keyword.len()];
            return (property, *kind);
        }
    }
    (part, Keyword::Supported(Operator::Equals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_sorted_longest_first() {
        for pair in KEYWORDS.windows(2) {
            assert!(pair[0].0.len() >= pair[1].0.len(), "{} before {}", pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn test_split_keyword() {
        assert_eq!(
            split_keyword("AgeGreaterThan"),
            ("Age", Keyword::Supported(Operator::GreaterThan))
        );
        assert_eq!(
            split_keyword("AgeGreaterThanEqual"),
            ("Age", Keyword::Supported(Operator::GreaterThanEqual))
        );
        assert_eq!(
            split_keyword("UsernameIsNotNull"),
            ("Username", Keyword::Supported(Operator::IsNotNull))
        );
        assert_eq!(
            split_keyword("Username"),
            ("Username", Keyword::Supported(Operator::Equals))
        );
        assert_eq!(split_keyword("UsernameIn"), ("Username", Keyword::Supported(Operator::In)));
        assert_eq!(
            split_keyword("LocationNear"),
            ("Location", Keyword::Unsupported("Near"))
        );
    }

    #[test]
    fn test_keyword_needs_property() {
        // A bare keyword is treated as a property name.
        assert_eq!(split_keyword("In"), ("In", Keyword::Supported(Operator::Equals)));
    }

    #[test]
    fn test_arity() {
        assert_eq!(Operator::Between.arity().slots(), 2);
        assert_eq!(Operator::In.arity(), Arity::Collection);
        assert_eq!(Operator::IsNull.arity().slots(), 0);
        assert_eq!(Operator::Equals.complement(), Some(Operator::NotEquals));
        assert_eq!(Operator::GreaterThan.complement(), None);
    }
}
