//! Predicate parts of a method descriptor.

use crate::ast::{split_keyword, Keyword, Operator};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use quarry_core::{Error, Result};

/// Whether a part compares strings ignoring case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreCase {
    Never,
    /// Requested on the part itself; non-string properties are an error.
    Always,
    /// Requested by `AllIgnoreCase`; applies to string properties only.
    WhenPossible,
}

/// One `<Property><Comparator>[IgnoreCase]` chunk of a descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Part {
    /// Capitalized property expression, e.g. `TeamName`.
    pub property: String,
    pub operator: Operator,
    pub ignore_case: IgnoreCase,
}

impl Part {
    /// Parses one part. `all_ignore_case` applies when the part has no modifier.
    pub fn parse(source: &str, all_ignore_case: bool) -> Result<Self> {
        let (body, ignore_case) = match strip_any_suffix(source, &["IgnoringCase", "IgnoreCase"]) {
            Some(body) => (body, IgnoreCase::Always),
            None if all_ignore_case => (source, IgnoreCase::WhenPossible),
            None => (source, IgnoreCase::Never),
        };
        let (property, keyword) = split_keyword(body);
        let operator = match keyword {
            Keyword::Supported(op) => op,
            Keyword::Unsupported(name) => return Err(Error::unsupported_operator(name)),
        };
        if property.is_empty() {
            return Err(Error::descriptor(format!("Part '{}' names no property", source)));
        }
        Ok(Self {
            property: property.to_string(),
            operator,
            ignore_case,
        })
    }
}

/// Removes the first matching suffix, if the remainder is non-empty.
pub(crate) fn strip_any_suffix<'a>(s: &'a str, suffixes: &[&str]) -> Option<&'a str> {
    suffixes
        .iter()
        .find(|suffix| s.len() > suffix.len() && s.ends_with(*suffix))
        .map(|suffix| &s[..s.len() - suffix.len()])
}

/// Splits `s` at every `keyword` that is followed by an uppercase letter and
/// is not at the start, e.g. `UsernameAndAge` on `And`.
pub(crate) fn split_on_keyword<'a>(s: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    let mut i = 1;
    while i + keyword.len() < s.len() {
        let after = bytes[i + keyword.len()];
        if bytes[i..].starts_with(keyword.as_bytes()) && after.is_ascii_uppercase() {
            parts.push(&s[start..i]);
            start = i + keyword.len();
            i = start + 1;
        } else {
            i += 1;
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Splits an order clause like `UsernameDescAge` into `(property, direction)`
/// pairs; a missing direction is ascending.
pub(crate) fn split_order_clause(s: &str) -> Result<Vec<(String, bool)>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 1;
    while i < s.len() {
        if !s.is_char_boundary(i) {
            i += 1;
            continue;
        }
        let rest = &s[i..];
        let matched = ["Desc", "Asc"].iter().find(|dir| {
            rest.starts_with(*dir)
                && rest[dir.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| c.is_ascii_uppercase())
        });
        match matched {
            Some(dir) => {
                out.push((s[start..i].to_string(), *dir == "Desc"));
                start = i + dir.len();
                i = start + 1;
            }
            None => i += 1,
        }
    }
    if start < s.len() {
        out.push((s[start..].to_string(), false));
    }
    if out.is_empty() || out.iter().any(|(p, _)| p.is_empty()) {
        return Err(Error::descriptor(format!("Invalid order clause '{}'", s)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_part_parse() {
        let part = Part::parse("AgeGreaterThan", false).unwrap();
        assert_eq!(part.property, "Age");
        assert_eq!(part.operator, Operator::GreaterThan);
        assert_eq!(part.ignore_case, IgnoreCase::Never);

        let part = Part::parse("UsernameContainingIgnoreCase", false).unwrap();
        assert_eq!(part.property, "Username");
        assert_eq!(part.operator, Operator::Containing);
        assert_eq!(part.ignore_case, IgnoreCase::Always);

        let part = Part::parse("Username", true).unwrap();
        assert_eq!(part.ignore_case, IgnoreCase::WhenPossible);
    }

    #[test]
    fn test_part_unsupported() {
        assert!(matches!(
            Part::parse("UsernameRegex", false),
            Err(Error::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            Part::parse("TeamIsNotEmpty", false),
            Err(Error::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn test_split_on_keyword() {
        assert_eq!(split_on_keyword("UsernameAndAge", "And"), vec!["Username", "Age"]);
        assert_eq!(split_on_keyword("Android", "And"), vec!["Android"]);
        assert_eq!(split_on_keyword("OrderNumber", "Or"), vec!["OrderNumber"]);
        assert_eq!(
            split_on_keyword("ColorOrSizeOrAge", "Or"),
            vec!["Color", "Size", "Age"]
        );
        assert_eq!(split_on_keyword("AgeAnd", "And"), vec!["AgeAnd"]);
    }

    #[test]
    fn test_split_order_clause() {
        assert_eq!(
            split_order_clause("UsernameDescAgeAsc").unwrap(),
            vec![("Username".to_string(), true), ("Age".to_string(), false)]
        );
        assert_eq!(
            split_order_clause("DescriptionAsc").unwrap(),
            vec![("Description".to_string(), false)]
        );
        assert_eq!(
            split_order_clause("Age").unwrap(),
            vec![("Age".to_string(), false)]
        );
        assert!(split_order_clause("").is_err());
    }
}
