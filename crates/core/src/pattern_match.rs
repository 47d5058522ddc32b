//! LIKE pattern matching shared by filter evaluation and query-by-example.
//!
//! Two wildcards are recognized:
//! - `%` matches zero or more characters
//! - `_` matches exactly one character
//!
//! A backslash escapes the following character, so `\%` matches a literal
//! percent sign. Matching operates on Unicode scalar values.

use alloc::string::String;
use alloc::vec::Vec;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Token {
    Any,
    One,
    Char(char),
}

fn tokenize(pattern: &str, fold: bool) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        let token = match ch {
            '%' => Token::Any,
            '_' => Token::One,
            '\\' => match chars.next() {
                Some(escaped) => Token::Char(fold_char(escaped, fold)),
                None => Token::Char('\\'),
            },
            other => Token::Char(fold_char(other, fold)),
        };
        // Adjacent `%` collapse into one.
        if token == Token::Any && tokens.last() == Some(&Token::Any) {
            continue;
        }
        tokens.push(token);
    }
    tokens
}

#[inline]
fn fold_char(ch: char, fold: bool) -> char {
    if fold {
        // Single-char lowercase mapping is enough for comparison.
        ch.to_lowercase().next().unwrap_or(ch)
    } else {
        ch
    }
}

/// SQL LIKE pattern matching, case-sensitive.
///
/// ```
/// use quarry_core::pattern_match::like;
/// assert!(like("member1", "mem%"));
/// assert!(like("member1", "member_"));
/// assert!(!like("member1", "team%"));
/// ```
pub fn like(value: &str, pattern: &str) -> bool {
    matches(value, pattern, false)
}

/// SQL LIKE pattern matching that ignores letter case.
pub fn like_ignore_case(value: &str, pattern: &str) -> bool {
    matches(value, pattern, true)
}

fn matches(value: &str, pattern: &str, fold: bool) -> bool {
    let tokens = tokenize(pattern, fold);
    let chars: Vec<char> = value.chars().map(|c| fold_char(c, fold)).collect();

    // Greedy matching with a single backtrack point at the last `%`.
    let (mut vi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while vi < chars.len() {
        match tokens.get(ti) {
            Some(Token::Any) => {
                star = Some((ti, vi));
                ti += 1;
            }
            Some(Token::One) => {
                vi += 1;
                ti += 1;
            }
            Some(Token::Char(c)) if *c == chars[vi] => {
                vi += 1;
                ti += 1;
            }
            _ => match star {
                Some((star_ti, star_vi)) => {
                    ti = star_ti + 1;
                    vi = star_vi + 1;
                    star = Some((star_ti, star_vi + 1));
                }
                None => return false,
            },
        }
    }
    tokens[ti..].iter().all(|t| *t == Token::Any)
}

/// Escapes the LIKE wildcards in `literal` so it matches only itself.
///
/// ```
/// use quarry_core::pattern_match::{escape, like};
/// let pattern = format!("{}%", escape("50%"));
/// assert!(like("50% off", &pattern));
/// assert!(!like("500 off", &pattern));
/// ```
pub fn escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for ch in literal.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_like_exact() {
        assert!(like("hello", "hello"));
        assert!(!like("hello", "hell"));
    }

    #[test]
    fn test_like_percent() {
        assert!(like("hello", "h%"));
        assert!(like("hello", "%o"));
        assert!(like("hello", "%ll%"));
        assert!(like("hello", "%"));
        assert!(like("", "%"));
        assert!(!like("hello", "x%"));
    }

    #[test]
    fn test_like_underscore() {
        assert!(like("hello", "_ello"));
        assert!(like("hello", "h_l_o"));
        assert!(!like("hello", "______"));
    }

    #[test]
    fn test_like_backtracking() {
        assert!(like("aXbXc", "%X%c"));
        assert!(like("member10", "%1_"));
        assert!(!like("abc", "%b%d"));
    }

    #[test]
    fn test_like_ignore_case() {
        assert!(like_ignore_case("Member1", "mem%"));
        assert!(!like("Member1", "mem%"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a_b"), "a\\_b");
        assert!(like("a_b", &escape("a_b")));
        assert!(!like("axb", &escape("a_b")));
        assert!(like("100%", &format!("%{}", escape("0%"))));
    }
}
