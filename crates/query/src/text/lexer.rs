//! Tokenizer for query text.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use quarry_core::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub(super) enum Token {
    /// An identifier or keyword; keywords are matched case-insensitively.
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Named(String),
    Positional(usize),
    Dot,
    Comma,
    LParen,
    RParen,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Eof,
}

impl Token {
    /// Returns true if this is the identifier `keyword`, in any case.
    pub(super) fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }
}

/// A token and its byte offset.
#[derive(Clone, Debug, PartialEq)]
pub(super) struct Spanned {
    pub token: Token,
    pub pos: usize,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if f(c) {
                self.advance();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn error(&self, message: &str) -> Error {
        Error::descriptor(format!("{} at position {}", message, self.pos))
    }

    fn string(&mut self) -> Result<Token> {
        self.advance();
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("Unterminated string literal")),
                Some('\'') if self.peek_second() == Some('\'') => {
                    out.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    return Ok(Token::Str(out));
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }

    fn number(&mut self) -> Result<Token> {
        let int = self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            let frac = self.take_while(|c| c.is_ascii_digit());
            let text = format!("{}.{}", int, frac);
            return text
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error("Invalid number"));
        }
        int.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| self.error("Integer literal out of range"))
    }

    fn next_token(&mut self) -> Result<Spanned> {
        self.take_while(char::is_whitespace);
        let pos = self.pos;
        let c = match self.peek() {
            None => {
                return Ok(Spanned {
                    token: Token::Eof,
                    pos,
                })
            }
            Some(c) => c,
        };
        let token = match c {
            '\'' => self.string()?,
            c if c.is_ascii_digit() => self.number()?,
            c if c.is_alphabetic() || c == '_' => {
                Token::Ident(self.take_while(|c| c.is_alphanumeric() || c == '_').into())
            }
            ':' => {
                self.advance();
                let name = self.take_while(|c| c.is_alphanumeric() || c == '_');
                if name.is_empty() {
                    return Err(self.error("Expected parameter name after ':'"));
                }
                Token::Named(name.into())
            }
            '?' => {
                self.advance();
                let digits = self.take_while(|c| c.is_ascii_digit());
                match digits.parse::<usize>() {
                    Ok(n) if n > 0 => Token::Positional(n),
                    _ => return Err(self.error("Expected parameter index after '?'")),
                }
            }
            '<' => {
                self.advance();
                match self.peek() {
                    Some('=') => {
                        self.advance();
                        Token::Le
                    }
                    Some('>') => {
                        self.advance();
                        Token::Ne
                    }
                    _ => Token::Lt,
                }
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '!' if self.peek_second() == Some('=') => {
                self.advance();
                self.advance();
                Token::Ne
            }
            _ => {
                let token = match c {
                    '.' => Token::Dot,
                    ',' => Token::Comma,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '=' => Token::Eq,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    other => {
                        return Err(self.error(&format!("Unexpected character '{}'", other)))
                    }
                };
                self.advance();
                token
            }
        };
        Ok(Spanned { token, pos })
    }
}

/// Splits query text into tokens, ending with `Token::Eof`.
pub(super) fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer { input, pos: 0 };
    let mut tokens = Vec::new();
    loop {
        let spanned = lexer.next_token()?;
        let done = spanned.token == Token::Eof;
        tokens.push(spanned);
        if done {
            return Ok(tokens);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_tokenize_select() {
        assert_eq!(
            tokens("select m from Member m where m.age >= :age"),
            vec![
                Token::Ident("select".into()),
                Token::Ident("m".into()),
                Token::Ident("from".into()),
                Token::Ident("Member".into()),
                Token::Ident("m".into()),
                Token::Ident("where".into()),
                Token::Ident("m".into()),
                Token::Dot,
                Token::Ident("age".into()),
                Token::Ge,
                Token::Named("age".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_literals() {
        assert_eq!(
            tokens("'it''s' 42 2.5 ?1 <> !="),
            vec![
                Token::Str("it's".into()),
                Token::Int(42),
                Token::Float(2.5),
                Token::Positional(1),
                Token::Ne,
                Token::Ne,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("?0").is_err());
        assert!(tokenize("a ; b").is_err());
        assert!(tokenize(": x").is_err());
    }

    #[test]
    fn test_keyword_case() {
        assert!(Token::Ident("SELECT".into()).is_keyword("select"));
        assert!(!Token::Int(1).is_keyword("select"));
    }
}
