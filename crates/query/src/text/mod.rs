//! Explicit query text.
//!
//! A small object query language over entity aliases:
//!
//! ```text
//! select [distinct] <alias | path, ... | count(..) | new Name(path, ...)>
//!   from Entity alias [[left [outer] | inner] join [fetch] alias.relation [alias]]*
//!   [where <condition>] [order by path [asc|desc], ...]
//! update Entity alias set path = <expr>, ... [where <condition>]
//! delete from Entity alias [where <condition>]
//! ```

mod lexer;
mod parser;

pub use parser::parse_query;
