//! AST module for predicates and update expressions.

mod expr;
mod operator;
mod predicate;

pub use expr::{ArithOp, Assignment, Expr};
pub use operator::{split_keyword, Arity, Keyword, Operator, KEYWORDS};
pub use predicate::{Condition, ParamRef, Predicate, PredicateKind, Term};
