//! Value expressions used on the right-hand side of update assignments.

use super::predicate::ParamRef;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use quarry_core::Value;

/// Arithmetic operators allowed in `set` clauses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
}

/// Expression AST node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Value),
    /// Runtime argument.
    Param(ParamRef),
    /// Attribute of the row being updated.
    Path(String),
    /// Binary arithmetic.
    Binary {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: ArithOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Collects the attribute paths this expression reads.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Path(p) => out.push(p.as_str()),
            Expr::Binary { left, right, .. } => {
                left.collect_paths(out);
                right.collect_paths(out);
            }
            Expr::Literal(_) | Expr::Param(_) => {}
        }
    }

    /// Collects the parameters this expression reads.
    pub fn params(&self) -> Vec<&ParamRef> {
        match self {
            Expr::Param(p) => alloc::vec![p],
            Expr::Binary { left, right, .. } => {
                let mut out = left.params();
                out.extend(right.params());
                out
            }
            _ => Vec::new(),
        }
    }
}

/// One `set path = expr` clause of a bulk update.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub path: String,
    pub value: Expr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_paths_and_params() {
        let e = Expr::binary(
            ArithOp::Add,
            Expr::Path("age".into()),
            Expr::Param(ParamRef::Named("delta".into())),
        );
        assert_eq!(e.paths(), alloc::vec!["age"]);
        assert_eq!(e.params(), alloc::vec![&ParamRef::Named("delta".into())]);
        assert!(Expr::Literal(Value::Int32(1)).paths().is_empty());
    }
}
