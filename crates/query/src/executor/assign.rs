//! Bound update assignments.

use crate::ast::ArithOp;
use alloc::boxed::Box;
use alloc::format;
use quarry_core::{DataType, Error, Result, Row, Value};

/// A bound right-hand side of an assignment.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundExpr {
    Literal(Value),
    /// Current value of a root attribute.
    Column(usize),
    Binary {
        op: ArithOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
}

impl BoundExpr {
    /// Evaluates against the current row.
    pub fn eval(&self, row: &Row) -> Result<Value> {
        match self {
            BoundExpr::Literal(v) => Ok(v.clone()),
            BoundExpr::Column(pos) => Ok(row.get(*pos).cloned().unwrap_or(Value::Null)),
            BoundExpr::Binary { op, left, right } => {
                let l = left.eval(row)?;
                let r = right.eval(row)?;
                let result = match op {
                    ArithOp::Add => l.checked_add(&r),
                    ArithOp::Sub => l.checked_sub(&r),
                };
                result.ok_or_else(|| {
                    Error::invalid_operation(format!("cannot evaluate {} {:?} {}", l, op, r))
                })
            }
        }
    }
}

/// `row[position] = expr`, coerced to the attribute type.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundAssignment {
    pub position: usize,
    pub data_type: DataType,
    pub expr: BoundExpr,
}

impl BoundAssignment {
    /// Computes the new value for `row`.
    pub fn eval(&self, row: &Row) -> Result<Value> {
        let value = self.expr.eval(row)?;
        match value.coerce_to(self.data_type) {
            Some(v) => Ok(v),
            None => Err(match value.data_type() {
                Some(got) => Error::type_mismatch(self.data_type, got),
                None => Error::invalid_operation("null in arithmetic"),
            }),
        }
    }
}

/// Applies every assignment to `row`, reading the pre-update values.
pub fn apply_assignments(row: &Row, assignments: &[BoundAssignment]) -> Result<Row> {
    let mut updated = row.clone();
    for assignment in assignments {
        let value = assignment.eval(row)?;
        updated.set(assignment.position, value);
    }
    Ok(updated)
}
