//! Argument binding: prepared plan plus runtime arguments to statements.

use super::plan::Action;
use super::prepare::{Leaf, PreparedPlan, ResolvedAssignment, Shape, SortKey, ValueExpr};
use super::ParamSignature;
use crate::ast::{Arity, Operator, ParamRef, Term};
use crate::executor::{BoundAssignment, BoundExpr, Filter, ProjectionMapper};
use crate::sort::Sort;
use crate::statement::{ColumnRef, Count, Join, JoinKind, OrderKey, Select, Statement};
use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;
use quarry_core::schema::AttributeRef;
use quarry_core::{DataType, Error, Result, Value};

/// One runtime argument.
#[derive(Clone, Debug, PartialEq)]
pub enum Argument {
    Single(Value),
    /// A collection, only accepted by `In` and `NotIn`.
    Many(Vec<Value>),
}

/// Runtime arguments for one call, positional or named.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    positional: Vec<Argument>,
    named: HashMap<String, Argument>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional arguments from plain values.
    pub fn of<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        let mut args = Self::new();
        for v in values {
            args.positional.push(Argument::Single(v.into()));
        }
        args
    }

    pub fn push(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(Argument::Single(value.into()));
        self
    }

    pub fn push_many<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.positional
            .push(Argument::Many(values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.named
            .insert(name.to_string(), Argument::Single(value.into()));
        self
    }

    pub fn with_many<V: Into<Value>>(
        mut self,
        name: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.named.insert(
            name.to_string(),
            Argument::Many(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    /// Looks up the argument for a parameter slot.
    pub fn get(&self, param: &ParamRef) -> Option<&Argument> {
        match param {
            ParamRef::Positional(i) => self.positional.get(i.checked_sub(1)?),
            ParamRef::Named(name) => self.named.get(name),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    pub fn positional_len(&self) -> usize {
        self.positional.len()
    }
}

impl PreparedPlan {
    /// Checks that `args` supplies exactly the parameters the plan declares.
    pub fn check_arguments(&self, args: &Arguments) -> Result<()> {
        match &self.params {
            ParamSignature::None if args.is_empty() => Ok(()),
            ParamSignature::None => Err(Error::invalid_operation(format!(
                "query on {} takes no arguments",
                self.plan.entity
            ))),
            ParamSignature::Positional(n) => {
                if args.positional.len() != *n || !args.named.is_empty() {
                    return Err(Error::invalid_operation(format!(
                        "expected {} positional argument(s), got {}",
                        n,
                        args.positional.len()
                    )));
                }
                Ok(())
            }
            ParamSignature::Named(names) => {
                if let Some(missing) = names.iter().find(|n| !args.named.contains_key(*n)) {
                    return Err(Error::invalid_operation(format!(
                        "missing argument :{}",
                        missing
                    )));
                }
                if args.named.len() != names.len() || !args.positional.is_empty() {
                    return Err(Error::invalid_operation("unexpected arguments"));
                }
                Ok(())
            }
        }
    }

    /// Binds a select.
    ///
    /// `offset` and `limit` describe the requested window; the plan's own
    /// row cap still applies. `dynamic` sort keys follow the plan's keys and
    /// may add left joins.
    pub fn bind_select(
        &self,
        args: &Arguments,
        offset: usize,
        limit: Option<usize>,
        dynamic: &Sort,
    ) -> Result<Select> {
        self.check_arguments(args)?;
        let mut joins = self.joins.clone();
        let mut keys: Vec<SortKey> = self.sort.clone();
        keys.extend(self.resolve_dynamic_sort(dynamic)?);
        for key in &keys {
            if let Some(hop) = key.attr.hop() {
                if !joins.iter().any(|j| j.relation == hop.relation()) {
                    joins.push(Join {
                        relation: hop.relation().to_string(),
                        target: hop.target().to_string(),
                        fk_position: hop.fk_position(),
                        kind: JoinKind::Left,
                        fetch: false,
                    });
                }
            }
        }

        let filter = bind_shape(&self.filter, args, &joins)?;
        let order = keys
            .iter()
            .map(|key| {
                Ok(OrderKey {
                    column: column_of(&key.attr, &joins)?,
                    direction: key.direction,
                    ignore_case: key.ignore_case,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let limit = match (self.plan.limit, limit) {
            (Some(cap), Some(window)) => Some(cap.saturating_sub(offset).min(window)),
            (Some(cap), None) => Some(cap.saturating_sub(offset)),
            (None, window) => window,
        };

        let (columns, distinct) = match self.plan.action {
            Action::Exists => (Some(vec![self.id_position()?]), false),
            _ => (self.narrowed.clone(), self.plan.distinct),
        };
        let limit = match self.plan.action {
            Action::Exists => Some(1),
            _ => limit,
        };

        Ok(Select {
            entity: self.plan.entity.clone(),
            joins,
            filter,
            columns,
            distinct,
            order,
            offset,
            limit,
            lock: None,
        })
    }

    /// Binds the derived count statement.
    pub fn bind_count(&self, args: &Arguments) -> Result<Count> {
        self.check_arguments(args)?;
        let filter = bind_shape(&self.filter, args, &self.count_joins)?;
        Ok(Count {
            entity: self.plan.entity.clone(),
            joins: self.count_joins.clone(),
            filter,
            distinct: self.plan.distinct,
        })
    }

    /// Binds a bulk update or delete.
    pub fn bind_bulk(&self, args: &Arguments) -> Result<Statement> {
        self.check_arguments(args)?;
        let joins = self.count_joins.clone();
        let filter = bind_shape(&self.filter, args, &joins)?;
        let entity = self.plan.entity.clone();
        match &self.plan.action {
            Action::BulkUpdate(_) => {
                let assignments = self
                    .assignments
                    .iter()
                    .map(|a| bind_assignment(a, args))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Statement::BulkUpdate {
                    entity,
                    joins,
                    filter,
                    assignments,
                })
            }
            Action::BulkDelete => Ok(Statement::BulkDelete {
                entity,
                joins,
                filter,
            }),
            other => Err(Error::invalid_operation(format!(
                "{:?} is not a bulk action",
                other
            ))),
        }
    }

    /// Compiles the projection mapper for a select bound from this plan.
    ///
    /// Returns `None` for entity results.
    pub fn mapper(&self, select: &Select) -> Result<Option<ProjectionMapper>> {
        if self.plan.projection.is_entity() {
            return Ok(None);
        }
        ProjectionMapper::compile(
            &self.plan.projection,
            &self.metamodel,
            &self.plan.entity,
            &select.joins,
            select.columns.as_deref(),
        )
        .map(Some)
    }

    fn id_position(&self) -> Result<usize> {
        Ok(self.metamodel.entity(&self.plan.entity)?.id_position())
    }
}

fn column_of(attr: &AttributeRef, joins: &[Join]) -> Result<ColumnRef> {
    match attr.hop() {
        None => Ok(ColumnRef::root(attr.position())),
        Some(hop) => joins
            .iter()
            .position(|j| j.relation == hop.relation())
            .map(|i| ColumnRef::joined(i, attr.position()))
            .ok_or_else(|| {
                Error::invalid_operation(format!("relation '{}' is not joined", hop.relation()))
            }),
    }
}

fn bind_shape(shape: &Shape, args: &Arguments, joins: &[Join]) -> Result<Filter> {
    Ok(match shape {
        Shape::All => Filter::All,
        Shape::Leaf(leaf) => bind_leaf(leaf, args, joins)?,
        Shape::And(children) => Filter::And(
            children
                .iter()
                .map(|s| bind_shape(s, args, joins))
                .collect::<Result<_>>()?,
        ),
        Shape::Or(children) => Filter::Or(
            children
                .iter()
                .map(|s| bind_shape(s, args, joins))
                .collect::<Result<_>>()?,
        ),
        Shape::Not(inner) => Filter::Not(Box::new(bind_shape(inner, args, joins)?)),
    })
}

fn bind_leaf(leaf: &Leaf, args: &Arguments, joins: &[Join]) -> Result<Filter> {
    let data_type = if leaf.operator.is_textual() {
        DataType::String
    } else {
        leaf.attr.data_type()
    };
    let collection = leaf.operator.arity() == Arity::Collection;

    let mut operands = Vec::with_capacity(leaf.operands.len());
    for term in &leaf.operands {
        match term {
            Term::Value(v) => operands.push(v.clone()),
            Term::Param(p) => match args.get(p) {
                None => {
                    return Err(Error::invalid_operation(format!("missing argument {}", p)))
                }
                Some(Argument::Single(v)) => operands.push(coerce(v, data_type)?),
                Some(Argument::Many(values)) if collection => {
                    for v in values {
                        operands.push(coerce(v, data_type)?);
                    }
                }
                Some(Argument::Many(_)) => {
                    return Err(Error::invalid_operation(format!(
                        "argument {} is a collection but {} takes a single value",
                        p, leaf.operator
                    )))
                }
            },
        }
    }

    let operator = match (leaf.operator, operands.first()) {
        (Operator::Equals, Some(Value::Null)) => Operator::IsNull,
        (Operator::NotEquals, Some(Value::Null)) => Operator::IsNotNull,
        (op, _) => op,
    };
    if matches!(operator, Operator::IsNull | Operator::IsNotNull) {
        operands.clear();
    }

    Ok(Filter::Compare {
        column: column_of(&leaf.attr, joins)?,
        operator,
        operands,
        ignore_case: leaf.ignore_case,
    })
}

fn coerce(value: &Value, data_type: DataType) -> Result<Value> {
    value.coerce_to(data_type).ok_or_else(|| match value.data_type() {
        Some(got) => Error::type_mismatch(data_type, got),
        None => Error::invalid_operation("null argument"),
    })
}

fn bind_assignment(assignment: &ResolvedAssignment, args: &Arguments) -> Result<BoundAssignment> {
    Ok(BoundAssignment {
        position: assignment.position,
        data_type: assignment.data_type,
        expr: bind_expr(&assignment.expr, assignment.data_type, args)?,
    })
}

fn bind_expr(expr: &ValueExpr, data_type: DataType, args: &Arguments) -> Result<BoundExpr> {
    Ok(match expr {
        ValueExpr::Literal(v) => BoundExpr::Literal(v.clone()),
        ValueExpr::Column(position) => BoundExpr::Column(*position),
        ValueExpr::Param(p) => match args.get(p) {
            Some(Argument::Single(v)) => BoundExpr::Literal(coerce(v, data_type)?),
            Some(Argument::Many(_)) => {
                return Err(Error::invalid_operation(format!(
                    "argument {} must be a single value",
                    p
                )))
            }
            None => return Err(Error::invalid_operation(format!("missing argument {}", p))),
        },
        ValueExpr::Binary { op, left, right } => BoundExpr::Binary {
            op: *op,
            left: Box::new(bind_expr(left, data_type, args)?),
            right: Box::new(bind_expr(right, data_type, args)?),
        },
    })
}
