//! Plan validation and join derivation.
//!
//! `PreparedPlan::prepare` resolves every path a plan mentions against the
//! metamodel, checks operators against attribute types, and derives the
//! joins the select and count statements need:
//!
//! - a relation crossed by the filter becomes an inner join, unless the
//!   query text declares it as a left join;
//! - a relation crossed only by the sort or the projection becomes a left
//!   join;
//! - a fetch-graph hint marks the join as fetched, adding a left join when
//!   nothing else needs it;
//! - an explicit left join nothing reads is eliminated, and fetch-only
//!   joins are eliminated when the result is not an entity;
//! - the count statement keeps inner joins and joins the filter reads.

use super::plan::{Action, QueryPlan};
use crate::ast::{Arity, Condition, Expr, Operator, ParamRef, Predicate, PredicateKind, Term};
use crate::projection::Projection;
use crate::sort::{Direction, Sort};
use crate::statement::{Join, JoinKind};
use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use quarry_core::schema::{AttributeKind, AttributeRef, EntityModel, Metamodel};
use quarry_core::{DataType, Error, Result, Value};

/// A filter tree with resolved paths and coerced literals.
#[derive(Clone, Debug)]
pub(super) enum Shape {
    All,
    Leaf(Leaf),
    And(Vec<Shape>),
    Or(Vec<Shape>),
    Not(Box<Shape>),
}

#[derive(Clone, Debug)]
pub(super) struct Leaf {
    pub attr: AttributeRef,
    pub operator: Operator,
    pub operands: Vec<Term>,
    pub ignore_case: bool,
}

/// A resolved sort key.
#[derive(Clone, Debug)]
pub(super) struct SortKey {
    pub attr: AttributeRef,
    pub direction: Direction,
    pub ignore_case: bool,
}

/// A resolved update expression.
#[derive(Clone, Debug)]
pub(super) enum ValueExpr {
    Literal(Value),
    Param(ParamRef),
    Column(usize),
    Binary {
        op: crate::ast::ArithOp,
        left: Box<ValueExpr>,
        right: Box<ValueExpr>,
    },
}

#[derive(Clone, Debug)]
pub(super) struct ResolvedAssignment {
    pub position: usize,
    pub data_type: DataType,
    pub expr: ValueExpr,
}

/// Which parameter style a plan uses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ParamSignature {
    #[default]
    None,
    /// Positional slots `1..=n`.
    Positional(usize),
    /// Named slots, in first-use order.
    Named(Vec<String>),
}

impl ParamSignature {
    /// Returns the number of distinct parameters.
    pub fn len(&self) -> usize {
        match self {
            ParamSignature::None => 0,
            ParamSignature::Positional(n) => *n,
            ParamSignature::Named(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A plan validated against the metamodel, ready for binding.
#[derive(Clone, Debug)]
pub struct PreparedPlan {
    pub(super) plan: QueryPlan,
    pub(super) metamodel: Arc<Metamodel>,
    pub(super) filter: Shape,
    pub(super) sort: Vec<SortKey>,
    pub(super) assignments: Vec<ResolvedAssignment>,
    pub(super) joins: Vec<Join>,
    pub(super) count_joins: Vec<Join>,
    pub(super) narrowed: Option<Vec<usize>>,
    pub(super) params: ParamSignature,
}

/// Why a relation is joined.
#[derive(Default, Clone, Copy)]
struct Usage {
    explicit: Option<JoinKind>,
    filter: bool,
    sort: bool,
    projection: bool,
    fetch: bool,
}

impl PreparedPlan {
    /// Validates `plan` and derives its joins.
    pub fn prepare(plan: QueryPlan, metamodel: Arc<Metamodel>) -> Result<Self> {
        let model = metamodel.entity(&plan.entity)?;
        let mut relations: Vec<(String, Usage)> = Vec::new();

        for spec in &plan.joins {
            if model.relation(&spec.relation).is_none() {
                return Err(Error::descriptor(format!(
                    "'{}' is not a relation of {}",
                    spec.relation, plan.entity
                )));
            }
            let usage = usage_of(&mut relations, &spec.relation);
            usage.explicit = Some(match usage.explicit {
                Some(JoinKind::Inner) => JoinKind::Inner,
                _ => spec.kind,
            });
            usage.fetch |= spec.fetch;
        }

        let filter = resolve_filter(&metamodel, &plan.entity, &plan.filter)?;
        for_each_hop(&filter, &mut |relation| usage_of(&mut relations, relation).filter = true);

        let sort = resolve_sort(&metamodel, &plan.entity, &plan.sort)?;
        for key in &sort {
            if let Some(hop) = key.attr.hop() {
                usage_of(&mut relations, hop.relation()).sort = true;
            }
        }

        for path in plan.projection.paths() {
            let attr = metamodel.resolve_path(&plan.entity, &path)?;
            if let Some(hop) = attr.hop() {
                usage_of(&mut relations, hop.relation()).projection = true;
            }
        }

        for relation in &plan.fetch {
            if model.relation(relation).is_none() {
                return Err(Error::descriptor(format!(
                    "Fetch hint '{}' is not a relation of {}",
                    relation, plan.entity
                )));
            }
            usage_of(&mut relations, relation).fetch = true;
        }

        let assignments = match &plan.action {
            Action::BulkUpdate(assignments) => {
                let mut out = Vec::with_capacity(assignments.len());
                for assignment in assignments {
                    out.push(resolve_assignment(model, &assignment.path, &assignment.value)?);
                }
                out
            }
            _ => Vec::new(),
        };

        let entity_result = plan.projection.is_entity()
            && matches!(plan.action, Action::Select | Action::Delete);
        let (joins, count_joins) = derive_joins(model, &relations, entity_result)?;

        let narrowed = match plan.action {
            Action::Select => plan.projection.narrowed_columns(model),
            _ => None,
        };
        let params = signature(&plan)?;

        log::debug!(
            "event=plan_prepared module=planner entity={} joins={} count_joins={} params={}",
            plan.entity,
            joins.len(),
            count_joins.len(),
            params.len()
        );

        Ok(Self {
            plan,
            metamodel,
            filter,
            sort,
            assignments,
            joins,
            count_joins,
            narrowed,
            params,
        })
    }

    /// Returns the plan this was prepared from.
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn entity(&self) -> &str {
        &self.plan.entity
    }

    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    /// Joins of the select statement.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Joins of the derived count statement.
    pub fn count_joins(&self) -> &[Join] {
        &self.count_joins
    }

    /// Root columns returned when the projection allows narrowing.
    pub fn narrowed_columns(&self) -> Option<&[usize]> {
        self.narrowed.as_deref()
    }

    pub fn params(&self) -> &ParamSignature {
        &self.params
    }

    /// Resolves a caller-supplied sort, e.g. from a page request.
    pub(super) fn resolve_dynamic_sort(&self, sort: &Sort) -> Result<Vec<SortKey>> {
        resolve_sort(&self.metamodel, &self.plan.entity, sort)
    }
}

fn usage_of<'a>(relations: &'a mut Vec<(String, Usage)>, relation: &str) -> &'a mut Usage {
    let index = match relations.iter().position(|(r, _)| r == relation) {
        Some(i) => i,
        None => {
            relations.push((relation.to_string(), Usage::default()));
            relations.len() - 1
        }
    };
    &mut relations[index].1
}

fn derive_joins(
    model: &EntityModel,
    relations: &[(String, Usage)],
    entity_result: bool,
) -> Result<(Vec<Join>, Vec<Join>)> {
    let mut joins = Vec::new();
    let mut count_joins = Vec::new();
    for (name, usage) in relations {
        let relation = model.relation(name).ok_or_else(|| {
            Error::descriptor(format!("'{}' is not a relation of {}", name, model.name()))
        })?;
        let fetch = usage.fetch && entity_result;
        let read = usage.filter || usage.sort || usage.projection;
        let kind = match usage.explicit {
            Some(JoinKind::Inner) => JoinKind::Inner,
            Some(JoinKind::Left) => JoinKind::Left,
            None if usage.filter => JoinKind::Inner,
            None => JoinKind::Left,
        };
        if kind == JoinKind::Left && !read && !fetch {
            log::debug!(
                "event=join_eliminated module=planner entity={} relation={}",
                model.name(),
                name
            );
            continue;
        }
        let join = Join {
            relation: name.clone(),
            target: relation.target().to_string(),
            fk_position: relation.fk_position(),
            kind,
            fetch,
        };
        if kind == JoinKind::Inner || usage.filter {
            count_joins.push(Join {
                fetch: false,
                ..join.clone()
            });
        }
        joins.push(join);
    }
    Ok((joins, count_joins))
}

fn resolve_filter(metamodel: &Metamodel, root: &str, predicate: &Predicate) -> Result<Shape> {
    Ok(match predicate.kind() {
        PredicateKind::NoOp => Shape::All,
        PredicateKind::Leaf(condition) => Shape::Leaf(resolve_leaf(metamodel, root, condition)?),
        PredicateKind::And(children) => Shape::And(
            children
                .iter()
                .map(|p| resolve_filter(metamodel, root, p))
                .collect::<Result<_>>()?,
        ),
        PredicateKind::Or(children) => Shape::Or(
            children
                .iter()
                .map(|p| resolve_filter(metamodel, root, p))
                .collect::<Result<_>>()?,
        ),
        PredicateKind::Not(inner) => Shape::Not(Box::new(resolve_filter(metamodel, root, inner)?)),
    })
}

fn resolve_leaf(metamodel: &Metamodel, root: &str, condition: &Condition) -> Result<Leaf> {
    let attr = metamodel.resolve_path(root, &condition.path)?;
    let data_type = attr.data_type();
    let operator = condition.operator;

    let type_ok = match operator {
        op if op.is_textual() => data_type == DataType::String,
        Operator::True | Operator::False => data_type == DataType::Boolean,
        Operator::Before | Operator::After => {
            data_type == DataType::DateTime || data_type.is_numeric()
        }
        _ => true,
    };
    if !type_ok {
        return Err(Error::descriptor(format!(
            "Operator {} does not apply to {} ({:?})",
            operator, condition.path, data_type
        )));
    }

    let params = condition
        .operands
        .iter()
        .filter(|t| matches!(t, Term::Param(_)))
        .count();
    let count = condition.operands.len();
    let arity_ok = match operator.arity() {
        Arity::Nullary => count == 0,
        Arity::Unary => count == 1,
        Arity::Binary => count == 2,
        Arity::Collection => params == 0 || count == 1,
    };
    if !arity_ok {
        return Err(Error::descriptor(format!(
            "Operator {} on {} takes {} operand(s), got {}",
            operator,
            condition.path,
            operator.arity().slots(),
            count
        )));
    }

    let operand_type = if operator.is_textual() {
        DataType::String
    } else {
        data_type
    };
    let operands = condition
        .operands
        .iter()
        .map(|term| match term {
            Term::Value(v) => v.coerce_to(operand_type).map(Term::Value).ok_or_else(|| {
                Error::descriptor(format!(
                    "Literal {} does not fit {} ({:?})",
                    v, condition.path, operand_type
                ))
            }),
            Term::Param(p) => Ok(Term::Param(p.clone())),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Leaf {
        attr,
        operator,
        operands,
        ignore_case: condition.ignore_case && data_type == DataType::String,
    })
}

fn for_each_hop(shape: &Shape, f: &mut dyn FnMut(&str)) {
    match shape {
        Shape::All => {}
        Shape::Leaf(leaf) => {
            if let Some(hop) = leaf.attr.hop() {
                f(hop.relation())
            }
        }
        Shape::And(children) | Shape::Or(children) => {
            children.iter().for_each(|s| for_each_hop(s, f))
        }
        Shape::Not(inner) => for_each_hop(inner, f),
    }
}

fn resolve_sort(metamodel: &Metamodel, root: &str, sort: &Sort) -> Result<Vec<SortKey>> {
    sort.orders()
        .iter()
        .map(|order| {
            let attr = metamodel.resolve_path(root, &order.property)?;
            let ignore_case = order.ignore_case && attr.data_type() == DataType::String;
            Ok(SortKey {
                attr,
                direction: order.direction,
                ignore_case,
            })
        })
        .collect()
}

fn resolve_assignment(model: &EntityModel, path: &str, value: &Expr) -> Result<ResolvedAssignment> {
    let attr = root_attribute(model, path)?;
    if !matches!(attr.kind(), AttributeKind::Basic | AttributeKind::ForeignKey { .. }) {
        return Err(Error::descriptor(format!(
            "{}.{} cannot be assigned by a bulk update",
            model.name(),
            path
        )));
    }
    let expr = resolve_expr(model, attr.data_type(), value)?;
    Ok(ResolvedAssignment {
        position: attr.position(),
        data_type: attr.data_type(),
        expr,
    })
}

fn root_attribute<'a>(model: &'a EntityModel, path: &str) -> Result<&'a quarry_core::schema::Attribute> {
    if path.contains('.') {
        return Err(Error::descriptor(format!(
            "Update expressions may only use attributes of {}, got '{}'",
            model.name(),
            path
        )));
    }
    model.attribute(path).ok_or_else(|| {
        Error::descriptor(format!(
            "No property '{}' found for type '{}'",
            path,
            model.name()
        ))
    })
}

fn resolve_expr(model: &EntityModel, target: DataType, expr: &Expr) -> Result<ValueExpr> {
    Ok(match expr {
        Expr::Literal(v) => ValueExpr::Literal(v.coerce_to(target).ok_or_else(|| {
            Error::descriptor(format!("Literal {} does not fit {:?}", v, target))
        })?),
        Expr::Param(p) => ValueExpr::Param(p.clone()),
        Expr::Path(path) => ValueExpr::Column(root_attribute(model, path)?.position()),
        Expr::Binary { op, left, right } => {
            if !target.is_numeric() {
                return Err(Error::descriptor(format!(
                    "Arithmetic on non-numeric type {:?}",
                    target
                )));
            }
            ValueExpr::Binary {
                op: *op,
                left: Box::new(resolve_expr(model, target, left)?),
                right: Box::new(resolve_expr(model, target, right)?),
            }
        }
    })
}

fn signature(plan: &QueryPlan) -> Result<ParamSignature> {
    let mut refs: Vec<&ParamRef> = plan.filter.params();
    if let Action::BulkUpdate(assignments) = &plan.action {
        for assignment in assignments {
            refs.extend(assignment.value.params());
        }
    }

    let mut positional = 0usize;
    let mut named: Vec<String> = Vec::new();
    for r in &refs {
        match r {
            ParamRef::Positional(0) => {
                return Err(Error::descriptor("Positional parameters start at ?1"))
            }
            ParamRef::Positional(i) => positional = positional.max(*i),
            ParamRef::Named(name) => {
                if !named.contains(name) {
                    named.push(name.clone());
                }
            }
        }
    }
    match (positional, named.is_empty()) {
        (0, true) => Ok(ParamSignature::None),
        (n, true) => Ok(ParamSignature::Positional(n)),
        (0, false) => Ok(ParamSignature::Named(named)),
        _ => Err(Error::descriptor(
            "A query cannot mix named and positional parameters",
        )),
    }
}
