//! Projection mapping.
//!
//! A `ProjectionMapper` is compiled once per bound select from a
//! projection shape and the select's joins, then applied to every result
//! row. Property accessors become column reads; nested accessors read the
//! joined row of their relation; computed accessors render their segments
//! as text and concatenate them.

use crate::projection::{Accessor, Projection, Segment, ViewShape};
use crate::statement::{ColumnRef, Join, ResultRow};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use quarry_core::schema::Metamodel;
use quarry_core::{Error, Result, Value};

/// A projected value inside a view.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewValue {
    Value(Value),
    /// A nested view; `None` when the related entity is absent.
    View(Option<View>),
}

/// A materialized view: named fields in accessor order.
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    name: String,
    fields: Vec<(String, ViewValue)>,
}

impl View {
    pub fn new(name: impl Into<String>, fields: Vec<(String, ViewValue)>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Returns the shape or constructor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[(String, ViewValue)] {
        &self.fields
    }

    /// Reads a plain field by accessor name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find_map(|(n, v)| match v {
            ViewValue::Value(value) if n == name => Some(value),
            _ => None,
        })
    }

    /// Reads a nested view by accessor name.
    pub fn nested(&self, name: &str) -> Option<&View> {
        self.fields.iter().find_map(|(n, v)| match v {
            ViewValue::View(Some(view)) if n == name => Some(view),
            _ => None,
        })
    }

    /// Reads a plain field by position, for constructor-style results.
    pub fn field_at(&self, index: usize) -> Option<&Value> {
        match self.fields.get(index) {
            Some((_, ViewValue::Value(v))) => Some(v),
            _ => None,
        }
    }

    /// Like `get`, but a missing field is an error.
    pub fn require(&self, name: &str) -> Result<&Value> {
        self.get(name).ok_or_else(|| {
            Error::invalid_operation(format!("view {} has no field '{}'", self.name, name))
        })
    }
}

/// Conversion from a materialized view into a caller-defined type.
pub trait FromView: Sized {
    fn from_view(view: &View) -> Result<Self>;
}

impl FromView for View {
    fn from_view(view: &View) -> Result<Self> {
        Ok(view.clone())
    }
}

/// One mapped row.
#[derive(Clone, Debug, PartialEq)]
pub enum Projected {
    View(View),
    Scalar(Value),
}

#[derive(Clone, Debug)]
enum Field {
    Column {
        name: String,
        column: ColumnRef,
    },
    Nested {
        name: String,
        join: usize,
        shape: Compiled,
    },
    Computed {
        name: String,
        parts: Vec<Part>,
    },
}

#[derive(Clone, Debug)]
enum Part {
    Column(ColumnRef),
    Text(String),
}

#[derive(Clone, Debug)]
struct Compiled {
    name: String,
    fields: Vec<Field>,
}

#[derive(Clone, Debug)]
enum Mapping {
    View(Compiled),
    Scalar(ColumnRef),
}

/// Where unqualified paths are resolved.
#[derive(Clone, Copy)]
enum Scope<'a> {
    Root,
    Joined { join: usize, entity: &'a str },
}

/// Maps result rows into views or scalars.
#[derive(Clone, Debug)]
pub struct ProjectionMapper {
    mapping: Mapping,
}

struct Context<'a> {
    metamodel: &'a Metamodel,
    root: &'a str,
    joins: &'a [Join],
    narrowed: Option<&'a [usize]>,
}

impl ProjectionMapper {
    /// Compiles a non-entity projection against a bound select layout.
    ///
    /// `narrowed` holds the root positions the select returns when it
    /// narrows its columns.
    pub fn compile(
        projection: &Projection,
        metamodel: &Metamodel,
        root: &str,
        joins: &[Join],
        narrowed: Option<&[usize]>,
    ) -> Result<Self> {
        let cx = Context {
            metamodel,
            root,
            joins,
            narrowed,
        };
        let mapping = match projection {
            Projection::Entity => {
                return Err(Error::invalid_operation(
                    "entity results are not mapped through a projection",
                ))
            }
            Projection::Closed(shape) | Projection::Open(shape) => {
                Mapping::View(cx.shape(shape, Scope::Root)?)
            }
            Projection::Constructor { name, args } => {
                let mut fields = Vec::with_capacity(args.len());
                for path in args {
                    fields.push(Field::Column {
                        name: path.clone(),
                        column: cx.column(path, Scope::Root)?,
                    });
                }
                Mapping::View(Compiled {
                    name: name.clone(),
                    fields,
                })
            }
            Projection::Scalar(path) => Mapping::Scalar(cx.column(path, Scope::Root)?),
        };
        Ok(Self { mapping })
    }

    /// Maps one result row.
    pub fn map(&self, row: &ResultRow) -> Result<Projected> {
        match &self.mapping {
            Mapping::Scalar(column) => Ok(Projected::Scalar(read(row, column))),
            Mapping::View(shape) => Ok(Projected::View(materialize(shape, row))),
        }
    }
}

impl Context<'_> {
    fn shape(&self, shape: &ViewShape, scope: Scope<'_>) -> Result<Compiled> {
        let mut fields = Vec::with_capacity(shape.accessors().len());
        for accessor in shape.accessors() {
            let field = match accessor {
                Accessor::Property { name, path } => Field::Column {
                    name: name.clone(),
                    column: self.column(path, scope)?,
                },
                Accessor::Nested {
                    name,
                    relation,
                    shape,
                } => {
                    if !matches!(scope, Scope::Root) {
                        return Err(Error::descriptor(format!(
                            "Nested accessor '{}' in {} crosses more than one relationship",
                            name,
                            shape.name()
                        )));
                    }
                    let (join, target) = self.join_for(relation)?;
                    Field::Nested {
                        name: name.clone(),
                        join,
                        shape: self.shape(
                            shape,
                            Scope::Joined {
                                join,
                                entity: target,
                            },
                        )?,
                    }
                }
                Accessor::Computed { name, segments } => {
                    let mut parts = Vec::with_capacity(segments.len());
                    for segment in segments {
                        parts.push(match segment {
                            Segment::Path(path) => Part::Column(self.column(path, scope)?),
                            Segment::Text(text) => Part::Text(text.clone()),
                        });
                    }
                    Field::Computed {
                        name: name.clone(),
                        parts,
                    }
                }
            };
            fields.push(field);
        }
        Ok(Compiled {
            name: shape.name().to_string(),
            fields,
        })
    }

    fn column(&self, path: &str, scope: Scope<'_>) -> Result<ColumnRef> {
        match scope {
            Scope::Joined { join, entity } => {
                let model = self.metamodel.entity(entity)?;
                let position = model.position(path).ok_or_else(|| {
                    Error::descriptor(format!(
                        "No property '{}' found for type '{}'",
                        path, entity
                    ))
                })?;
                Ok(ColumnRef::joined(join, position))
            }
            Scope::Root => {
                let attr = self.metamodel.resolve_path(self.root, path)?;
                match attr.hop() {
                    Some(hop) => {
                        let (join, _) = self.join_for(hop.relation())?;
                        Ok(ColumnRef::joined(join, attr.position()))
                    }
                    None => match self.narrowed {
                        None => Ok(ColumnRef::root(attr.position())),
                        Some(columns) => columns
                            .iter()
                            .position(|&p| p == attr.position())
                            .map(ColumnRef::root)
                            .ok_or_else(|| {
                                Error::invalid_operation(format!(
                                    "column '{}' is not part of the narrowed selection",
                                    path
                                ))
                            }),
                    },
                }
            }
        }
    }

    fn join_for(&self, relation: &str) -> Result<(usize, &str)> {
        self.joins
            .iter()
            .position(|j| j.relation == relation)
            .map(|i| (i, self.joins[i].target.as_str()))
            .ok_or_else(|| {
                Error::invalid_operation(format!(
                    "relation '{}' is not joined for this projection",
                    relation
                ))
            })
    }
}

fn read(row: &ResultRow, column: &ColumnRef) -> Value {
    row.value(column).cloned().unwrap_or(Value::Null)
}

fn materialize(shape: &Compiled, row: &ResultRow) -> View {
    let fields = shape
        .fields
        .iter()
        .map(|field| match field {
            Field::Column { name, column } => (name.clone(), ViewValue::Value(read(row, column))),
            Field::Nested { name, join, shape } => {
                let present = matches!(row.joined.get(*join), Some(Some(_)));
                let view = if present {
                    Some(materialize(shape, row))
                } else {
                    None
                };
                (name.clone(), ViewValue::View(view))
            }
            Field::Computed { name, parts } => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        Part::Text(t) => text.push_str(t),
                        Part::Column(column) => text.push_str(&render_text(&read(row, column))),
                    }
                }
                (name.clone(), ViewValue::Value(Value::String(text)))
            }
        })
        .collect();
    View {
        name: shape.name.clone(),
        fields,
    }
}

/// Renders a value for concatenation; strings are not quoted.
pub fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
