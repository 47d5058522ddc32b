//! Projection shapes.
//!
//! A projection describes the view a query returns instead of the full
//! entity. Closed shapes list accessors that map onto attributes; open
//! shapes contain at least one computed accessor; constructor shapes feed
//! attribute values positionally into a named value object.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use quarry_core::schema::EntityModel;
use quarry_core::{Error, Result};

/// One piece of a computed accessor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// An attribute path whose value is rendered as text.
    Path(String),
    /// Literal text.
    Text(String),
}

/// A named accessor in a view shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Accessor {
    /// Reads one attribute path.
    Property { name: String, path: String },
    /// Reads a related entity through its own shape.
    Nested {
        name: String,
        relation: String,
        shape: ViewShape,
    },
    /// Concatenates the rendered segments.
    Computed { name: String, segments: Vec<Segment> },
}

impl Accessor {
    pub fn name(&self) -> &str {
        match self {
            Accessor::Property { name, .. }
            | Accessor::Nested { name, .. }
            | Accessor::Computed { name, .. } => name,
        }
    }
}

/// A named set of accessors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewShape {
    name: String,
    accessors: Vec<Accessor>,
}

impl ViewShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accessors: Vec::new(),
        }
    }

    /// Adds an accessor reading the attribute of the same name.
    pub fn property(self, name: &str) -> Self {
        self.property_at(name, name)
    }

    /// Adds an accessor reading `path` under a different name.
    pub fn property_at(mut self, name: &str, path: &str) -> Self {
        self.accessors.push(Accessor::Property {
            name: name.to_string(),
            path: path.to_string(),
        });
        self
    }

    /// Adds an accessor that views the related entity through `shape`.
    pub fn nested(mut self, name: &str, relation: &str, shape: ViewShape) -> Self {
        self.accessors.push(Accessor::Nested {
            name: name.to_string(),
            relation: relation.to_string(),
            shape,
        });
        self
    }

    pub fn computed(mut self, name: &str, segments: Vec<Segment>) -> Self {
        self.accessors.push(Accessor::Computed {
            name: name.to_string(),
            segments,
        });
        self
    }

    /// Adds a computed accessor from an expression like `username + ' ' + age`.
    pub fn computed_expr(self, name: &str, expression: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for raw in expression.split('+') {
            let part = raw.trim();
            if part.is_empty() {
                return Err(Error::descriptor(format!(
                    "Empty term in computed accessor '{}'",
                    expression
                )));
            }
            if part.len() >= 2 && part.starts_with('\'') && part.ends_with('\'') {
                segments.push(Segment::Text(part[1..part.len() - 1].to_string()));
            } else {
                segments.push(Segment::Path(part.to_string()));
            }
        }
        Ok(self.computed(name, segments))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accessors(&self) -> &[Accessor] {
        &self.accessors
    }

    /// Returns true if any accessor is computed.
    pub fn is_open(&self) -> bool {
        self.accessors
            .iter()
            .any(|a| matches!(a, Accessor::Computed { .. }))
    }
}

/// The result shape of a query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Projection {
    /// Full entities, merged into the working set.
    #[default]
    Entity,
    /// Accessors that each read an attribute or a nested view.
    Closed(ViewShape),
    /// A shape with at least one computed accessor.
    Open(ViewShape),
    /// A named value object built from attribute paths in order.
    Constructor { name: String, args: Vec<String> },
    /// A single attribute value per row.
    Scalar(String),
}

impl Projection {
    /// Wraps a shape, classifying it as open or closed.
    pub fn view(shape: ViewShape) -> Self {
        if shape.is_open() {
            Projection::Open(shape)
        } else {
            Projection::Closed(shape)
        }
    }

    pub fn constructor(name: &str, args: &[&str]) -> Self {
        Projection::Constructor {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn scalar(path: &str) -> Self {
        Projection::Scalar(path.to_string())
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, Projection::Entity)
    }

    /// Every root-relative attribute path the projection reads.
    pub fn paths(&self) -> Vec<String> {
        match self {
            Projection::Entity => Vec::new(),
            Projection::Closed(shape) | Projection::Open(shape) => shape_paths(shape, None),
            Projection::Constructor { args, .. } => args.clone(),
            Projection::Scalar(path) => alloc::vec![path.clone()],
        }
    }

    /// Returns the root columns to select when the projection can be
    /// answered from the root row alone.
    ///
    /// Any relationship traversal or computed accessor disables narrowing;
    /// the full entity is loaded and the view is computed in memory.
    pub fn narrowed_columns(&self, model: &EntityModel) -> Option<Vec<usize>> {
        let paths = match self {
            Projection::Entity | Projection::Open(_) => return None,
            Projection::Closed(shape) => {
                if shape
                    .accessors()
                    .iter()
                    .any(|a| !matches!(a, Accessor::Property { .. }))
                {
                    return None;
                }
                shape_paths(shape, None)
            }
            Projection::Constructor { args, .. } => args.clone(),
            Projection::Scalar(path) => alloc::vec![path.clone()],
        };
        paths
            .iter()
            .map(|p| {
                if p.contains('.') {
                    None
                } else {
                    model.position(p)
                }
            })
            .collect()
    }
}

fn shape_paths(shape: &ViewShape, prefix: Option<&str>) -> Vec<String> {
    let qualify = |path: &str| match prefix {
        Some(rel) => format!("{}.{}", rel, path),
        None => path.to_string(),
    };
    let mut out = Vec::new();
    for accessor in shape.accessors() {
        match accessor {
            Accessor::Property { path, .. } => out.push(qualify(path)),
            Accessor::Nested {
                relation, shape, ..
            } => out.extend(shape_paths(shape, Some(relation))),
            Accessor::Computed { segments, .. } => {
                for segment in segments {
                    if let Segment::Path(path) = segment {
                        out.push(qualify(path));
                    }
                }
            }
        }
    }
    out
}
