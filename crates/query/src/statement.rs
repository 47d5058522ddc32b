//! Storage-facing statements and their outcomes.
//!
//! Statements are fully bound: every path is resolved to a row position
//! and every parameter to a value. A storage engine needs no metamodel
//! beyond table layout to execute them.

use crate::executor::{BoundAssignment, Filter};
use crate::sort::Direction;
use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;
use quarry_core::{Row, Value};

/// Join kind for a many-to-one hop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// Root rows without a related row are dropped.
    Inner,
    /// Root rows without a related row are kept with a missing related row.
    Left,
}

/// A many-to-one join from the root entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    pub relation: String,
    pub target: String,
    /// Root-row position of the foreign key.
    pub fk_position: usize,
    pub kind: JoinKind,
    /// The related row is returned for eager loading.
    pub fetch: bool,
}

/// A bound column: a root attribute or an attribute of a joined row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Index into the statement's joins, `None` for the root row.
    pub join: Option<usize>,
    pub position: usize,
}

impl ColumnRef {
    pub fn root(position: usize) -> Self {
        Self {
            join: None,
            position,
        }
    }

    pub fn joined(join: usize, position: usize) -> Self {
        Self {
            join: Some(join),
            position,
        }
    }
}

/// A bound sort key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub column: ColumnRef,
    pub direction: Direction,
    pub ignore_case: bool,
}

/// A row query.
#[derive(Clone, Debug, PartialEq)]
pub struct Select {
    pub entity: String,
    pub joins: Vec<Join>,
    pub filter: Filter,
    /// Root positions to return instead of full rows.
    pub columns: Option<Vec<usize>>,
    pub distinct: bool,
    pub order: Vec<OrderKey>,
    pub offset: usize,
    pub limit: Option<usize>,
    /// Exclusive row locks on matched root rows, waiting at most this long.
    pub lock: Option<Duration>,
}

impl Select {
    /// Selects every row of `entity`.
    pub fn all(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            joins: Vec::new(),
            filter: Filter::All,
            columns: None,
            distinct: false,
            order: Vec::new(),
            offset: 0,
            limit: None,
            lock: None,
        }
    }
}

/// A row count.
#[derive(Clone, Debug, PartialEq)]
pub struct Count {
    pub entity: String,
    pub joins: Vec<Join>,
    pub filter: Filter,
    pub distinct: bool,
}

/// A statement executed by a storage engine inside a transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Select(Select),
    Count(Count),
    Insert {
        entity: String,
        row: Row,
    },
    /// Replaces a row. Fails with an optimistic lock error when the stored
    /// version differs from `expected_version`, or the row is gone.
    Update {
        entity: String,
        identity: Value,
        row: Row,
        expected_version: Option<u64>,
    },
    Delete {
        entity: String,
        identity: Value,
        expected_version: Option<u64>,
    },
    /// Checks a row version without writing.
    VerifyVersion {
        entity: String,
        identity: Value,
        version: u64,
    },
    BulkUpdate {
        entity: String,
        joins: Vec<Join>,
        filter: Filter,
        assignments: Vec<BoundAssignment>,
    },
    BulkDelete {
        entity: String,
        joins: Vec<Join>,
        filter: Filter,
    },
}

impl Statement {
    /// Returns the root entity name.
    pub fn entity(&self) -> &str {
        match self {
            Statement::Select(s) => &s.entity,
            Statement::Count(c) => &c.entity,
            Statement::Insert { entity, .. }
            | Statement::Update { entity, .. }
            | Statement::Delete { entity, .. }
            | Statement::VerifyVersion { entity, .. }
            | Statement::BulkUpdate { entity, .. }
            | Statement::BulkDelete { entity, .. } => entity,
        }
    }

    /// Returns a short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "select",
            Statement::Count(_) => "count",
            Statement::Insert { .. } => "insert",
            Statement::Update { .. } => "update",
            Statement::Delete { .. } => "delete",
            Statement::VerifyVersion { .. } => "verify_version",
            Statement::BulkUpdate { .. } => "bulk_update",
            Statement::BulkDelete { .. } => "bulk_delete",
        }
    }

    /// Returns true for statements that bypass the working set.
    pub fn is_bulk(&self) -> bool {
        matches!(self, Statement::BulkUpdate { .. } | Statement::BulkDelete { .. })
    }
}

/// One row returned by a select.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultRow {
    /// The root row, or only the selected columns when narrowed.
    pub row: Row,
    /// Related rows aligned with the select's joins; `None` for a left
    /// join without a match.
    pub joined: Vec<Option<Row>>,
}

impl ResultRow {
    pub fn new(row: Row) -> Self {
        Self {
            row,
            joined: Vec::new(),
        }
    }

    /// Reads a bound column.
    pub fn value(&self, column: &ColumnRef) -> Option<&Value> {
        match column.join {
            None => self.row.get(column.position),
            Some(j) => self.joined.get(j)?.as_ref()?.get(column.position),
        }
    }
}

/// The result of executing a statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Rows(Vec<ResultRow>),
    Count(u64),
    /// A row was inserted with this identity at version 1.
    Inserted { identity: Value, version: u64 },
    /// A single-row write succeeded; the row now has this version.
    Written { version: u64 },
    /// A bulk write touched these identities.
    Affected { count: u64, identities: Vec<Value> },
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Rows(_) => "rows",
            Outcome::Count(_) => "count",
            Outcome::Inserted { .. } => "inserted",
            Outcome::Written { .. } => "written",
            Outcome::Affected { .. } => "affected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_result_row_value() {
        let row = ResultRow {
            row: Row::new(vec![Value::Int64(1), Value::Int64(7)]),
            joined: vec![Some(Row::new(vec![Value::Int64(7), Value::from("teamA")])), None],
        };
        assert_eq!(row.value(&ColumnRef::root(1)), Some(&Value::Int64(7)));
        assert_eq!(row.value(&ColumnRef::joined(0, 1)), Some(&Value::from("teamA")));
        assert_eq!(row.value(&ColumnRef::joined(1, 1)), None);
        assert_eq!(row.value(&ColumnRef::joined(5, 0)), None);
    }

    #[test]
    fn test_statement_kind() {
        let select = Statement::Select(Select::all("Member"));
        assert_eq!(select.kind(), "select");
        assert_eq!(select.entity(), "Member");
        assert!(!select.is_bulk());
        let bulk = Statement::BulkDelete {
            entity: "Member".into(),
            joins: vec![],
            filter: Filter::All,
        };
        assert!(bulk.is_bulk());
    }
}
