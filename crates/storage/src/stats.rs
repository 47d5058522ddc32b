//! Statement statistics.

use quarry_query::statement::Statement;

/// Counts of executed statements, by kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub selects: u64,
    pub counts: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub verifies: u64,
    pub bulk_updates: u64,
    pub bulk_deletes: u64,
    /// Rows returned by selects.
    pub rows_returned: u64,
    /// The limit of the most recent select.
    pub last_select_limit: Option<usize>,
}

impl StorageStats {
    pub(crate) fn record(&mut self, statement: &Statement) {
        match statement {
            Statement::Select(select) => {
                self.selects += 1;
                self.last_select_limit = select.limit;
            }
            Statement::Count(_) => self.counts += 1,
            Statement::Insert { .. } => self.inserts += 1,
            Statement::Update { .. } => self.updates += 1,
            Statement::Delete { .. } => self.deletes += 1,
            Statement::VerifyVersion { .. } => self.verifies += 1,
            Statement::BulkUpdate { .. } => self.bulk_updates += 1,
            Statement::BulkDelete { .. } => self.bulk_deletes += 1,
        }
    }

    /// Total number of statements executed.
    pub fn statements(&self) -> u64 {
        self.selects
            + self.counts
            + self.inserts
            + self.updates
            + self.deletes
            + self.verifies
            + self.bulk_updates
            + self.bulk_deletes
    }

    /// Number of statements that write rows.
    pub fn writes(&self) -> u64 {
        self.inserts + self.updates + self.deletes + self.bulk_updates + self.bulk_deletes
    }
}
