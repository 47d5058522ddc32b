//! In-memory reference engine.
//!
//! Every transaction writes straight into the shared tables and keeps an
//! undo journal. Writes and pessimistic selects take exclusive row locks
//! that are held until the transaction ends; a conflicting request waits on
//! a condition variable until the holder finishes or its window elapses.

use crate::journal::Journal;
use crate::lock::LockTable;
use crate::stats::StorageStats;
use crate::table::Table;
use crate::{Storage, TxId};
use hashbrown::{HashMap, HashSet};
use log::{debug, warn};
use quarry_core::schema::Metamodel;
use quarry_core::{Error, Result, Row, Value};
use quarry_query::executor::{apply_assignments, compare_rows, BoundAssignment, Filter};
use quarry_query::statement::{Count, Join, JoinKind, Outcome, ResultRow, Select, Statement};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Default wait for row locks taken by writes.
pub const DEFAULT_WRITE_LOCK_TIMEOUT: Duration = Duration::from_millis(3000);

struct State {
    tables: HashMap<String, Table>,
    transactions: HashMap<TxId, Journal>,
    locks: LockTable,
    next_tx: TxId,
    stats: StorageStats,
}

/// A thread-safe in-memory `Storage`.
pub struct MemoryStorage {
    state: Mutex<State>,
    released: Condvar,
    write_timeout: Duration,
}

impl MemoryStorage {
    /// Creates an empty table for every entity in the metamodel.
    pub fn new(metamodel: &Metamodel) -> Self {
        let mut tables = HashMap::new();
        for name in metamodel.entity_names() {
            if let Ok(model) = metamodel.entity(name) {
                tables.insert(name.to_string(), Table::new(model.clone()));
            }
        }
        Self {
            state: Mutex::new(State {
                tables,
                transactions: HashMap::new(),
                locks: LockTable::new(),
                next_tx: 1,
                stats: StorageStats::default(),
            }),
            released: Condvar::new(),
            write_timeout: DEFAULT_WRITE_LOCK_TIMEOUT,
        }
    }

    /// Sets how long writes wait for a row lock.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Returns a snapshot of the statement counters.
    pub fn stats(&self) -> StorageStats {
        self.lock_state()
            .map(|state| state.stats.clone())
            .unwrap_or_default()
    }

    pub fn reset_stats(&self) {
        if let Ok(mut state) = self.lock_state() {
            state.stats = StorageStats::default();
        }
    }

    /// Reads a stored row outside any transaction, uncommitted writes included.
    pub fn row(&self, entity: &str, identity: &Value) -> Option<Row> {
        let state = self.lock_state().ok()?;
        state.tables.get(entity)?.get(identity).cloned()
    }

    /// Number of stored rows of `entity`.
    pub fn len(&self, entity: &str) -> usize {
        self.lock_state()
            .ok()
            .and_then(|state| state.tables.get(entity).map(Table::len))
            .unwrap_or(0)
    }

    pub fn active_transactions(&self) -> usize {
        self.lock_state()
            .map(|state| state.transactions.len())
            .unwrap_or(0)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::storage("storage state poisoned"))
    }

    /// Runs `apply` once `tx` holds exclusive locks on every identity that
    /// `prepare` names. `prepare` is re-run after every wait, since the
    /// rows may have changed while the state was released.
    fn with_locks<'a, P, T>(
        &'a self,
        mut state: MutexGuard<'a, State>,
        tx: TxId,
        entity: &str,
        timeout: Duration,
        mut prepare: impl FnMut(&State) -> Result<(Vec<Value>, P)>,
        apply: impl FnOnce(&mut State, P) -> Result<T>,
    ) -> Result<T> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            let (identities, prepared) = prepare(&*state)?;
            let blocked = match state.locks.try_acquire(tx, entity, &identities) {
                Ok(()) => return apply(&mut *state, prepared),
                Err(blocked) => blocked,
            };
            let now = Instant::now();
            if now >= deadline {
                let waited_ms = u64::try_from(now.duration_since(started).as_millis()).unwrap_or(u64::MAX);
                warn!(
                    "event=lock_timeout module=storage tx={} entity={} identity={} holder={} waited_ms={}",
                    tx, entity, blocked.key.identity, blocked.holder, waited_ms
                );
                return Err(Error::lock_timeout(
                    entity,
                    blocked.key.identity.to_string(),
                    waited_ms,
                ));
            }
            debug!(
                "event=lock_wait module=storage tx={} entity={} identity={} holder={}",
                tx, entity, blocked.key.identity, blocked.holder
            );
            let (guard, _) = self
                .released
                .wait_timeout(state, deadline - now)
                .map_err(|_| Error::storage("storage state poisoned"))?;
            state = guard;
        }
    }

    fn finish(&self, tx: TxId, commit: bool) -> Result<()> {
        let mut state = self.lock_state()?;
        let journal = state
            .transactions
            .remove(&tx)
            .ok_or_else(|| inactive(tx))?;
        let changes = journal.len();
        if !commit {
            journal.rollback(&mut state.tables);
        }
        let released = state.locks.release_all(tx);
        drop(state);
        self.released.notify_all();
        debug!(
            "event={} module=storage tx={} changes={} locks_released={}",
            if commit { "tx_committed" } else { "tx_rolled_back" },
            tx,
            changes,
            released
        );
        Ok(())
    }

    fn insert(&self, state: MutexGuard<'_, State>, tx: TxId, entity: &str, row: &Row) -> Result<Outcome> {
        let requested = {
            let table = table(&state, entity)?;
            let identity = table.model().identity_of(row);
            if identity.is_default_identity() {
                Vec::new()
            } else {
                vec![identity.clone()]
            }
        };
        self.with_locks(
            state,
            tx,
            entity,
            self.write_timeout,
            |_| Ok((requested.clone(), ())),
            |state, ()| {
                let table = table_mut(state, entity)?;
                let mut row = row.clone();
                let identity = table.assign_identity(&mut row)?;
                let version = table.insert(identity.clone(), row)?.version();
                journal(state, tx)?.record_insert(entity, identity.clone());
                // a fresh generated identity cannot be held by anyone else
                if state.locks.try_acquire(tx, entity, &[identity.clone()]).is_err() {
                    return Err(Error::storage(format!("{}#{} is locked", entity, identity)));
                }
                Ok(Outcome::Inserted { identity, version })
            },
        )
    }

    fn update(
        &self,
        state: MutexGuard<'_, State>,
        tx: TxId,
        entity: &str,
        identity: &Value,
        row: &Row,
        expected_version: Option<u64>,
    ) -> Result<Outcome> {
        self.with_locks(
            state,
            tx,
            entity,
            self.write_timeout,
            |_| Ok((vec![identity.clone()], ())),
            |state, ()| {
                let table = table_mut(state, entity)?;
                let current = table.get(identity).map(Row::version);
                check_version(entity, identity, expected_version, current)?;
                let old = table.update(identity, row.clone())?;
                let version = old.version().wrapping_add(1);
                journal(state, tx)?.record_update(entity, identity.clone(), old);
                Ok(Outcome::Written { version })
            },
        )
    }

    fn delete(
        &self,
        state: MutexGuard<'_, State>,
        tx: TxId,
        entity: &str,
        identity: &Value,
        expected_version: Option<u64>,
    ) -> Result<Outcome> {
        self.with_locks(
            state,
            tx,
            entity,
            self.write_timeout,
            |_| Ok((vec![identity.clone()], ())),
            |state, ()| {
                let table = table_mut(state, entity)?;
                let current = table.get(identity).map(Row::version);
                check_version(entity, identity, expected_version, current)?;
                let Some(row) = table.delete(identity) else {
                    return Ok(Outcome::Affected {
                        count: 0,
                        identities: Vec::new(),
                    });
                };
                journal(state, tx)?.record_delete(entity, identity.clone(), row);
                Ok(Outcome::Affected {
                    count: 1,
                    identities: vec![identity.clone()],
                })
            },
        )
    }

    fn verify(
        &self,
        state: MutexGuard<'_, State>,
        tx: TxId,
        entity: &str,
        identity: &Value,
        version: u64,
    ) -> Result<Outcome> {
        self.with_locks(
            state,
            tx,
            entity,
            self.write_timeout,
            |_| Ok((vec![identity.clone()], ())),
            |state, ()| {
                let current = table(state, entity)?.get(identity).map(Row::version);
                check_version(entity, identity, Some(version), current)?;
                Ok(Outcome::Written { version })
            },
        )
    }

    fn bulk_update(
        &self,
        state: MutexGuard<'_, State>,
        tx: TxId,
        entity: &str,
        joins: &[Join],
        filter: &Filter,
        assignments: &[BoundAssignment],
    ) -> Result<Outcome> {
        self.with_locks(
            state,
            tx,
            entity,
            self.write_timeout,
            |state| {
                let matched = scan(&state.tables, entity, joins, filter)?;
                let identities: Vec<Value> = matched.into_iter().map(|(id, _)| id).collect();
                Ok((identities.clone(), identities))
            },
            |state, identities| {
                let table = table_mut(state, entity)?;
                let mut updated = Vec::with_capacity(identities.len());
                for identity in &identities {
                    if let Some(row) = table.get(identity) {
                        updated.push((identity.clone(), apply_assignments(row, assignments)?));
                    }
                }
                let mut olds = Vec::with_capacity(updated.len());
                for (identity, row) in updated {
                    let old = table.update(&identity, row)?;
                    olds.push((identity, old));
                }
                let journal = journal(state, tx)?;
                for (identity, old) in olds {
                    journal.record_update(entity, identity, old);
                }
                Ok(Outcome::Affected {
                    count: identities.len() as u64,
                    identities,
                })
            },
        )
    }

    fn bulk_delete(
        &self,
        state: MutexGuard<'_, State>,
        tx: TxId,
        entity: &str,
        joins: &[Join],
        filter: &Filter,
    ) -> Result<Outcome> {
        self.with_locks(
            state,
            tx,
            entity,
            self.write_timeout,
            |state| {
                let matched = scan(&state.tables, entity, joins, filter)?;
                let identities: Vec<Value> = matched.into_iter().map(|(id, _)| id).collect();
                Ok((identities.clone(), identities))
            },
            |state, identities| {
                let table = table_mut(state, entity)?;
                let removed: Vec<(Value, Row)> = identities
                    .iter()
                    .filter_map(|id| table.delete(id).map(|row| (id.clone(), row)))
                    .collect();
                let journal = journal(state, tx)?;
                for (identity, row) in removed {
                    journal.record_delete(entity, identity, row);
                }
                Ok(Outcome::Affected {
                    count: identities.len() as u64,
                    identities,
                })
            },
        )
    }
}

impl Storage for MemoryStorage {
    fn begin(&self) -> Result<TxId> {
        let mut state = self.lock_state()?;
        let tx = state.next_tx;
        state.next_tx += 1;
        state.transactions.insert(tx, Journal::new());
        debug!("event=tx_begin module=storage tx={}", tx);
        Ok(tx)
    }

    fn execute(&self, tx: TxId, statement: &Statement) -> Result<Outcome> {
        let mut state = self.lock_state()?;
        if !state.transactions.contains_key(&tx) {
            return Err(inactive(tx));
        }
        state.stats.record(statement);
        debug!(
            "event=statement_executed module=storage tx={} kind={} entity={}",
            tx,
            statement.kind(),
            statement.entity()
        );
        match statement {
            Statement::Select(select) => {
                let rows = match select.lock {
                    None => {
                        let rows = select_rows(&state.tables, select)?;
                        state.stats.rows_returned += rows.len() as u64;
                        rows
                    }
                    Some(timeout) => self.with_locks(
                        state,
                        tx,
                        &select.entity,
                        timeout,
                        |state| {
                            let keyed = select_rows_keyed(&state.tables, select)?;
                            Ok(keyed.into_iter().unzip())
                        },
                        |state, rows: Vec<ResultRow>| {
                            state.stats.rows_returned += rows.len() as u64;
                            Ok(rows)
                        },
                    )?,
                };
                Ok(Outcome::Rows(rows))
            }
            Statement::Count(count) => Ok(Outcome::Count(count_rows(&state.tables, count)?)),
            Statement::Insert { entity, row } => self.insert(state, tx, entity, row),
            Statement::Update {
                entity,
                identity,
                row,
                expected_version,
            } => self.update(state, tx, entity, identity, row, *expected_version),
            Statement::Delete {
                entity,
                identity,
                expected_version,
            } => self.delete(state, tx, entity, identity, *expected_version),
            Statement::VerifyVersion {
                entity,
                identity,
                version,
            } => self.verify(state, tx, entity, identity, *version),
            Statement::BulkUpdate {
                entity,
                joins,
                filter,
                assignments,
            } => self.bulk_update(state, tx, entity, joins, filter, assignments),
            Statement::BulkDelete {
                entity,
                joins,
                filter,
            } => self.bulk_delete(state, tx, entity, joins, filter),
        }
    }

    fn commit(&self, tx: TxId) -> Result<()> {
        self.finish(tx, true)
    }

    fn rollback(&self, tx: TxId) -> Result<()> {
        self.finish(tx, false)
    }
}

fn inactive(tx: TxId) -> Error {
    Error::invalid_operation(format!("transaction {} is not active", tx))
}

fn table<'a>(state: &'a State, entity: &str) -> Result<&'a Table> {
    state
        .tables
        .get(entity)
        .ok_or_else(|| Error::entity_not_found(entity))
}

fn table_mut<'a>(state: &'a mut State, entity: &str) -> Result<&'a mut Table> {
    state
        .tables
        .get_mut(entity)
        .ok_or_else(|| Error::entity_not_found(entity))
}

fn journal(state: &mut State, tx: TxId) -> Result<&mut Journal> {
    state.transactions.get_mut(&tx).ok_or_else(|| inactive(tx))
}

fn check_version(
    entity: &str,
    identity: &Value,
    expected: Option<u64>,
    current: Option<u64>,
) -> Result<()> {
    match (expected, current) {
        (Some(expected), Some(actual)) if expected != actual => Err(Error::optimistic_lock(
            entity,
            identity.to_string(),
            expected,
            actual,
        )),
        (Some(expected), None) => Err(Error::optimistic_lock(entity, identity.to_string(), expected, 0)),
        _ => Ok(()),
    }
}

/// Scans `entity` in identity order, resolving joins and applying the filter.
fn scan(
    tables: &HashMap<String, Table>,
    entity: &str,
    joins: &[Join],
    filter: &Filter,
) -> Result<Vec<(Value, ResultRow)>> {
    let root = tables
        .get(entity)
        .ok_or_else(|| Error::entity_not_found(entity))?;
    let targets = joins
        .iter()
        .map(|join| {
            tables
                .get(&join.target)
                .ok_or_else(|| Error::entity_not_found(join.target.as_str()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = Vec::new();
    'rows: for (identity, row) in root.scan() {
        let mut joined = Vec::with_capacity(joins.len());
        for (join, target) in joins.iter().zip(&targets) {
            let related = row
                .get(join.fk_position)
                .filter(|fk| !fk.is_null())
                .and_then(|fk| target.get(fk))
                .cloned();
            if related.is_none() && join.kind == JoinKind::Inner {
                continue 'rows;
            }
            joined.push(related);
        }
        let candidate = ResultRow {
            row: row.clone(),
            joined,
        };
        if filter.matches(&candidate) {
            out.push((identity.clone(), candidate));
        }
    }
    Ok(out)
}

/// Filter, sort on full rows, narrow, distinct, then window.
fn select_rows_keyed(
    tables: &HashMap<String, Table>,
    select: &Select,
) -> Result<Vec<(Value, ResultRow)>> {
    let mut keyed = scan(tables, &select.entity, &select.joins, &select.filter)?;
    keyed.sort_by(|a, b| compare_rows(&a.1, &b.1, &select.order));

    if let Some(columns) = &select.columns {
        for (_, result) in keyed.iter_mut() {
            result.row = narrow(&result.row, columns)?;
        }
    }

    if select.distinct {
        let mut seen = HashSet::new();
        keyed.retain(|(_, result)| {
            let key: (Vec<Value>, Vec<Option<Vec<Value>>>) = (
                result.row.values().to_vec(),
                result
                    .joined
                    .iter()
                    .map(|r| r.as_ref().map(|r| r.values().to_vec()))
                    .collect(),
            );
            seen.insert(key)
        });
    }

    Ok(keyed
        .into_iter()
        .skip(select.offset)
        .take(select.limit.unwrap_or(usize::MAX))
        .collect())
}

fn select_rows(tables: &HashMap<String, Table>, select: &Select) -> Result<Vec<ResultRow>> {
    Ok(select_rows_keyed(tables, select)?
        .into_iter()
        .map(|(_, row)| row)
        .collect())
}

fn count_rows(tables: &HashMap<String, Table>, count: &Count) -> Result<u64> {
    let matched = scan(tables, &count.entity, &count.joins, &count.filter)?;
    // rows are unique by identity, so distinct never lowers a root count
    Ok(matched.len() as u64)
}

fn narrow(row: &Row, columns: &[usize]) -> Result<Row> {
    let values = columns
        .iter()
        .map(|&position| {
            row.get(position)
                .cloned()
                .ok_or_else(|| Error::invalid_operation(format!("no column at position {}", position)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::new_with_version(row.version(), values))
}
