//! Unit of work: one storage transaction plus the working set it manages.
//!
//! Entities read or saved through a unit of work are tracked by identity.
//! Changes stay in memory until a flush, which happens before queries
//! (when configured) and on commit. New entities are the exception: they
//! are inserted immediately so they receive their identity.

use crate::audit::AuditingInterceptor;
use crate::config::{InvalidationStrategy, RepositoryConfig};
use crate::lock::LockCoordinator;
use crate::record::EntityRecord;
use crate::working_set::{EntityKey, WorkingSet};
use log::{debug, info, warn};
use quarry_core::schema::{EntityModel, Metamodel};
use quarry_core::{Error, Result, Row, Value};
use quarry_query::ast::Operator;
use quarry_query::executor::Filter;
use quarry_query::statement::{ColumnRef, Join, Outcome, ResultRow, Select, Statement};
use quarry_query::LockMode;
use quarry_storage::{Storage, TxId};
use std::sync::Arc;
use std::time::Duration;

pub struct UnitOfWork {
    storage: Arc<dyn Storage>,
    metamodel: Arc<Metamodel>,
    config: Arc<RepositoryConfig>,
    auditing: Option<Arc<AuditingInterceptor>>,
    locks: LockCoordinator,
    working_set: WorkingSet,
    tx: Option<TxId>,
}

impl UnitOfWork {
    pub(crate) fn new(
        storage: Arc<dyn Storage>,
        metamodel: Arc<Metamodel>,
        config: Arc<RepositoryConfig>,
        auditing: Option<Arc<AuditingInterceptor>>,
        tx: TxId,
    ) -> Self {
        Self {
            locks: LockCoordinator::new(config.lock_timeout()),
            storage,
            metamodel,
            config,
            auditing,
            working_set: WorkingSet::new(),
            tx: Some(tx),
        }
    }

    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.tx.is_some()
    }

    /// Number of managed entities.
    pub fn managed(&self) -> usize {
        self.working_set.len()
    }

    pub fn contains(&self, entity: &str, identity: &Value) -> bool {
        self.working_set
            .contains(&EntityKey::new(entity, identity.clone()))
    }

    pub fn has_pending_changes(&self) -> bool {
        self.working_set.has_pending()
    }

    /// A new, unsaved entity with every attribute at its initial value.
    pub fn create(&self, entity: &str) -> Result<EntityRecord> {
        EntityRecord::create(Arc::clone(&self.metamodel), entity)
    }

    /// Inserts a new entity right away and starts managing it.
    pub fn persist(&mut self, record: EntityRecord) -> Result<EntityRecord> {
        let metamodel = Arc::clone(&self.metamodel);
        let model = metamodel.entity(record.entity())?;
        let entity = record.entity().to_string();
        let mut record = record;
        let mut row = record.row().clone();
        if let Some(auditing) = &self.auditing {
            auditing.on_create(model, &mut row);
        }

        let outcome = self.execute(&Statement::Insert {
            entity: entity.clone(),
            row: row.clone(),
        })?;
        let Outcome::Inserted { identity, version } = outcome else {
            return Err(unexpected(&outcome, "insert"));
        };
        row.set(model.id_position(), identity.clone());
        row.set_version(version);
        debug!(
            "event=entity_persisted module=unit_of_work entity={} identity={}",
            entity, identity
        );

        self.working_set
            .put(EntityKey::new(entity, identity), row.clone());
        record.replace_row(row);
        Ok(record)
    }

    /// Persists a new entity or merges a detached one into this unit of work.
    ///
    /// A versioned entity whose version was never observed by this unit of
    /// work fails with an optimistic lock error. An entity that is not new
    /// but missing from storage is inserted.
    pub fn save(&mut self, record: EntityRecord) -> Result<EntityRecord> {
        let metamodel = Arc::clone(&self.metamodel);
        let model = metamodel.entity(record.entity())?;
        if model.is_new(record.row()) {
            return self.persist(record);
        }

        let identity = identity_for(model, record.identity())?;
        let key = EntityKey::new(record.entity(), identity.clone());
        if !self.working_set.contains(&key) {
            match self.fetch_row(model, &identity, None)? {
                Some(row) => {
                    self.working_set.load(key.clone(), row, false);
                }
                None => return self.persist(record),
            }
        }

        let Some(entry) = self.working_set.get(&key) else {
            return Err(Error::invalid_operation(format!("{} is not managed", key.entity)));
        };
        if entry.removed {
            return Err(Error::invalid_operation(format!(
                "{}#{} was removed in this unit of work",
                key.entity, key.identity
            )));
        }
        if model.is_versioned() && !entry.accepts(record.version()) {
            return Err(Error::optimistic_lock(
                key.entity.clone(),
                key.identity.to_string(),
                record.version(),
                entry.version(),
            ));
        }

        let mut record = record;
        self.working_set
            .update_current(&key, record.row().clone())?;
        if let Some(entry) = self.working_set.get(&key) {
            record.replace_row(entry.current.clone());
        }
        Ok(record)
    }

    /// Looks an entity up by identity, consulting the working set first.
    pub fn find(&mut self, entity: &str, identity: &Value) -> Result<Option<EntityRecord>> {
        let metamodel = Arc::clone(&self.metamodel);
        let model = metamodel.entity(entity)?;
        if identity.is_null() {
            return Ok(None);
        }
        let identity = identity_for(model, identity)?;
        let key = EntityKey::new(entity, identity.clone());
        if let Some(entry) = self.working_set.get(&key) {
            if entry.removed {
                return Ok(None);
            }
            return Ok(Some(self.record(entity, entry.current.clone())));
        }

        match self.fetch_row(model, &identity, None)? {
            Some(row) => {
                let managed = self.working_set.load(key, row, false).clone();
                Ok(Some(self.record(entity, managed)))
            }
            None => Ok(None),
        }
    }

    /// Loads an entity, applies `change` and saves the result.
    pub fn modify(
        &mut self,
        entity: &str,
        identity: &Value,
        change: impl FnOnce(&mut EntityRecord) -> Result<()>,
    ) -> Result<Option<EntityRecord>> {
        let Some(mut record) = self.find(entity, identity)? else {
            return Ok(None);
        };
        change(&mut record)?;
        self.save(record).map(Some)
    }

    /// Schedules an entity for deletion. Returns false when it does not exist.
    pub fn remove(&mut self, entity: &str, identity: &Value) -> Result<bool> {
        let Some(record) = self.find(entity, identity)? else {
            return Ok(false);
        };
        let key = EntityKey::new(entity, record.identity().clone());
        self.working_set.mark_removed(&key)?;
        Ok(true)
    }

    /// The entity a many-to-one relation of `record` points at.
    pub fn find_related(
        &mut self,
        record: &EntityRecord,
        relation: &str,
    ) -> Result<Option<EntityRecord>> {
        let metamodel = Arc::clone(&self.metamodel);
        let model = metamodel.entity(record.entity())?;
        let target = model
            .relation(relation)
            .ok_or_else(|| {
                Error::invalid_operation(format!(
                    "{} has no relation '{}'",
                    record.entity(),
                    relation
                ))
            })?
            .target()
            .to_string();
        match record.get(relation) {
            Some(fk) if !fk.is_null() => {
                let fk = fk.clone();
                self.find(&target, &fk)
            }
            _ => Ok(None),
        }
    }

    /// Reads an entity under the given lock mode.
    ///
    /// A pessimistic lock holds an exclusive storage lock on the row until
    /// this unit of work ends and refreshes a clean managed copy. An
    /// optimistic lock has the version checked at flush time.
    pub fn lock(
        &mut self,
        entity: &str,
        identity: &Value,
        mode: LockMode,
    ) -> Result<Option<EntityRecord>> {
        match mode {
            LockMode::None => self.find(entity, identity),
            LockMode::Optimistic => {
                let found = self.find(entity, identity)?;
                if let Some(record) = &found {
                    self.working_set
                        .mark_verify(&EntityKey::new(entity, record.identity().clone()));
                }
                Ok(found)
            }
            LockMode::Pessimistic => {
                let metamodel = Arc::clone(&self.metamodel);
                let model = metamodel.entity(entity)?;
                let identity = identity_for(model, identity)?;
                let timeout = self.locks.timeout();
                let Some(row) = self.fetch_row(model, &identity, Some(timeout))? else {
                    return Ok(None);
                };
                let key = EntityKey::new(entity, identity);
                let managed_state = self
                    .working_set
                    .get(&key)
                    .map(|e| (e.removed, e.is_dirty(), e.current.clone()));
                let managed = match managed_state {
                    Some((true, _, _)) => return Ok(None),
                    Some((false, true, current)) => current,
                    Some((false, false, _)) => {
                        self.working_set.refresh(&key, row.clone());
                        row
                    }
                    None => self.working_set.load(key, row, false).clone(),
                };
                Ok(Some(self.record(entity, managed)))
            }
        }
    }

    /// Writes every pending change to storage, in entity-key order.
    pub fn flush(&mut self) -> Result<()> {
        self.tx()?;
        let metamodel = Arc::clone(&self.metamodel);
        let pending = self.working_set.pending_keys();
        for key in &pending {
            let Some(entry) = self.working_set.get(key).cloned() else {
                continue;
            };
            let model = metamodel.entity(&key.entity)?;
            let expected_version = if model.is_versioned() || entry.verify {
                Some(entry.version())
            } else {
                None
            };

            if entry.removed {
                self.execute(&Statement::Delete {
                    entity: key.entity.clone(),
                    identity: key.identity.clone(),
                    expected_version,
                })?;
                self.working_set.forget(key);
            } else if entry.is_dirty() {
                let mut row = entry.current.clone();
                if let Some(auditing) = &self.auditing {
                    auditing.on_update(model, &entry.snapshot, &mut row);
                }
                let outcome = self.execute(&Statement::Update {
                    entity: key.entity.clone(),
                    identity: key.identity.clone(),
                    row: row.clone(),
                    expected_version,
                })?;
                let Outcome::Written { version } = outcome else {
                    return Err(unexpected(&outcome, "update"));
                };
                self.working_set.update_current(key, row)?;
                self.working_set.written(key, version);
            } else {
                self.execute(&Statement::VerifyVersion {
                    entity: key.entity.clone(),
                    identity: key.identity.clone(),
                    version: entry.version(),
                })?;
                self.working_set.written(key, entry.version());
            }
        }
        if !pending.is_empty() {
            debug!(
                "event=flushed module=unit_of_work tx={:?} entities={}",
                self.tx,
                pending.len()
            );
        }
        Ok(())
    }

    /// Flushes and commits. On a failed flush the transaction is rolled back.
    pub fn commit(mut self) -> Result<()> {
        let tx = self.tx()?;
        if let Err(err) = self.flush() {
            warn!(
                "event=commit_failed module=unit_of_work tx={} error={}",
                tx, err
            );
            self.abort();
            return Err(err);
        }
        self.tx = None;
        self.working_set.clear();
        self.storage.commit(tx)?;
        info!("event=unit_of_work_committed module=unit_of_work tx={}", tx);
        Ok(())
    }

    /// Discards pending changes and rolls the storage transaction back.
    pub fn rollback(mut self) -> Result<()> {
        let tx = self.tx()?;
        self.tx = None;
        self.working_set.clear();
        self.storage.rollback(tx)?;
        info!("event=unit_of_work_rolled_back module=unit_of_work tx={}", tx);
        Ok(())
    }

    /// Evicts one clean entity. Fails when it has unflushed changes.
    pub fn invalidate(&mut self, entity: &str, identity: &Value) -> Result<bool> {
        let evicted = self
            .working_set
            .invalidate(entity, Some(std::slice::from_ref(identity)))?;
        Ok(evicted > 0)
    }

    /// Evicts every clean entity of `entity`. Fails when any has unflushed changes.
    pub fn invalidate_all(&mut self, entity: &str) -> Result<usize> {
        self.working_set.invalidate(entity, None)
    }

    /// Stops managing an entity, dropping any unflushed change to it.
    pub fn detach(&mut self, entity: &str, identity: &Value) -> bool {
        self.working_set
            .forget(&EntityKey::new(entity, identity.clone()))
            .is_some()
    }

    /// Stops managing every entity, dropping unflushed changes.
    pub fn clear(&mut self) {
        self.working_set.clear();
    }

    pub(crate) fn execute(&mut self, statement: &Statement) -> Result<Outcome> {
        let tx = self.tx()?;
        self.storage.execute(tx, statement)
    }

    pub(crate) fn locks(&self) -> &LockCoordinator {
        &self.locks
    }

    /// Flushes before a query when configured and there is something to flush.
    pub(crate) fn prepare_for_query(&mut self) -> Result<()> {
        self.tx()?;
        if self.config.flush_before_query && self.working_set.has_pending() {
            self.flush()?;
        }
        Ok(())
    }

    /// Turns a full result row into a managed entity record.
    ///
    /// Rows of fetched joins are merged as well and attached to the record.
    pub(crate) fn merge(
        &mut self,
        entity: &str,
        result: ResultRow,
        joins: &[Join],
        read_only: bool,
        verify: bool,
    ) -> Result<EntityRecord> {
        let metamodel = Arc::clone(&self.metamodel);
        let model = metamodel.entity(entity)?;
        let ResultRow { row, joined } = result;
        let key = EntityKey::new(entity, model.identity_of(&row).clone());
        let managed = self.working_set.load(key.clone(), row, read_only).clone();
        if verify {
            self.working_set.mark_verify(&key);
        }

        let mut record = self.record(entity, managed);
        for (join, related) in joins.iter().zip(joined) {
            if !join.fetch {
                continue;
            }
            let related = match related {
                Some(row) => Some(self.merge(
                    &join.target,
                    ResultRow::new(row),
                    &[],
                    read_only,
                    false,
                )?),
                None => None,
            };
            record.attach(&join.relation, related);
        }
        Ok(record)
    }

    /// Brings the working set in line with a bulk write that bypassed it.
    ///
    /// A failure rolls the unit of work back.
    pub(crate) fn invalidate_after_bulk(&mut self, entity: &str, identities: &[Value]) -> Result<usize> {
        let targets = match self.config.invalidation {
            InvalidationStrategy::ClearType => None,
            InvalidationStrategy::Targeted => Some(identities),
        };
        match self.working_set.invalidate(entity, targets) {
            Ok(evicted) => {
                debug!(
                    "event=cache_invalidated module=unit_of_work entity={} evicted={}",
                    entity, evicted
                );
                Ok(evicted)
            }
            Err(err) => {
                warn!(
                    "event=invalidation_failed module=unit_of_work entity={} error={}",
                    entity, err
                );
                self.abort();
                Err(err)
            }
        }
    }

    fn fetch_row(
        &mut self,
        model: &EntityModel,
        identity: &Value,
        lock: Option<Duration>,
    ) -> Result<Option<Row>> {
        let mut select = Select::all(model.name());
        select.filter = Filter::Compare {
            column: ColumnRef::root(model.id_position()),
            operator: Operator::Equals,
            operands: vec![identity.clone()],
            ignore_case: false,
        };
        select.lock = lock;
        match self.execute(&Statement::Select(select))? {
            Outcome::Rows(rows) => Ok(rows.into_iter().next().map(|r| r.row)),
            other => Err(unexpected(&other, "select")),
        }
    }

    fn record(&self, entity: &str, row: Row) -> EntityRecord {
        EntityRecord::new(Arc::clone(&self.metamodel), entity, row)
    }

    fn tx(&self) -> Result<TxId> {
        self.tx
            .ok_or_else(|| Error::invalid_operation("unit of work already completed"))
    }

    fn abort(&mut self) {
        self.working_set.clear();
        if let Some(tx) = self.tx.take() {
            if let Err(err) = self.storage.rollback(tx) {
                warn!(
                    "event=rollback_failed module=unit_of_work tx={} error={}",
                    tx, err
                );
            } else {
                info!("event=unit_of_work_aborted module=unit_of_work tx={}", tx);
            }
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.tx.is_some() {
            debug!("event=unit_of_work_dropped module=unit_of_work tx={:?}", self.tx);
            self.abort();
        }
    }
}

/// Coerces a caller-supplied identity to the id attribute's type.
fn identity_for(model: &EntityModel, identity: &Value) -> Result<Value> {
    let expected = model.id().data_type();
    identity
        .coerce_to(expected)
        .ok_or_else(|| Error::type_mismatch(expected, identity.data_type().unwrap_or(expected)))
}

fn unexpected(outcome: &Outcome, statement: &str) -> Error {
    Error::storage(format!(
        "{} returned an unexpected {} outcome",
        statement,
        outcome.kind()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use quarry_core::schema::{EntityModelBuilder, IdStrategy};
    use quarry_core::DataType;
    use quarry_storage::MemoryStorage;

    fn setup() -> (Database, Arc<MemoryStorage>) {
        let team = EntityModelBuilder::new("Team")
            .unwrap()
            .id("id", DataType::Int64, IdStrategy::Generated)
            .unwrap()
            .attribute("name", DataType::String)
            .unwrap()
            .build()
            .unwrap();
        let member = EntityModelBuilder::new("Member")
            .unwrap()
            .id("id", DataType::Int64, IdStrategy::Generated)
            .unwrap()
            .attribute("username", DataType::String)
            .unwrap()
            .attribute("age", DataType::Int32)
            .unwrap()
            .many_to_one("team", "Team", DataType::Int64)
            .unwrap()
            .versioned()
            .build()
            .unwrap();
        let metamodel = Arc::new(Metamodel::builder().entity(team).entity(member).build().unwrap());
        let storage = Arc::new(MemoryStorage::new(&metamodel));
        (Database::new(metamodel, storage.clone()), storage)
    }

    fn member(uow: &UnitOfWork, name: &str, age: i32) -> EntityRecord {
        uow.create("Member")
            .unwrap()
            .with("username", name)
            .unwrap()
            .with("age", age)
            .unwrap()
    }

    #[test]
    fn test_persist_assigns_identity() {
        let (db, storage) = setup();
        let mut uow = db.begin().unwrap();
        let saved = uow.save(member(&uow, "member1", 10)).unwrap();
        assert_eq!(saved.identity(), &Value::Int64(1));
        assert_eq!(saved.version(), 1);
        assert!(uow.contains("Member", &Value::Int64(1)));
        uow.commit().unwrap();
        assert_eq!(storage.len("Member"), 1);
    }

    #[test]
    fn test_find_uses_working_set() {
        let (db, storage) = setup();
        let mut uow = db.begin().unwrap();
        uow.save(member(&uow, "member1", 10)).unwrap();
        storage.reset_stats();

        let found = uow.find("Member", &Value::Int32(1)).unwrap().unwrap();
        assert_eq!(found.get_str("username"), Some("member1"));
        assert_eq!(storage.stats().selects, 0);
        assert_eq!(uow.find("Member", &Value::Int64(99)).unwrap(), None);
        assert_eq!(storage.stats().selects, 1);
    }

    #[test]
    fn test_changes_flush_on_commit() {
        let (db, storage) = setup();
        let mut uow = db.begin().unwrap();
        let saved = uow.save(member(&uow, "member1", 10)).unwrap();
        uow.commit().unwrap();

        let mut uow = db.begin().unwrap();
        uow.modify("Member", saved.identity(), |m| m.set("age", 11)).unwrap();
        assert!(uow.has_pending_changes());
        assert_eq!(storage.stats().updates, 0);
        uow.commit().unwrap();

        let row = storage.row("Member", &Value::Int64(1)).unwrap();
        assert_eq!(row.get(2), Some(&Value::Int32(11)));
        assert_eq!(row.version(), 2);
    }

    #[test]
    fn test_rollback_discards() {
        let (db, storage) = setup();
        let mut uow = db.begin().unwrap();
        uow.save(member(&uow, "member1", 10)).unwrap();
        uow.rollback().unwrap();
        assert_eq!(storage.len("Member"), 0);
        assert_eq!(storage.active_transactions(), 0);
    }

    #[test]
    fn test_drop_rolls_back() {
        let (db, storage) = setup();
        {
            let mut uow = db.begin().unwrap();
            uow.save(member(&uow, "member1", 10)).unwrap();
        }
        assert_eq!(storage.len("Member"), 0);
        assert_eq!(storage.active_transactions(), 0);
    }

    #[test]
    fn test_remove_and_find() {
        let (db, storage) = setup();
        let mut uow = db.begin().unwrap();
        let saved = uow.save(member(&uow, "member1", 10)).unwrap();
        assert!(uow.remove("Member", saved.identity()).unwrap());
        assert_eq!(uow.find("Member", saved.identity()).unwrap(), None);
        assert!(!uow.remove("Member", &Value::Int64(42)).unwrap());
        uow.commit().unwrap();
        assert_eq!(storage.len("Member"), 0);
    }

    #[test]
    fn test_stale_detached_save_fails() {
        let (db, _) = setup();
        let mut uow = db.begin().unwrap();
        let saved = uow.save(member(&uow, "member1", 10)).unwrap();
        uow.commit().unwrap();

        let mut first = db.begin().unwrap();
        first.modify("Member", saved.identity(), |m| m.set("age", 20)).unwrap();
        first.commit().unwrap();

        let mut second = db.begin().unwrap();
        let stale = saved.with("age", 30).unwrap();
        let err = second.save(stale).unwrap_err();
        assert_eq!(err, Error::optimistic_lock("Member", "1", 1, 2));
    }

    #[test]
    fn test_resave_after_flush_is_not_stale() {
        let (db, _) = setup();
        let mut uow = db.begin().unwrap();
        let saved = uow.save(member(&uow, "member1", 10)).unwrap();
        let saved = uow.save(saved.with("age", 11).unwrap()).unwrap();
        uow.flush().unwrap();
        assert!(uow.save(saved.with("age", 12).unwrap()).is_ok());
        uow.commit().unwrap();
    }

    #[test]
    fn test_find_related() {
        let (db, _) = setup();
        let mut uow = db.begin().unwrap();
        let team = uow.create("Team").unwrap().with("name", "teamA").unwrap();
        let team = uow.save(team).unwrap();
        let mut m = member(&uow, "member1", 10);
        m.set_related("team", &team).unwrap();
        let m = uow.save(m).unwrap();

        let related = uow.find_related(&m, "team").unwrap().unwrap();
        assert_eq!(related.get_str("name"), Some("teamA"));
        assert!(uow.find_related(&m, "nope").is_err());
    }

    #[test]
    fn test_invalidate_refuses_dirty() {
        let (db, _) = setup();
        let mut uow = db.begin().unwrap();
        let saved = uow.save(member(&uow, "member1", 10)).unwrap();
        uow.save(saved.with("age", 50).unwrap()).unwrap();
        assert!(matches!(
            uow.invalidate_all("Member"),
            Err(Error::CacheInvalidation { .. })
        ));
        uow.flush().unwrap();
        assert_eq!(uow.invalidate_all("Member").unwrap(), 1);
    }

    #[test]
    fn test_closed_unit_of_work() {
        let (db, _) = setup();
        let mut uow = db.begin().unwrap();
        uow.abort();
        assert!(!uow.is_active());
        assert!(matches!(
            uow.find("Member", &Value::Int64(1)),
            Err(Error::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_pessimistic_lock_blocks_other_unit_of_work() {
        let (db, _) = setup();
        let mut uow = db.begin().unwrap();
        let saved = uow.save(member(&uow, "member1", 10)).unwrap();
        uow.commit().unwrap();

        let db = db
            .with_config(RepositoryConfig {
                lock_timeout_ms: 30,
                ..RepositoryConfig::default()
            })
            .unwrap();
        let mut holder = db.begin().unwrap();
        assert!(holder
            .lock("Member", saved.identity(), LockMode::Pessimistic)
            .unwrap()
            .is_some());

        let mut waiter = db.begin().unwrap();
        let err = waiter
            .lock("Member", saved.identity(), LockMode::Pessimistic)
            .unwrap_err();
        assert!(matches!(err, Error::LockTimeout { .. }));

        holder.commit().unwrap();
        assert!(waiter
            .lock("Member", saved.identity(), LockMode::Pessimistic)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_optimistic_lock_verifies_on_commit() {
        let (db, storage) = setup();
        let mut uow = db.begin().unwrap();
        let saved = uow.save(member(&uow, "member1", 10)).unwrap();
        uow.commit().unwrap();

        let mut reader = db.begin().unwrap();
        reader
            .lock("Member", saved.identity(), LockMode::Optimistic)
            .unwrap();

        let mut writer = db.begin().unwrap();
        writer.modify("Member", saved.identity(), |m| m.set("age", 99)).unwrap();
        writer.commit().unwrap();

        let err = reader.commit().unwrap_err();
        assert!(matches!(err, Error::OptimisticLock { expected: 1, actual: 2, .. }));
        assert_eq!(storage.stats().verifies, 1);
    }
}
