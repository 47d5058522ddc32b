//! Repository - declared query methods plus CRUD for one entity type.
//!
//! Every operation runs inside a caller-supplied unit of work, so several
//! repositories can take part in one transaction.

use crate::example::Example;
use crate::executor::QueryExecutor;
use crate::method::{Method, MethodConflict, MethodKind, ReturnShape};
use crate::record::{EntityRecord, Record};
use crate::unit_of_work::UnitOfWork;
use hashbrown::HashMap;
use log::{debug, warn};
use quarry_core::schema::Metamodel;
use quarry_core::{Error, Result, Value};
use quarry_query::planner::Action;
use quarry_query::{Arguments, Page, PageRequest, Predicate, PreparedPlan, QueryPlan, Slice, Sort};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct BoundMethod {
    kind: MethodKind,
    shape: ReturnShape,
    executor: QueryExecutor,
}

pub struct RepositoryBuilder {
    metamodel: Arc<Metamodel>,
    entity: String,
    methods: Vec<Method>,
}

impl RepositoryBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods.extend(methods);
        self
    }

    /// Compiles every declared method.
    ///
    /// Fails on the first method that cannot be planned. When an explicit
    /// query and a derived query share a name, the explicit query is kept
    /// and the conflict is recorded.
    pub fn build(self) -> Result<Repository> {
        let metamodel = self.metamodel;
        let entity = self.entity;
        metamodel.entity(&entity)?;

        let mut bound: HashMap<String, BoundMethod> = HashMap::new();
        let mut conflicts: Vec<MethodConflict> = Vec::new();
        for method in &self.methods {
            let (shape, executor) = method.compile(&metamodel, &entity).map_err(|err| {
                warn!(
                    "event=method_rejected module=repository entity={} method={} error={}",
                    entity,
                    method.name(),
                    err
                );
                err
            })?;
            let candidate = BoundMethod {
                kind: method.kind(),
                shape,
                executor,
            };

            if let Some(existing) = bound.get(method.name()).map(|m| m.kind) {
                if existing == method.kind() || (existing.is_explicit() && method.kind().is_explicit()) {
                    return Err(Error::descriptor(format!(
                        "method {} is declared more than once on {}",
                        method.name(),
                        entity
                    )));
                }
                let (kept, shadowed) = if method.kind().is_explicit() {
                    (method.kind(), existing)
                } else {
                    (existing, method.kind())
                };
                record_conflict(&mut conflicts, &entity, method.name(), kept, shadowed);
                if method.kind().is_explicit() {
                    bound.insert(method.name().to_string(), candidate);
                }
                continue;
            }

            if method.kind().is_explicit() && method.is_derivable(&metamodel, &entity) {
                record_conflict(&mut conflicts, &entity, method.name(), method.kind(), MethodKind::Derived);
            }
            bound.insert(method.name().to_string(), candidate);
        }

        let find_all = prepare(&metamodel, QueryPlan::select(entity.as_str()))?;
        let count_all = prepare(
            &metamodel,
            QueryPlan::select(entity.as_str()).with_action(Action::Count),
        )?;
        let delete_all = prepare(
            &metamodel,
            QueryPlan::select(entity.as_str()).with_action(Action::BulkDelete),
        )?;
        debug!(
            "event=repository_built module=repository entity={} methods={} conflicts={}",
            entity,
            bound.len(),
            conflicts.len()
        );

        Ok(Repository {
            metamodel,
            entity,
            methods: bound,
            conflicts,
            find_all,
            count_all,
            delete_all,
        })
    }
}

fn record_conflict(
    conflicts: &mut Vec<MethodConflict>,
    entity: &str,
    method: &str,
    kept: MethodKind,
    shadowed: MethodKind,
) {
    if conflicts.iter().any(|c| c.method == method) {
        return;
    }
    warn!(
        "event=method_conflict module=repository entity={} method={} kept={} shadowed={}",
        entity, method, kept, shadowed
    );
    conflicts.push(MethodConflict {
        method: method.to_string(),
        kept,
        shadowed,
    });
}

fn prepare(metamodel: &Arc<Metamodel>, plan: QueryPlan) -> Result<QueryExecutor> {
    Ok(QueryExecutor::new(PreparedPlan::prepare(plan, Arc::clone(metamodel))?))
}

/// Data access for one entity type.
pub struct Repository {
    metamodel: Arc<Metamodel>,
    entity: String,
    methods: HashMap<String, BoundMethod>,
    conflicts: Vec<MethodConflict>,
    find_all: QueryExecutor,
    count_all: QueryExecutor,
    delete_all: QueryExecutor,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        methods.sort_unstable();
        f.debug_struct("Repository")
            .field("entity", &self.entity)
            .field("methods", &methods)
            .field("conflicts", &self.conflicts.len())
            .finish()
    }
}

impl Repository {
    pub fn builder(metamodel: Arc<Metamodel>, entity: &str) -> RepositoryBuilder {
        RepositoryBuilder {
            metamodel,
            entity: entity.to_string(),
            methods: Vec::new(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Name conflicts resolved while building.
    pub fn conflicts(&self) -> &[MethodConflict] {
        &self.conflicts
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Which kind of query serves `name`.
    pub fn method_kind(&self, name: &str) -> Option<MethodKind> {
        self.methods.get(name).map(|m| m.kind)
    }

    // ---------------------------------------------------------------
    // Declared methods
    // ---------------------------------------------------------------

    pub fn list(&self, uow: &mut UnitOfWork, method: &str, args: &Arguments) -> Result<Vec<Record>> {
        self.list_sorted(uow, method, args, &Sort::unsorted())
    }

    /// Like `list`, with extra sort keys after the method's own.
    pub fn list_sorted(
        &self,
        uow: &mut UnitOfWork,
        method: &str,
        args: &Arguments,
        sort: &Sort,
    ) -> Result<Vec<Record>> {
        self.bound(method, ReturnShape::List)?
            .executor
            .list(uow, args, sort)
    }

    pub fn one(&self, uow: &mut UnitOfWork, method: &str, args: &Arguments) -> Result<Option<Record>> {
        self.bound(method, ReturnShape::One)?.executor.one(uow, args)
    }

    pub fn page(
        &self,
        uow: &mut UnitOfWork,
        method: &str,
        args: &Arguments,
        request: &PageRequest,
    ) -> Result<Page<Record>> {
        self.bound(method, ReturnShape::Page)?
            .executor
            .page(uow, args, request)
    }

    pub fn slice(
        &self,
        uow: &mut UnitOfWork,
        method: &str,
        args: &Arguments,
        request: &PageRequest,
    ) -> Result<Slice<Record>> {
        self.bound(method, ReturnShape::Slice)?
            .executor
            .slice(uow, args, request)
    }

    pub fn count_by(&self, uow: &mut UnitOfWork, method: &str, args: &Arguments) -> Result<u64> {
        self.bound(method, ReturnShape::Count)?.executor.count(uow, args)
    }

    pub fn exists_by(&self, uow: &mut UnitOfWork, method: &str, args: &Arguments) -> Result<bool> {
        self.bound(method, ReturnShape::Exists)?.executor.exists(uow, args)
    }

    /// Runs a delete or bulk method and returns the number of affected entities.
    pub fn execute(&self, uow: &mut UnitOfWork, method: &str, args: &Arguments) -> Result<u64> {
        self.bound(method, ReturnShape::Affected)?
            .executor
            .affected(uow, args)
    }

    fn bound(&self, name: &str, shape: ReturnShape) -> Result<&BoundMethod> {
        let method = self.methods.get(name).ok_or_else(|| {
            Error::invalid_operation(format!("{} repository has no method {}", self.entity, name))
        })?;
        if method.shape != shape {
            return Err(Error::invalid_operation(format!(
                "method {} returns {:?}, not {:?}",
                name, method.shape, shape
            )));
        }
        Ok(method)
    }

    // ---------------------------------------------------------------
    // CRUD
    // ---------------------------------------------------------------

    /// A new, unsaved entity.
    pub fn create(&self, uow: &UnitOfWork) -> Result<EntityRecord> {
        uow.create(&self.entity)
    }

    pub fn save(&self, uow: &mut UnitOfWork, record: EntityRecord) -> Result<EntityRecord> {
        self.check_entity(&record)?;
        uow.save(record)
    }

    pub fn save_all(
        &self,
        uow: &mut UnitOfWork,
        records: impl IntoIterator<Item = EntityRecord>,
    ) -> Result<Vec<EntityRecord>> {
        records
            .into_iter()
            .map(|record| self.save(uow, record))
            .collect()
    }

    pub fn find_by_id(&self, uow: &mut UnitOfWork, id: impl Into<Value>) -> Result<Option<EntityRecord>> {
        uow.find(&self.entity, &id.into())
    }

    pub fn exists_by_id(&self, uow: &mut UnitOfWork, id: impl Into<Value>) -> Result<bool> {
        Ok(self.find_by_id(uow, id)?.is_some())
    }

    pub fn find_all(&self, uow: &mut UnitOfWork) -> Result<Vec<EntityRecord>> {
        self.find_all_sorted(uow, &Sort::unsorted())
    }

    pub fn find_all_sorted(&self, uow: &mut UnitOfWork, sort: &Sort) -> Result<Vec<EntityRecord>> {
        entities(self.find_all.list(uow, &Arguments::new(), sort)?)
    }

    pub fn find_all_paged(&self, uow: &mut UnitOfWork, request: &PageRequest) -> Result<Page<EntityRecord>> {
        entity_page(self.find_all.page(uow, &Arguments::new(), request)?)
    }

    pub fn count(&self, uow: &mut UnitOfWork) -> Result<u64> {
        self.count_all.count(uow, &Arguments::new())
    }

    /// Schedules `record` for deletion. A missing entity is ignored.
    pub fn delete(&self, uow: &mut UnitOfWork, record: &EntityRecord) -> Result<()> {
        self.check_entity(record)?;
        uow.remove(&self.entity, record.identity())?;
        Ok(())
    }

    /// Returns false when no entity has this identity.
    pub fn delete_by_id(&self, uow: &mut UnitOfWork, id: impl Into<Value>) -> Result<bool> {
        uow.remove(&self.entity, &id.into())
    }

    /// Loads every entity and deletes them one by one.
    pub fn delete_all(&self, uow: &mut UnitOfWork) -> Result<u64> {
        let mut removed = 0;
        for record in self.find_all(uow)? {
            if uow.remove(&self.entity, record.identity())? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Deletes every row with a single bulk statement.
    pub fn delete_all_in_batch(&self, uow: &mut UnitOfWork) -> Result<u64> {
        self.delete_all.affected(uow, &Arguments::new())
    }

    fn check_entity(&self, record: &EntityRecord) -> Result<()> {
        if record.entity() != self.entity {
            return Err(Error::invalid_operation(format!(
                "{} repository cannot handle {}",
                self.entity,
                record.entity()
            )));
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Predicates
    // ---------------------------------------------------------------

    pub fn find_all_matching(
        &self,
        uow: &mut UnitOfWork,
        predicate: &Predicate,
        sort: &Sort,
    ) -> Result<Vec<EntityRecord>> {
        entities(self.matching(predicate, Action::Select)?.list(uow, &Arguments::new(), sort)?)
    }

    pub fn find_page_matching(
        &self,
        uow: &mut UnitOfWork,
        predicate: &Predicate,
        request: &PageRequest,
    ) -> Result<Page<EntityRecord>> {
        entity_page(
            self.matching(predicate, Action::Select)?
                .page(uow, &Arguments::new(), request)?,
        )
    }

    pub fn find_one_matching(
        &self,
        uow: &mut UnitOfWork,
        predicate: &Predicate,
    ) -> Result<Option<EntityRecord>> {
        self.matching(predicate, Action::Select)?
            .one(uow, &Arguments::new())?
            .map(Record::into_entity)
            .transpose()
    }

    pub fn count_matching(&self, uow: &mut UnitOfWork, predicate: &Predicate) -> Result<u64> {
        self.matching(predicate, Action::Count)?
            .count(uow, &Arguments::new())
    }

    pub fn exists_matching(&self, uow: &mut UnitOfWork, predicate: &Predicate) -> Result<bool> {
        self.matching(predicate, Action::Exists)?
            .exists(uow, &Arguments::new())
    }

    fn matching(&self, predicate: &Predicate, action: Action) -> Result<QueryExecutor> {
        let plan = QueryPlan::select(self.entity.as_str())
            .with_action(action)
            .with_filter(predicate.clone());
        prepare(&self.metamodel, plan)
    }

    // ---------------------------------------------------------------
    // Query by example
    // ---------------------------------------------------------------

    pub fn find_all_by_example(&self, uow: &mut UnitOfWork, example: &Example) -> Result<Vec<EntityRecord>> {
        let predicate = self.example_predicate(example)?;
        self.find_all_matching(uow, &predicate, &Sort::unsorted())
    }

    pub fn find_one_by_example(&self, uow: &mut UnitOfWork, example: &Example) -> Result<Option<EntityRecord>> {
        let predicate = self.example_predicate(example)?;
        self.find_one_matching(uow, &predicate)
    }

    pub fn count_by_example(&self, uow: &mut UnitOfWork, example: &Example) -> Result<u64> {
        let predicate = self.example_predicate(example)?;
        self.count_matching(uow, &predicate)
    }

    pub fn exists_by_example(&self, uow: &mut UnitOfWork, example: &Example) -> Result<bool> {
        let predicate = self.example_predicate(example)?;
        self.exists_matching(uow, &predicate)
    }

    fn example_predicate(&self, example: &Example) -> Result<Predicate> {
        self.check_entity(example.probe())?;
        example.to_predicate(&self.metamodel)
    }
}

fn entities(records: Vec<Record>) -> Result<Vec<EntityRecord>> {
    records.into_iter().map(Record::into_entity).collect()
}

fn entity_page(page: Page<Record>) -> Result<Page<EntityRecord>> {
    let request = page.request().clone();
    let total = page.total_elements();
    Ok(Page::new(entities(page.into_content())?, request, total))
}
