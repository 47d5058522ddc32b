//! Runs prepared plans inside a unit of work.
//!
//! Entity results are merged into the working set; projections are mapped
//! straight from the result rows and never become managed. Bulk writes go
//! to storage directly, after which the working set is invalidated.

use crate::record::Record;
use crate::unit_of_work::UnitOfWork;
use log::debug;
use quarry_core::{Error, Result};
use quarry_query::planner::Action;
use quarry_query::statement::{Outcome, ResultRow, Select, Statement};
use quarry_query::{Arguments, Page, PageRequest, PreparedPlan, Slice, Sort};

/// A prepared plan, plus the plan used for page totals when it differs.
#[derive(Clone, Debug)]
pub struct QueryExecutor {
    plan: PreparedPlan,
    count_plan: Option<PreparedPlan>,
}

impl QueryExecutor {
    pub fn new(plan: PreparedPlan) -> Self {
        Self {
            plan,
            count_plan: None,
        }
    }

    /// Uses `count_plan` instead of the derived count for page totals.
    pub fn with_count_plan(mut self, count_plan: PreparedPlan) -> Self {
        self.count_plan = Some(count_plan);
        self
    }

    pub fn plan(&self) -> &PreparedPlan {
        &self.plan
    }

    pub fn list(&self, uow: &mut UnitOfWork, args: &Arguments, sort: &Sort) -> Result<Vec<Record>> {
        self.fetch(uow, args, 0, None, sort)
    }

    /// At most one result. More than one match fails with the actual count.
    pub fn one(&self, uow: &mut UnitOfWork, args: &Arguments) -> Result<Option<Record>> {
        let mut records = self.fetch(uow, args, 0, None, &Sort::unsorted())?;
        match records.len() {
            0 => Ok(None),
            1 => Ok(records.pop()),
            actual => Err(Error::non_unique(actual)),
        }
    }

    /// One page plus the total element count.
    pub fn page(
        &self,
        uow: &mut UnitOfWork,
        args: &Arguments,
        request: &PageRequest,
    ) -> Result<Page<Record>> {
        let request = normalize(uow, request);
        let size = request.page_size();
        let offset = request.offset();
        let content = self.fetch(uow, args, offset, Some(size), request.sort())?;

        let total = match total_from_content(offset, content.len(), size) {
            Some(total) => total,
            None => {
                let counted = self.total(uow, args)?;
                match self.plan.plan().limit {
                    Some(cap) => counted.min(cap as u64),
                    None => counted,
                }
            }
        };
        Ok(Page::new(content, request, total))
    }

    /// One slice, found by reading a single row past the slice size.
    pub fn slice(
        &self,
        uow: &mut UnitOfWork,
        args: &Arguments,
        request: &PageRequest,
    ) -> Result<Slice<Record>> {
        let request = normalize(uow, request);
        let size = request.page_size();
        let mut content = self.fetch(
            uow,
            args,
            request.offset(),
            Some(size.saturating_add(1)),
            request.sort(),
        )?;
        let has_next = content.len() > size;
        content.truncate(size);
        Ok(Slice::new(content, request, has_next))
    }

    pub fn count(&self, uow: &mut UnitOfWork, args: &Arguments) -> Result<u64> {
        uow.prepare_for_query()?;
        let count = self.plan.bind_count(args)?;
        match uow.execute(&Statement::Count(count))? {
            Outcome::Count(n) => Ok(match self.plan.plan().limit {
                Some(cap) => n.min(cap as u64),
                None => n,
            }),
            other => Err(unexpected(&other)),
        }
    }

    pub fn exists(&self, uow: &mut UnitOfWork, args: &Arguments) -> Result<bool> {
        uow.prepare_for_query()?;
        let mut select = self.plan.bind_select(args, 0, Some(1), &Sort::unsorted())?;
        select.columns = Some(vec![self.id_position()?]);
        Ok(!self.rows(uow, select)?.is_empty())
    }

    /// Runs a write query and returns the number of affected entities.
    pub fn affected(&self, uow: &mut UnitOfWork, args: &Arguments) -> Result<u64> {
        match &self.plan.plan().action {
            Action::BulkUpdate(_) | Action::BulkDelete => {
                uow.prepare_for_query()?;
                let statement = self.plan.bind_bulk(args)?;
                let outcome = uow.execute(&statement)?;
                let Outcome::Affected { count, identities } = outcome else {
                    return Err(unexpected(&outcome));
                };
                debug!(
                    "event=bulk_write module=executor kind={} entity={} affected={}",
                    statement.kind(),
                    self.plan.entity(),
                    count
                );
                uow.invalidate_after_bulk(self.plan.entity(), &identities)?;
                Ok(count)
            }
            Action::Delete => {
                let records = self.fetch(uow, args, 0, None, &Sort::unsorted())?;
                let mut removed = 0;
                for record in records {
                    let record = record.into_entity()?;
                    if uow.remove(record.entity(), record.identity())? {
                        removed += 1;
                    }
                }
                Ok(removed)
            }
            other => Err(Error::invalid_operation(format!(
                "{:?} query on {} does not modify data",
                other,
                self.plan.entity()
            ))),
        }
    }

    fn total(&self, uow: &mut UnitOfWork, args: &Arguments) -> Result<u64> {
        let plan = self.count_plan.as_ref().unwrap_or(&self.plan);
        let count = plan.bind_count(args)?;
        match uow.execute(&Statement::Count(count))? {
            Outcome::Count(n) => Ok(n),
            other => Err(unexpected(&other)),
        }
    }

    fn fetch(
        &self,
        uow: &mut UnitOfWork,
        args: &Arguments,
        offset: usize,
        limit: Option<usize>,
        sort: &Sort,
    ) -> Result<Vec<Record>> {
        uow.prepare_for_query()?;
        let plan = self.plan.plan();
        let mut select = self.plan.bind_select(args, offset, limit, sort)?;
        uow.locks().apply(&mut select, plan.lock);
        let verify = uow.locks().verifies(plan.lock);
        let mapper = self.plan.mapper(&select)?;
        let joins = select.joins.clone();
        let rows = self.rows(uow, select)?;
        debug!(
            "event=query_executed module=executor entity={} rows={}",
            self.plan.entity(),
            rows.len()
        );

        rows.into_iter()
            .map(|row| match &mapper {
                Some(mapper) => mapper.map(&row).map(Record::from),
                None => uow
                    .merge(self.plan.entity(), row, &joins, plan.read_only, verify)
                    .map(Record::Entity),
            })
            .collect()
    }

    fn rows(&self, uow: &mut UnitOfWork, select: Select) -> Result<Vec<ResultRow>> {
        match uow.execute(&Statement::Select(select))? {
            Outcome::Rows(rows) => Ok(rows),
            other => Err(unexpected(&other)),
        }
    }

    fn id_position(&self) -> Result<usize> {
        Ok(self.plan.metamodel().entity(self.plan.entity())?.id_position())
    }
}

/// Returns the total when a short page already determines it.
///
/// An empty page past the first says nothing about where the rows end, so
/// it still needs the count.
fn total_from_content(offset: usize, len: usize, size: usize) -> Option<u64> {
    ((offset == 0 || len > 0) && len < size).then(|| (offset + len) as u64)
}

fn normalize(uow: &UnitOfWork, request: &PageRequest) -> PageRequest {
    let size = uow.config().page_size(request.page_size());
    request.with_size(size)
}

fn unexpected(outcome: &Outcome) -> Error {
    Error::storage(format!("unexpected {} outcome", outcome.kind()))
}
