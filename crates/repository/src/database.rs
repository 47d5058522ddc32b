//! Database - the entry point tying metamodel, storage and configuration.

use crate::audit::AuditingInterceptor;
use crate::config::RepositoryConfig;
use crate::unit_of_work::UnitOfWork;
use log::debug;
use quarry_core::schema::Metamodel;
use quarry_core::Result;
use quarry_storage::Storage;
use std::sync::Arc;

/// Shared handle to one storage engine and the entity model it holds.
///
/// Cloning is cheap; every clone opens units of work against the same
/// storage.
#[derive(Clone)]
pub struct Database {
    metamodel: Arc<Metamodel>,
    storage: Arc<dyn Storage>,
    config: Arc<RepositoryConfig>,
    auditing: Option<Arc<AuditingInterceptor>>,
}

impl Database {
    pub fn new(metamodel: Arc<Metamodel>, storage: Arc<dyn Storage>) -> Self {
        Self {
            metamodel,
            storage,
            config: Arc::new(RepositoryConfig::default()),
            auditing: None,
        }
    }

    pub fn with_config(mut self, config: RepositoryConfig) -> Result<Self> {
        config.validate()?;
        self.config = Arc::new(config);
        Ok(self)
    }

    /// Enables auditing for every entity that declares audit capabilities.
    pub fn with_auditing(mut self, interceptor: AuditingInterceptor) -> Self {
        self.auditing = Some(Arc::new(interceptor));
        self
    }

    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Opens a unit of work backed by a fresh storage transaction.
    pub fn begin(&self) -> Result<UnitOfWork> {
        let tx = self.storage.begin()?;
        debug!("event=unit_of_work_opened module=database tx={}", tx);
        Ok(UnitOfWork::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.metamodel),
            Arc::clone(&self.config),
            self.auditing.clone(),
            tx,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::schema::{EntityModelBuilder, IdStrategy};
    use quarry_core::{DataType, Error};
    use quarry_storage::MemoryStorage;

    fn database() -> Database {
        let member = EntityModelBuilder::new("Member")
            .unwrap()
            .id("id", DataType::Int64, IdStrategy::Generated)
            .unwrap()
            .attribute("username", DataType::String)
            .unwrap()
            .build()
            .unwrap();
        let metamodel = Arc::new(Metamodel::builder().entity(member).build().unwrap());
        let storage = Arc::new(MemoryStorage::new(&metamodel));
        Database::new(metamodel, storage)
    }

    #[test]
    fn test_with_config_validates() {
        let bad = RepositoryConfig {
            lock_timeout_ms: 0,
            ..RepositoryConfig::default()
        };
        assert!(matches!(database().with_config(bad), Err(Error::InvalidOperation { .. })));
    }

    #[test]
    fn test_units_of_work_share_storage() {
        let db = database();
        let mut uow = db.begin().unwrap();
        let mut member = uow.create("Member").unwrap();
        member.set("username", "member1").unwrap();
        let saved = uow.save(member).unwrap();
        uow.commit().unwrap();

        let mut other = db.clone().begin().unwrap();
        let found = other.find("Member", saved.identity()).unwrap();
        assert_eq!(found.and_then(|m| m.get_str("username").map(String::from)), Some("member1".into()));
        other.rollback().unwrap();
    }
}
