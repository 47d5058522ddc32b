//! Shared fixtures: a Team/Member/Item metamodel over the memory engine.

#![allow(dead_code)]

use quarry_core::schema::{AuditCapabilities, EntityModelBuilder, IdStrategy, Metamodel};
use quarry_core::DataType;
use quarry_repository::{Database, EntityRecord, Method, Repository, RepositoryConfig, ReturnShape, UnitOfWork};
use quarry_storage::MemoryStorage;
use std::sync::Arc;

pub fn metamodel() -> Arc<Metamodel> {
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
    let item = EntityModelBuilder::new("Item")
        .unwrap()
        .id("id", DataType::String, IdStrategy::Assigned)
        .unwrap()
        .attribute("name", DataType::String)
        .unwrap()
        .auditing(AuditCapabilities::timestamps())
        .build()
        .unwrap();
    Arc::new(
        Metamodel::builder()
            .entity(team)
            .entity(member)
            .entity(item)
            .build()
            .unwrap(),
    )
}

pub struct Fixture {
    pub metamodel: Arc<Metamodel>,
    pub storage: Arc<MemoryStorage>,
    pub db: Database,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(RepositoryConfig::default())
    }

    pub fn with_config(config: RepositoryConfig) -> Self {
        let metamodel = metamodel();
        let storage = Arc::new(MemoryStorage::new(&metamodel));
        let db = Database::new(metamodel.clone(), storage.clone())
            .with_config(config)
            .unwrap();
        Self {
            metamodel,
            storage,
            db,
        }
    }

    pub fn members(&self) -> Repository {
        Repository::builder(self.metamodel.clone(), "Member")
            .methods(member_methods())
            .build()
            .unwrap()
    }

    pub fn teams(&self) -> Repository {
        Repository::builder(self.metamodel.clone(), "Team").build().unwrap()
    }

    pub fn items(&self) -> Repository {
        Repository::builder(self.metamodel.clone(), "Item").build().unwrap()
    }

    /// Saves members with the given names and ages and commits.
    pub fn seed(&self, members: &[(&str, i32)]) -> Vec<EntityRecord> {
        let repo = self.members();
        let mut uow = self.db.begin().unwrap();
        let saved = members
            .iter()
            .map(|(name, age)| save_member(&repo, &mut uow, name, *age, None))
            .collect();
        uow.commit().unwrap();
        saved
    }
}

pub fn member_methods() -> Vec<Method> {
    vec![
        Method::derived("findByUsername"),
        Method::derived("findByUsernameAndAgeGreaterThan"),
        Method::derived("findByAge").returning(ReturnShape::Page),
        Method::derived("findSliceByAge").returning(ReturnShape::Slice),
        Method::derived("findOneByUsername").returning(ReturnShape::One),
        Method::derived("findTop3ByOrderByAgeDesc"),
        Method::derived("countByAge"),
        Method::derived("existsByUsername"),
        Method::derived("deleteByUsername"),
        Method::query("usernames", "select m.username from Member m order by m.username"),
        Method::query(
            "teamMembers",
            "select m from Member m join m.team t where t.name = :name",
        ),
        Method::modifying(
            "bulkAgePlus",
            "update Member m set m.age = m.age + 1 where m.age >= :age",
        ),
    ]
}

pub fn save_member(
    repo: &Repository,
    uow: &mut UnitOfWork,
    username: &str,
    age: i32,
    team: Option<&EntityRecord>,
) -> EntityRecord {
    let mut member = repo
        .create(uow)
        .unwrap()
        .with("username", username)
        .unwrap()
        .with("age", age)
        .unwrap();
    if let Some(team) = team {
        member.set_related("team", team).unwrap();
    }
    repo.save(uow, member).unwrap()
}

pub fn save_team(repo: &Repository, uow: &mut UnitOfWork, name: &str) -> EntityRecord {
    let team = repo.create(uow).unwrap().with("name", name).unwrap();
    repo.save(uow, team).unwrap()
}

pub fn usernames(records: &[quarry_repository::Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.as_entity())
        .filter_map(|e| e.get_str("username").map(str::to_string))
        .collect()
}
