//! Shared fixtures for unit tests.

use quarry_core::schema::{EntityModelBuilder, IdStrategy, Metamodel};
use quarry_core::DataType;

/// `Member(id, username, age, team)` and `Team(id, name)`.
pub(crate) fn metamodel() -> Metamodel {
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
        .build()
        .unwrap();
    Metamodel::builder().entity(team).entity(member).build().unwrap()
}
