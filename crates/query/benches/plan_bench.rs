//! Benchmarks for plan construction and binding.
//!
//! Descriptor parsing and preparation happen once per repository method;
//! binding happens on every call, so it is measured separately.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quarry_core::schema::{EntityModelBuilder, IdStrategy, Metamodel};
use quarry_core::{DataType, Row, Value};
use quarry_query::descriptor::MethodDescriptor;
use quarry_query::executor::sort_rows;
use quarry_query::planner::{Arguments, PreparedPlan};
use quarry_query::statement::ResultRow;
use quarry_query::text::parse_query;
use quarry_query::Sort;
use std::sync::Arc;

fn metamodel() -> Arc<Metamodel> {
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
    Arc::new(Metamodel::builder().entity(team).entity(member).build().unwrap())
}

/// Simple LCG for reproducible shuffled input.
fn shuffled_rows(count: usize) -> Vec<ResultRow> {
    let mut seed = 12345u64;
    (0..count)
        .map(|i| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            ResultRow::new(Row::new(vec![
                Value::Int64(i as i64),
                Value::String(format!("member{}", seed % 10_000)),
                Value::Int32((seed % 100) as i32),
                Value::Null,
            ]))
        })
        .collect()
}

fn bench_descriptor(c: &mut Criterion) {
    let mm = metamodel();
    let mut group = c.benchmark_group("descriptor");
    group.bench_function("parse", |b| {
        b.iter(|| {
            MethodDescriptor::parse(black_box(
                "findTop3DistinctByUsernameAndAgeGreaterThanOrTeamNameOrderByAgeDesc",
            ))
        })
    });
    group.bench_function("parse_and_prepare", |b| {
        b.iter(|| {
            let plan = MethodDescriptor::parse(black_box("findByTeamNameAndAgeBetween"))
                .and_then(|d| d.to_plan(&mm, "Member"))
                .unwrap();
            PreparedPlan::prepare(plan, mm.clone()).unwrap()
        })
    });
    group.finish();
}

fn bench_text(c: &mut Criterion) {
    c.bench_function("text/parse", |b| {
        b.iter(|| {
            parse_query(black_box(
                "select m from Member m left join fetch m.team t \
                 where m.age >= :age and (t.name = :team or t.name is null) \
                 order by m.username desc",
            ))
        })
    });
}

fn bench_bind(c: &mut Criterion) {
    let mm = metamodel();
    let plan = MethodDescriptor::parse("findByUsernameInAndAgeGreaterThan")
        .and_then(|d| d.to_plan(&mm, "Member"))
        .unwrap();
    let prepared = PreparedPlan::prepare(plan, mm).unwrap();
    let names: Vec<String> = (0..50).map(|i| format!("member{}", i)).collect();
    let args = Arguments::new().push_many(names).push(20);
    let sort = Sort::by(&["username"]).descending();

    c.bench_function("bind/select", |b| {
        b.iter(|| prepared.bind_select(black_box(&args), 20, Some(10), &sort).unwrap())
    });

    let select = prepared.bind_select(&args, 0, None, &sort).unwrap();
    let rows = shuffled_rows(10_000);
    c.bench_function("evaluate/filter_sort_10k", |b| {
        b.iter_batched(
            || rows.clone(),
            |rows| {
                let mut matched: Vec<ResultRow> =
                    rows.into_iter().filter(|r| select.filter.matches(r)).collect();
                sort_rows(&mut matched, &select.order);
                matched
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_descriptor, bench_text, bench_bind);
criterion_main!(benches);
