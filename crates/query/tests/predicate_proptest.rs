//! Property-based tests for predicate composition and page windows.

use proptest::prelude::*;
use quarry_core::schema::{EntityModelBuilder, IdStrategy, Metamodel};
use quarry_core::{DataType, Row, Value};
use quarry_query::executor::sort_rows;
use quarry_query::planner::{Arguments, PreparedPlan, QueryPlan};
use quarry_query::statement::ResultRow;
use quarry_query::{Page, PageRequest, Predicate, Sort};
use std::sync::Arc;

fn leaf_strategy() -> impl Strategy<Value = Predicate> {
    prop_oneof![
        (0i32..100).prop_map(|v| Predicate::eq("age", v)),
        (0i32..100).prop_map(|v| Predicate::gt("age", v)),
        "[a-z]{1,6}".prop_map(|s| Predicate::starts_with("username", s)),
        Just(Predicate::is_null("team")),
        Just(Predicate::no_op()),
    ]
}

fn predicate_strategy() -> impl Strategy<Value = Predicate> {
    leaf_strategy().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.and(&b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.or(&b)),
            inner.prop_map(|p| p.negate()),
        ]
    })
}

fn metamodel() -> Arc<Metamodel> {
    let member = EntityModelBuilder::new("Member")
        .unwrap()
        .id("id", DataType::Int64, IdStrategy::Generated)
        .unwrap()
        .attribute("username", DataType::String)
        .unwrap()
        .attribute("age", DataType::Int32)
        .unwrap()
        .build()
        .unwrap();
    Arc::new(Metamodel::builder().entity(member).build().unwrap())
}

fn member_rows(n: usize) -> Vec<ResultRow> {
    (0..n)
        .map(|i| {
            ResultRow::new(Row::new(vec![
                Value::Int64(i as i64 + 1),
                Value::String(format!("member{}", i)),
                Value::Int32((i * 7 % 13) as i32),
            ]))
        })
        .collect()
}

/// Evaluates a select over in-memory rows the way a storage engine does.
fn fetch(prepared: &PreparedPlan, rows: &[ResultRow], request: &PageRequest) -> Page<ResultRow> {
    let select = prepared
        .bind_select(
            &Arguments::new(),
            request.offset(),
            Some(request.page_size()),
            request.sort(),
        )
        .unwrap();
    let mut matched: Vec<ResultRow> = rows
        .iter()
        .filter(|r| select.filter.matches(r))
        .cloned()
        .collect();
    let total = matched.len() as u64;
    sort_rows(&mut matched, &select.order);
    let content = matched
        .into_iter()
        .skip(select.offset)
        .take(select.limit.unwrap_or(usize::MAX))
        .collect();
    Page::new(content, request.clone(), total)
}

proptest! {
    #[test]
    fn no_op_absorption(p in predicate_strategy(), q in predicate_strategy()) {
        let noop = Predicate::no_op();
        prop_assert_eq!(p.and(&q).and(&noop), p.and(&q));
        prop_assert_eq!(noop.and(&p.and(&q)), p.and(&q));
        prop_assert_eq!(p.or(&q).or(&noop), p.or(&q));
        prop_assert_eq!(noop.or(&p.or(&q)), p.or(&q));
    }

    #[test]
    fn composition_leaves_operands_untouched(p in predicate_strategy(), q in predicate_strategy()) {
        let before = (p.to_string(), q.to_string());
        let _ = p.and(&q).or(&p.negate());
        prop_assert_eq!((p.to_string(), q.to_string()), before);
    }

    #[test]
    fn double_negation(p in predicate_strategy()) {
        prop_assert_eq!(p.negate().negate(), p);
    }

    #[test]
    fn pages_partition_rows(n in 0usize..60, k in 1usize..12) {
        let prepared = PreparedPlan::prepare(QueryPlan::select("Member"), metamodel()).unwrap();
        let rows = member_rows(n);
        let sort = Sort::by(&["username"]).descending();

        let first = fetch(&prepared, &rows, &PageRequest::of_sorted(0, k, sort.clone()));
        let total_pages = first.total_pages();
        prop_assert_eq!(total_pages, n.div_ceil(k));

        let mut seen = 0;
        for index in 0..total_pages {
            let page = fetch(&prepared, &rows, &PageRequest::of_sorted(index, k, sort.clone()));
            prop_assert!(page.content().len() <= k);
            prop_assert_eq!(page.total_elements(), n as u64);
            prop_assert_eq!(page.is_last(), index + 1 == total_pages);
            seen += page.content().len();
        }
        prop_assert_eq!(seen, n);
    }
}
