//! Result ordering.

use super::filter::cmp;
use crate::statement::{OrderKey, ResultRow};
use core::cmp::Ordering;
use quarry_core::Value;

static NULL: Value = Value::Null;

/// Sorts rows by the keys in priority order. Nulls sort first ascending.
pub fn sort_rows(rows: &mut [ResultRow], order: &[OrderKey]) {
    if order.is_empty() {
        return;
    }
    rows.sort_by(|a, b| compare_rows(a, b, order));
}

/// Compares two rows by the given keys.
pub fn compare_rows(a: &ResultRow, b: &ResultRow, order: &[OrderKey]) -> Ordering {
    for key in order {
        let a_val = a.value(&key.column).unwrap_or(&NULL);
        let b_val = b.value(&key.column).unwrap_or(&NULL);
        let ord = cmp(a_val, b_val, key.ignore_case);
        if ord != Ordering::Equal {
            return if key.direction.is_descending() {
                ord.reverse()
            } else {
                ord
            };
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::Direction;
    use crate::statement::ColumnRef;
    use alloc::vec;
    use alloc::vec::Vec;
    use quarry_core::Row;

    fn rows(values: &[(&str, i32)]) -> Vec<ResultRow> {
        values
            .iter()
            .map(|(name, age)| ResultRow::new(Row::new(vec![Value::from(*name), Value::Int32(*age)])))
            .collect()
    }

    fn key(position: usize, direction: Direction) -> OrderKey {
        OrderKey {
            column: ColumnRef::root(position),
            direction,
            ignore_case: false,
        }
    }

    fn names(rows: &[ResultRow]) -> Vec<&str> {
        rows.iter().map(|r| r.row.get(0).and_then(Value::as_str).unwrap_or("")).collect()
    }

    #[test]
    fn test_sort_desc() {
        let mut data = rows(&[("member1", 10), ("member3", 30), ("member2", 20)]);
        sort_rows(&mut data, &[key(0, Direction::Desc)]);
        assert_eq!(names(&data), vec!["member3", "member2", "member1"]);
    }

    #[test]
    fn test_sort_multi_key() {
        let mut data = rows(&[("b", 1), ("a", 1), ("c", 0)]);
        sort_rows(&mut data, &[key(1, Direction::Asc), key(0, Direction::Asc)]);
        assert_eq!(names(&data), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_sort_ignore_case() {
        let mut data = rows(&[("b", 0), ("A", 0), ("a", 0)]);
        let mut k = key(0, Direction::Asc);
        k.ignore_case = true;
        sort_rows(&mut data, &[k]);
        // Stable sort keeps "A" before "a".
        assert_eq!(names(&data), vec!["A", "a", "b"]);
    }

    #[test]
    fn test_missing_join_sorts_first() {
        let mut data = vec![
            ResultRow {
                row: Row::new(vec![Value::from("x")]),
                joined: vec![Some(Row::new(vec![Value::from("teamB")]))],
            },
            ResultRow {
                row: Row::new(vec![Value::from("y")]),
                joined: vec![None],
            },
        ];
        let k = OrderKey {
            column: ColumnRef::joined(0, 0),
            direction: Direction::Asc,
            ignore_case: false,
        };
        sort_rows(&mut data, &[k]);
        assert_eq!(names(&data), vec!["y", "x"]);
    }
}
