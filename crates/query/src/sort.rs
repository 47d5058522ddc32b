//! Sort specifications.

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn is_descending(self) -> bool {
        self == Direction::Desc
    }

    /// Parses `asc`/`desc` in any letter case.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Some(Direction::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Some(Direction::Desc)
        } else {
            None
        }
    }
}

/// One sort key: an attribute path and a direction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub property: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub ignore_case: bool,
}

impl Order {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Asc,
            ignore_case: false,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Desc,
            ignore_case: false,
        }
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

/// An ordered sequence of sort keys, evaluated in priority order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    /// Sorts ascending by each property in turn.
    pub fn by(properties: &[&str]) -> Self {
        Self {
            orders: properties.iter().map(|p| Order::asc(*p)).collect(),
        }
    }

    pub fn by_orders(orders: Vec<Order>) -> Self {
        Self { orders }
    }

    /// Returns a copy with every key descending.
    pub fn descending(&self) -> Self {
        self.with_direction(Direction::Desc)
    }

    /// Returns a copy with every key ascending.
    pub fn ascending(&self) -> Self {
        self.with_direction(Direction::Asc)
    }

    fn with_direction(&self, direction: Direction) -> Self {
        Self {
            orders: self
                .orders
                .iter()
                .map(|o| Order {
                    direction,
                    ..o.clone()
                })
                .collect(),
        }
    }

    /// Appends the keys of `other` after this sort's keys.
    pub fn and(&self, other: &Sort) -> Self {
        let mut orders = self.orders.clone();
        orders.extend(other.orders.iter().cloned());
        Self { orders }
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }
}
