//! Attribute values, query arguments and projected fields share one type.

use crate::types::DataType;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

/// A value held by an entity attribute.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    Bytes(Vec<u8>),
}

macro_rules! accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Option<$ty> {
            match self {
                Value::$variant(v) => Some(*v),
                _ => None,
            }
        }
    };
}

impl Value {
    /// The attribute type this value fits; `None` for null.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int32(_) => Some(DataType::Int32),
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::String(_) => Some(DataType::String),
            Value::DateTime(_) => Some(DataType::DateTime),
            Value::Bytes(_) => Some(DataType::Bytes),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    accessor!(as_bool, Boolean, bool);
    accessor!(as_i32, Int32, i32);
    accessor!(as_i64, Int64, i64);

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// The value a fresh, non-nullable attribute starts with.
    pub fn default_for_type(dt: DataType) -> Self {
        match dt {
            DataType::Boolean => Value::Boolean(false),
            DataType::Int32 => Value::Int32(0),
            DataType::Int64 => Value::Int64(0),
            DataType::Float64 => Value::Float64(0.0),
            DataType::String => Value::String(String::new()),
            DataType::DateTime => Value::DateTime(0),
            DataType::Bytes => Value::Null,
        }
    }

    /// Returns true if this value is the "unset" marker for an identity:
    /// null, numeric zero or the empty string.
    pub fn is_default_identity(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Int32(v) => *v == 0,
            Value::Int64(v) => *v == 0,
            Value::String(v) => v.is_empty(),
            _ => false,
        }
    }

    /// Converts this value to the given data type when the conversion is lossless.
    ///
    /// Null converts to every type. Integers widen and narrow when in range,
    /// integers convert to floats, and Int64 converts to DateTime.
    pub fn coerce_to(&self, target: DataType) -> Option<Value> {
        match (self, target) {
            (Value::Null, _) => Some(Value::Null),
            (v, t) if v.data_type() == Some(t) => Some(v.clone()),
            (Value::Int32(v), DataType::Int64) => Some(Value::Int64(*v as i64)),
            (Value::Int32(v), DataType::Float64) => Some(Value::Float64(*v as f64)),
            (Value::Int64(v), DataType::Int32) => i32::try_from(*v).ok().map(Value::Int32),
            (Value::Int64(v), DataType::Float64) => Some(Value::Float64(*v as f64)),
            (Value::Int64(v), DataType::DateTime) => Some(Value::DateTime(*v)),
            (Value::Int32(v), DataType::DateTime) => Some(Value::DateTime(*v as i64)),
            _ => None,
        }
    }

    /// Adds two numeric values, keeping the type of `self`.
    ///
    /// Returns None for non-numeric operands and on integer overflow.
    pub fn checked_add(&self, other: &Value) -> Option<Value> {
        self.arith(other, i64::checked_add, |a, b| a + b)
    }

    /// Subtracts two numeric values, keeping the type of `self`.
    pub fn checked_sub(&self, other: &Value) -> Option<Value> {
        self.arith(other, i64::checked_sub, |a, b| a - b)
    }

    fn arith(
        &self,
        other: &Value,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Option<Value> {
        let rhs_int = match other {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        };
        match self {
            Value::Null => Some(Value::Null),
            Value::Int32(a) => {
                let result = int_op(*a as i64, rhs_int?)?;
                i32::try_from(result).ok().map(Value::Int32)
            }
            Value::Int64(a) => int_op(*a, rhs_int?).map(Value::Int64),
            Value::Float64(a) => {
                let b = match other {
                    Value::Float64(b) => *b,
                    _ => rhs_int? as f64,
                };
                Some(Value::Float64(float_op(*a, b)))
            }
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => (a.is_nan() && b.is_nan()) || a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int32(i) => i.hash(state),
            Value::Int64(i) => i.hash(state),
            Value::Float64(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::Bytes(b) => b.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            // numeric types compare by value
            (Value::Int32(a), Value::Int64(b)) => (*a as i64).cmp(b),
            (Value::Int64(a), Value::Int32(b)) => a.cmp(&(*b as i64)),
            (Value::Int32(a), Value::Float64(b)) => cmp_float(*a as f64, *b),
            (Value::Float64(a), Value::Int32(b)) => cmp_float(*a, *b as f64),
            (Value::Int64(a), Value::Float64(b)) => cmp_float(*a as f64, *b),
            (Value::Float64(a), Value::Int64(b)) => cmp_float(*a, *b as f64),
            (Value::Float64(a), Value::Float64(b)) => cmp_float(*a, *b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Compares floats treating NaN as greater than every other value.
fn cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl Value {
    /// Orders unrelated types: null first, bytes last.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int32(_) => 2,
            Value::Int64(_) => 3,
            Value::Float64(_) => 4,
            Value::String(_) => 5,
            Value::DateTime(_) => 6,
            Value::Bytes(_) => 7,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "'{}'", v),
            Value::DateTime(v) => write!(f, "@{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

macro_rules! from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

from_scalar! {
    bool => Boolean,
    i32 => Int32,
    i64 => Int64,
    f64 => Float64,
    String => String,
    Vec<u8> => Bytes,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// `None` binds as null.
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_null_has_no_type() {
        assert_eq!(Value::Null.data_type(), None);
        assert_eq!(Value::from(3i64).data_type(), Some(DataType::Int64));
        assert!(Value::from(None::<i32>).is_null());
    }

    #[test]
    fn test_cross_type_ordering() {
        assert!(Value::Int32(1) < Value::Int64(2));
        assert!(Value::Int64(3) > Value::Float64(2.5));
        assert!(Value::Null < Value::Boolean(false));
        assert_eq!(Value::Float64(f64::NAN), Value::Float64(f64::NAN));
    }

    #[test]
    fn test_default_identity() {
        assert!(Value::Null.is_default_identity());
        assert!(Value::Int64(0).is_default_identity());
        assert!(Value::String(String::new()).is_default_identity());
        assert!(!Value::Int64(7).is_default_identity());
        assert!(!Value::from("A").is_default_identity());
    }

    #[test]
    fn test_coerce_to() {
        assert_eq!(Value::Int32(5).coerce_to(DataType::Int64), Some(Value::Int64(5)));
        assert_eq!(Value::Int64(5).coerce_to(DataType::Int32), Some(Value::Int32(5)));
        assert_eq!(Value::Int64(i64::MAX).coerce_to(DataType::Int32), None);
        assert_eq!(Value::Null.coerce_to(DataType::String), Some(Value::Null));
        assert_eq!(Value::from("x").coerce_to(DataType::Int32), None);
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(Value::Int32(40).checked_add(&Value::Int32(1)), Some(Value::Int32(41)));
        assert_eq!(Value::Int64(40).checked_sub(&Value::Int32(1)), Some(Value::Int64(39)));
        assert_eq!(Value::Int32(i32::MAX).checked_add(&Value::Int32(1)), None);
        assert_eq!(Value::Float64(1.5).checked_add(&Value::Int32(1)), Some(Value::Float64(2.5)));
        assert_eq!(Value::from("a").checked_add(&Value::Int32(1)), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Value::Int64(3)), "3");
        assert_eq!(format!("{}", Value::from("A")), "'A'");
        assert_eq!(format!("{}", Value::Null), "null");
        assert_eq!(format!("{}", Value::DateTime(5)), "@5");
    }
}
