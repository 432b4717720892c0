//! Dynamic value type and key ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A stored record: column name to value.
pub type Record = BTreeMap<String, Value>;

/// A dynamic value stored in a record column.
///
/// Values carry a total order (see [`Ord`]) that is used for primary keys,
/// index keys and key ranges. Only some variants are valid *keys*
/// ([`Value::is_valid_key`]); the remaining ones can be stored but are
/// never indexed.
///
/// Integers and floats are both *numbers* and compare by numeric value, so
/// `Integer(2)` and `Float(2.0)` are the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Double-precision float. NaN is stored but is never a key.
    Float(f64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Array of values. Composite keys are arrays.
    Array(Vec<Value>),
    /// Nested map with text keys.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Rank of the variant in the key order.
    ///
    /// Non-key variants sort before every key so that the order stays total.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Map(_) => 2,
            Value::Integer(_) | Value::Float(_) => 3,
            Value::Text(_) => 4,
            Value::Bytes(_) => 5,
            Value::Array(_) => 6,
        }
    }

    /// Returns true if this value may be used as a primary or index key.
    ///
    /// Integers, non-NaN floats, text, byte strings and arrays made only of
    /// valid keys qualify; null, booleans, NaN and maps do not.
    pub fn is_valid_key(&self) -> bool {
        match self {
            Value::Integer(_) | Value::Text(_) | Value::Bytes(_) => true,
            Value::Float(n) => !n.is_nan(),
            Value::Array(items) => items.iter().all(Value::is_valid_key),
            Value::Null | Value::Bool(_) | Value::Map(_) => false,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this is a text value containing `needle`.
    ///
    /// Matching is case-sensitive. Non-text values never match.
    pub fn contains_text(&self, needle: &str) -> bool {
        match self {
            Value::Text(s) => s.contains(needle),
            _ => false,
        }
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, if it is a number.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Look up a key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(key),
            _ => None,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => cmp_floats(*a, *b),
            (Value::Integer(a), Value::Float(b)) => cmp_integer_float(*a, *b),
            (Value::Float(a), Value::Integer(b)) => cmp_integer_float(*b, *a).reverse(),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

/// Numeric order; `-0.0 == 0.0`, NaN sorts after (or, negative, before) every number.
fn cmp_floats(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or_else(|| a.total_cmp(&b))
}

/// Exact comparison of an integer with a float, without rounding the integer.
fn cmp_integer_float(a: i64, b: f64) -> Ordering {
    // 2^63 as f64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if b.is_nan() {
        return if b.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if b >= LIMIT {
        return Ordering::Less;
    }
    if b < -LIMIT {
        return Ordering::Greater;
    }
    let whole = b.trunc();
    match a.cmp(&(whole as i64)) {
        Ordering::Equal => cmp_floats(0.0, b - whole),
        ordering => ordering,
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(bytes) => {
                f.write_str("0x")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Map(record)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_order_numerically() {
        let mut values = vec![
            Value::Integer(30),
            Value::Integer(-2),
            Value::Integer(100),
            Value::Integer(0),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Integer(-2),
                Value::Integer(0),
                Value::Integer(30),
                Value::Integer(100)
            ]
        );
    }

    #[test]
    fn text_orders_lexicographically() {
        // Not length-first: "b" sorts after "aa"
        assert!(Value::from("aa") < Value::from("b"));
        assert!(Value::from("Ann") < Value::from("Anna"));
    }

    #[test]
    fn key_types_order_by_kind() {
        assert!(Value::Integer(i64::MAX) < Value::from(""));
        assert!(Value::from("zzz") < Value::Bytes(vec![0]));
        assert!(Value::Bytes(vec![255]) < Value::Array(vec![]));
        assert!(Value::Null < Value::Integer(i64::MIN));
    }

    #[test]
    fn arrays_compare_element_wise() {
        let a = Value::Array(vec![Value::Integer(1), Value::from("b")]);
        let b = Value::Array(vec![Value::Integer(1), Value::from("c")]);
        let c = Value::Array(vec![Value::Integer(1)]);
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn numbers_order_together() {
        assert!(Value::Integer(19) < Value::Float(19.5));
        assert!(Value::Float(19.5) < Value::Integer(20));
        assert!(Value::Float(-2.5) < Value::Integer(-2));
        assert!(Value::Integer(-3) < Value::Float(-2.5));
        assert_eq!(Value::Integer(2), Value::Float(2.0));
        assert_eq!(Value::Float(-0.0), Value::Float(0.0));
        assert_eq!(Value::Float(0.0), Value::Integer(0));
        assert!(Value::Float(f64::INFINITY) > Value::Integer(i64::MAX));
        assert!(Value::Float(f64::NEG_INFINITY) < Value::Integer(i64::MIN));
        assert!(Value::Float(9.3e18) > Value::Integer(i64::MAX));
        assert!(Value::Float(f64::MAX) < Value::from(""));
    }

    #[test]
    fn integers_near_limit_compare_exactly() {
        // 2^53 + 1 is not representable as f64
        let big = (1i64 << 53) + 1;
        assert!(Value::Integer(big) > Value::Float((1i64 << 53) as f64));
        assert!(Value::Integer(big - 1) == Value::Float((1i64 << 53) as f64));
    }

    #[test]
    fn floats_sort_in_btree() {
        let mut keys = std::collections::BTreeSet::new();
        for v in [Value::Float(9.99), Value::Integer(5), Value::Float(5.5), Value::Integer(10)] {
            keys.insert(v);
        }
        let sorted: Vec<_> = keys.into_iter().collect();
        assert_eq!(
            sorted,
            vec![
                Value::Integer(5),
                Value::Float(5.5),
                Value::Float(9.99),
                Value::Integer(10)
            ]
        );
    }

    #[test]
    fn valid_keys() {
        assert!(Value::Float(9.99).is_valid_key());
        assert!(!Value::Float(f64::NAN).is_valid_key());
        assert!(Value::Integer(1).is_valid_key());
        assert!(Value::from("x").is_valid_key());
        assert!(Value::Array(vec![Value::Integer(1), Value::from("x")]).is_valid_key());
        assert!(!Value::Null.is_valid_key());
        assert!(!Value::Bool(true).is_valid_key());
        assert!(!Value::Array(vec![Value::Null]).is_valid_key());
        assert!(!Value::Map(Record::new()).is_valid_key());
    }

    #[test]
    fn contains_text_is_case_sensitive() {
        assert!(Value::from("Hannah").contains_text("ann"));
        assert!(!Value::from("Anna").contains_text("ann"));
        assert!(Value::from("Anna").contains_text("nn"));
        assert!(!Value::from("ANN").contains_text("ann"));
        assert!(!Value::Integer(123).contains_text("12"));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Float(9.99).to_string(), "9.99");
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::Bytes(vec![0xab, 0x01]).to_string(), "0xab01");
        assert_eq!(
            Value::Array(vec![Value::Integer(1), Value::from("a")]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Integer(42));
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from(42u32), Value::Integer(42));
        assert!(matches!(Value::from(1.5), Value::Float(n) if n == 1.5));
        assert_eq!(Value::Integer(3).as_float(), Some(3.0));
        assert_eq!(Value::from("hello"), Value::Text("hello".to_string()));
        assert_eq!(Value::from(vec![1u8, 2, 3]), Value::Bytes(vec![1, 2, 3]));
        assert_eq!(Value::from(()), Value::Null);
    }

    #[test]
    fn map_get() {
        let mut record = Record::new();
        record.insert("name".into(), Value::from("Alice"));
        let map = Value::from(record);
        assert_eq!(map.get("name"), Some(&Value::from("Alice")));
        assert_eq!(map.get("missing"), None);
    }
}
