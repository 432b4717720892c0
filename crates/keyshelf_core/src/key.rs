//! Primary key paths and key ranges.

use crate::error::{CoreError, CoreResult};
use keyshelf_codec::{Record, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Bound;

/// The column (or ordered columns) a table's primary key is read from.
///
/// Serialized untagged, so configuration may give either `"id"` or
/// `["tenant", "id"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPath {
    /// Key is the value of one column.
    Single(String),
    /// Key is an array of several column values, in this order.
    Composite(Vec<String>),
}

impl KeyPath {
    /// Creates a key path from a list of columns.
    ///
    /// A one-element list collapses to [`KeyPath::Single`].
    pub fn composite<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.len() == 1 {
            Self::Single(columns.remove(0))
        } else {
            Self::Composite(columns)
        }
    }

    /// Returns the key columns in key order.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Single(column) => vec![column.as_str()],
            Self::Composite(columns) => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Returns the column name for a single-column key path.
    #[must_use]
    pub fn single(&self) -> Option<&str> {
        match self {
            Self::Single(column) => Some(column),
            Self::Composite(_) => None,
        }
    }

    /// Returns true if no usable column is named.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns().iter().all(|c| c.trim().is_empty())
    }

    /// Returns true if `column` is part of the key.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    /// Reads the key from a record.
    ///
    /// Returns `None` if any key column is absent or is not a valid key.
    #[must_use]
    pub fn extract(&self, record: &Record) -> Option<Value> {
        match self {
            Self::Single(column) => record.get(column).filter(|v| v.is_valid_key()).cloned(),
            Self::Composite(columns) => columns
                .iter()
                .map(|c| record.get(c).filter(|v| v.is_valid_key()).cloned())
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
        }
    }
}

impl From<&str> for KeyPath {
    fn from(column: &str) -> Self {
        Self::Single(column.to_string())
    }
}

impl From<String> for KeyPath {
    fn from(column: String) -> Self {
        Self::Single(column)
    }
}

impl From<Vec<&str>> for KeyPath {
    fn from(columns: Vec<&str>) -> Self {
        Self::composite(columns)
    }
}

impl From<Vec<String>> for KeyPath {
    fn from(columns: Vec<String>) -> Self {
        Self::composite(columns)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(column) => f.write_str(column),
            Self::Composite(columns) => write!(f, "[{}]", columns.join(", ")),
        }
    }
}

/// A contiguous interval of keys used to bound a scan.
///
/// Both ends are optional; an endpoint is either closed (included) or open
/// (excluded). Ranges are validated on construction: endpoints must be
/// valid keys and the lower end must not exceed the upper end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    lower: Bound<Value>,
    upper: Bound<Value>,
}

impl KeyRange {
    /// Range containing exactly `value`.
    pub fn only(value: impl Into<Value>) -> CoreResult<Self> {
        let value = checked_key(value.into())?;
        Ok(Self {
            lower: Bound::Included(value.clone()),
            upper: Bound::Included(value),
        })
    }

    /// Keys above `value` (`open` excludes `value` itself).
    pub fn lower_bound(value: impl Into<Value>, open: bool) -> CoreResult<Self> {
        let value = checked_key(value.into())?;
        Ok(Self {
            lower: endpoint(value, open),
            upper: Bound::Unbounded,
        })
    }

    /// Keys below `value` (`open` excludes `value` itself).
    pub fn upper_bound(value: impl Into<Value>, open: bool) -> CoreResult<Self> {
        let value = checked_key(value.into())?;
        Ok(Self {
            lower: Bound::Unbounded,
            upper: endpoint(value, open),
        })
    }

    /// Keys between `lower` and `upper`.
    ///
    /// Fails if `lower > upper`, or if they are equal and either end is open.
    pub fn bound(
        lower: impl Into<Value>,
        upper: impl Into<Value>,
        lower_open: bool,
        upper_open: bool,
    ) -> CoreResult<Self> {
        let lower = checked_key(lower.into())?;
        let upper = checked_key(upper.into())?;
        if lower > upper {
            return Err(CoreError::invalid_argument(format!(
                "range lower bound {lower} is greater than upper bound {upper}"
            )));
        }
        if lower == upper && (lower_open || upper_open) {
            return Err(CoreError::invalid_argument(format!(
                "range with equal bounds {lower} must be closed on both ends"
            )));
        }
        Ok(Self {
            lower: endpoint(lower, lower_open),
            upper: endpoint(upper, upper_open),
        })
    }

    /// Lower endpoint.
    #[must_use]
    pub fn lower(&self) -> Bound<&Value> {
        self.lower.as_ref()
    }

    /// Upper endpoint.
    #[must_use]
    pub fn upper(&self) -> Bound<&Value> {
        self.upper.as_ref()
    }

    /// Returns the key if this range contains exactly one key.
    #[must_use]
    pub fn point(&self) -> Option<&Value> {
        match (&self.lower, &self.upper) {
            (Bound::Included(lo), Bound::Included(hi)) if lo == hi => Some(lo),
            _ => None,
        }
    }

    /// Returns true if `key` lies within the range.
    #[must_use]
    pub fn includes(&self, key: &Value) -> bool {
        let above = match &self.lower {
            Bound::Included(lo) => key >= lo,
            Bound::Excluded(lo) => key > lo,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(hi) => key <= hi,
            Bound::Excluded(hi) => key < hi,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Owned bounds for `BTreeMap::range`.
    pub(crate) fn bounds(range: Option<&KeyRange>) -> (Bound<Value>, Bound<Value>) {
        match range {
            Some(r) => (r.lower.clone(), r.upper.clone()),
            None => (Bound::Unbounded, Bound::Unbounded),
        }
    }
}

fn endpoint(value: Value, open: bool) -> Bound<Value> {
    if open {
        Bound::Excluded(value)
    } else {
        Bound::Included(value)
    }
}

fn checked_key(value: Value) -> CoreResult<Value> {
    if value.is_valid_key() {
        Ok(value)
    } else {
        Err(CoreError::invalid_argument(format!(
            "{value} is not a valid key"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn key_path_single_extract() {
        let path = KeyPath::from("id");
        let rec = record(&[("id", Value::Integer(7)), ("name", Value::from("a"))]);
        assert_eq!(path.extract(&rec), Some(Value::Integer(7)));
        assert_eq!(path.extract(&record(&[("name", Value::from("a"))])), None);
        assert_eq!(path.extract(&record(&[("id", Value::Null)])), None);
    }

    #[test]
    fn key_path_composite_extract() {
        let path = KeyPath::from(vec!["tenant", "id"]);
        let rec = record(&[("id", Value::Integer(7)), ("tenant", Value::from("acme"))]);
        assert_eq!(
            path.extract(&rec),
            Some(Value::Array(vec![Value::from("acme"), Value::Integer(7)]))
        );
        assert_eq!(path.extract(&record(&[("id", Value::Integer(7))])), None);
    }

    #[test]
    fn one_element_composite_collapses() {
        assert_eq!(KeyPath::from(vec!["id"]), KeyPath::Single("id".into()));
        assert_eq!(KeyPath::from(vec!["a", "b"]).to_string(), "[a, b]");
    }

    #[test]
    fn range_includes() {
        let r = KeyRange::bound(20, 30, false, true).unwrap();
        assert!(r.includes(&Value::Integer(20)));
        assert!(r.includes(&Value::Integer(29)));
        assert!(!r.includes(&Value::Integer(30)));
        assert!(!r.includes(&Value::from("25")));

        let gt = KeyRange::lower_bound(5, true).unwrap();
        assert!(!gt.includes(&Value::Integer(5)));
        assert!(gt.includes(&Value::Integer(6)));

        let le = KeyRange::upper_bound(5, false).unwrap();
        assert!(le.includes(&Value::Integer(5)));
        assert!(!le.includes(&Value::Integer(6)));
    }

    #[test]
    fn point_detection() {
        assert_eq!(
            KeyRange::only("x").unwrap().point(),
            Some(&Value::from("x"))
        );
        assert_eq!(KeyRange::bound(1, 1, false, false).unwrap().point(), Some(&Value::Integer(1)));
        assert_eq!(KeyRange::lower_bound(1, false).unwrap().point(), None);
    }

    proptest::proptest! {
        #[test]
        fn includes_agrees_with_btree_range(
            keys in proptest::collection::btree_set(-50i64..50, 0..20),
            lo in -60i64..60,
            width in 0i64..40,
            lower_open: bool,
            upper_open: bool,
        ) {
            let hi = lo + width;
            let (lower_open, upper_open) = if width == 0 {
                (false, false)
            } else {
                (lower_open, upper_open)
            };
            let range = KeyRange::bound(lo, hi, lower_open, upper_open).unwrap();
            let keys: std::collections::BTreeSet<Value> =
                keys.into_iter().map(Value::Integer).collect();
            let scanned: Vec<&Value> = keys.range(KeyRange::bounds(Some(&range))).collect();
            let filtered: Vec<&Value> = keys.iter().filter(|k| range.includes(k)).collect();
            proptest::prop_assert_eq!(scanned, filtered);
        }
    }

    #[test]
    fn invalid_ranges_rejected() {
        assert!(KeyRange::bound(30, 20, false, false).is_err());
        assert!(KeyRange::bound(5, 5, true, false).is_err());
        assert!(KeyRange::only(Value::Null).is_err());
        assert!(KeyRange::only(true).is_err());
    }
}
