//! Single-column query conditions.
//!
//! A [`Condition`] is either a key range over one column, answered by an
//! index range scan, or a substring match, answered by a full scan with a
//! post-filter. The typed builders are the primary API; [`Condition::parse`]
//! accepts a small string form on top of them:
//!
//! ```text
//! age >= 25
//! price < 19.5
//! name like nn
//! 20 <= age < 30
//! ```

use crate::error::{CoreError, CoreResult};
use crate::key::KeyRange;
use keyshelf_codec::{Record, Value};
use std::fmt;
use std::ops::Bound;

/// What a condition tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Column value lies within a key range.
    Range(KeyRange),
    /// Column value is text containing this substring (case-sensitive).
    Like(String),
}

/// A predicate over one column. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    column: String,
    predicate: Predicate,
}

impl Condition {
    fn range(column: impl Into<String>, build: impl FnOnce() -> CoreResult<KeyRange>) -> CoreResult<Self> {
        let column = checked_column(column.into())?;
        Ok(Self {
            predicate: Predicate::Range(build()?),
            column,
        })
    }

    /// `column = value`.
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> CoreResult<Self> {
        let value = operand(value)?;
        Self::range(column, || KeyRange::only(value))
    }

    /// `column > value`.
    pub fn greater_than(column: impl Into<String>, value: impl Into<Value>) -> CoreResult<Self> {
        let value = operand(value)?;
        Self::range(column, || KeyRange::lower_bound(value, true))
    }

    /// `column >= value`.
    pub fn greater_or_equal(
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> CoreResult<Self> {
        let value = operand(value)?;
        Self::range(column, || KeyRange::lower_bound(value, false))
    }

    /// `column < value`.
    pub fn less_than(column: impl Into<String>, value: impl Into<Value>) -> CoreResult<Self> {
        let value = operand(value)?;
        Self::range(column, || KeyRange::upper_bound(value, true))
    }

    /// `column <= value`.
    pub fn less_or_equal(column: impl Into<String>, value: impl Into<Value>) -> CoreResult<Self> {
        let value = operand(value)?;
        Self::range(column, || KeyRange::upper_bound(value, false))
    }

    /// `lower < column < upper`.
    pub fn between(
        column: impl Into<String>,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
    ) -> CoreResult<Self> {
        Self::bounded(column, lower, upper, true, true)
    }

    /// `lower <= column < upper`.
    pub fn between_left_inclusive(
        column: impl Into<String>,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
    ) -> CoreResult<Self> {
        Self::bounded(column, lower, upper, false, true)
    }

    /// `lower < column <= upper`.
    pub fn between_right_inclusive(
        column: impl Into<String>,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
    ) -> CoreResult<Self> {
        Self::bounded(column, lower, upper, true, false)
    }

    /// `lower <= column <= upper`.
    pub fn between_inclusive(
        column: impl Into<String>,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
    ) -> CoreResult<Self> {
        Self::bounded(column, lower, upper, false, false)
    }

    fn bounded(
        column: impl Into<String>,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
        lower_open: bool,
        upper_open: bool,
    ) -> CoreResult<Self> {
        let lower = operand(lower)?;
        let upper = operand(upper)?;
        Self::range(column, || KeyRange::bound(lower, upper, lower_open, upper_open))
    }

    /// Column text contains `needle`.
    pub fn like(column: impl Into<String>, needle: impl Into<String>) -> CoreResult<Self> {
        let column = checked_column(column.into())?;
        let needle = needle.into();
        if needle.is_empty() {
            return Err(CoreError::invalid_argument(format!(
                "like condition on column {column} needs a non-empty value"
            )));
        }
        Ok(Self {
            column,
            predicate: Predicate::Like(needle),
        })
    }

    /// Parses the string form.
    ///
    /// Returns `Ok(None)` for an unknown operator or a token count other
    /// than 3 or 5, and callers apply no filter in that case. Operands that
    /// are well formed but invalid (an inverted range, say) are errors.
    pub fn parse(input: &str) -> CoreResult<Option<Self>> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        match tokens.as_slice() {
            [column, op, value] => {
                let condition = match *op {
                    "=" => Self::equals(*column, literal(value))?,
                    ">" => Self::greater_than(*column, literal(value))?,
                    ">=" => Self::greater_or_equal(*column, literal(value))?,
                    "<" => Self::less_than(*column, literal(value))?,
                    "<=" => Self::less_or_equal(*column, literal(value))?,
                    "like" => Self::like(*column, unquote(value))?,
                    _ => return Ok(None),
                };
                Ok(Some(condition))
            }
            [lower, op1, column, op2, upper] => {
                let (lower, upper) = (literal(lower), literal(upper));
                let condition = match (*op1, *op2) {
                    ("<", "<") => Self::between(*column, lower, upper)?,
                    ("<=", "<") => Self::between_left_inclusive(*column, lower, upper)?,
                    ("<", "<=") => Self::between_right_inclusive(*column, lower, upper)?,
                    ("<=", "<=") => Self::between_inclusive(*column, lower, upper)?,
                    _ => return Ok(None),
                };
                Ok(Some(condition))
            }
            _ => Ok(None),
        }
    }

    /// Column the condition applies to.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The predicate.
    #[must_use]
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Key range, unless this is a substring match.
    #[must_use]
    pub fn key_range(&self) -> Option<&KeyRange> {
        match &self.predicate {
            Predicate::Range(range) => Some(range),
            Predicate::Like(_) => None,
        }
    }

    /// Returns true for substring matches.
    #[must_use]
    pub fn is_like(&self) -> bool {
        matches!(self.predicate, Predicate::Like(_))
    }

    /// Tests a record against the condition.
    ///
    /// Range conditions only match valid key values, the same records an
    /// index over the column would hold.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let Some(value) = record.get(&self.column) else {
            return false;
        };
        match &self.predicate {
            Predicate::Range(range) => value.is_valid_key() && range.includes(value),
            Predicate::Like(needle) => value.contains_text(needle),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let range = match &self.predicate {
            Predicate::Like(needle) => return write!(f, "{} like {needle}", self.column),
            Predicate::Range(range) => range,
        };
        if let Some(point) = range.point() {
            return write!(f, "{} = {point}", self.column);
        }
        match (range.lower(), range.upper()) {
            (Bound::Unbounded, Bound::Unbounded) => write!(f, "{} any", self.column),
            (lower, Bound::Unbounded) => match lower {
                Bound::Excluded(v) => write!(f, "{} > {v}", self.column),
                Bound::Included(v) => write!(f, "{} >= {v}", self.column),
                Bound::Unbounded => Ok(()),
            },
            (Bound::Unbounded, upper) => match upper {
                Bound::Excluded(v) => write!(f, "{} < {v}", self.column),
                Bound::Included(v) => write!(f, "{} <= {v}", self.column),
                Bound::Unbounded => Ok(()),
            },
            (lower, upper) => {
                match lower {
                    Bound::Excluded(v) => write!(f, "{v} < ")?,
                    Bound::Included(v) => write!(f, "{v} <= ")?,
                    Bound::Unbounded => {}
                }
                f.write_str(&self.column)?;
                match upper {
                    Bound::Excluded(v) => write!(f, " < {v}"),
                    Bound::Included(v) => write!(f, " <= {v}"),
                    Bound::Unbounded => Ok(()),
                }
            }
        }
    }
}

fn checked_column(column: String) -> CoreResult<String> {
    if column.trim().is_empty() {
        Err(CoreError::invalid_argument("condition column must not be empty"))
    } else {
        Ok(column)
    }
}

fn operand(value: impl Into<Value>) -> CoreResult<Value> {
    let value = value.into();
    if value.is_null() {
        Err(CoreError::invalid_argument("condition operand must not be null"))
    } else {
        Ok(value)
    }
}

/// Strips one pair of matching single or double quotes.
fn unquote(token: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = token
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    token
}

/// Integer for `-?[0-9]+`, float for `-?[0-9]+.[0-9]+`, text otherwise.
fn literal(token: &str) -> Value {
    let unsigned = token.strip_prefix('-').unwrap_or(token);
    let is_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    match unsigned.split_once('.') {
        None if is_digits(unsigned) => {
            if let Ok(n) = token.parse::<i64>() {
                return Value::Integer(n);
            }
        }
        Some((whole, fraction)) if is_digits(whole) && is_digits(fraction) => {
            if let Ok(n) = token.parse::<f64>() {
                return Value::Float(n);
            }
        }
        _ => {}
    }
    Value::Text(unquote(token).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn record(age: i64, name: &str) -> Record {
        let mut r = Record::new();
        r.insert("age".into(), Value::Integer(age));
        r.insert("name".into(), Value::from(name));
        r
    }

    #[test]
    fn builders_validate() {
        assert_eq!(
            Condition::equals("", 1).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Condition::greater_than("age", Value::Null).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Condition::between("age", 1, Value::Null).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Condition::like("name", "").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert!(Condition::between("age", 5, 1).is_err());
        assert!(Condition::between("age", 5, 5).is_err());
        assert!(Condition::between_inclusive("age", 5, 5).is_ok());
    }

    #[test]
    fn between_variants() {
        let cases = [
            (Condition::between("age", 20, 30).unwrap(), [false, true, false]),
            (
                Condition::between_left_inclusive("age", 20, 30).unwrap(),
                [true, true, false],
            ),
            (
                Condition::between_right_inclusive("age", 20, 30).unwrap(),
                [false, true, true],
            ),
            (
                Condition::between_inclusive("age", 20, 30).unwrap(),
                [true, true, true],
            ),
        ];
        for (condition, expected) in cases {
            let got = [20, 25, 30].map(|age| condition.matches(&record(age, "x")));
            assert_eq!(got, expected, "{condition}");
        }
    }

    #[test]
    fn like_matches_text_only() {
        let condition = Condition::like("name", "nn").unwrap();
        assert!(condition.is_like());
        assert!(condition.key_range().is_none());
        assert!(condition.matches(&record(1, "Anna")));
        assert!(condition.matches(&record(1, "Hannah")));
        assert!(!condition.matches(&record(1, "Bob")));

        let numeric = Condition::like("age", "1").unwrap();
        assert!(!numeric.matches(&record(11, "x")));
    }

    #[test]
    fn parse_simple_forms() {
        let c = Condition::parse("age >= 25").unwrap().unwrap();
        assert_eq!(c, Condition::greater_or_equal("age", 25).unwrap());

        let c = Condition::parse("name = 'Ann'").unwrap().unwrap();
        assert_eq!(c, Condition::equals("name", "Ann").unwrap());

        let c = Condition::parse("temp < -5").unwrap().unwrap();
        assert_eq!(c, Condition::less_than("temp", -5).unwrap());

        let c = Condition::parse("name like ann").unwrap().unwrap();
        assert_eq!(c, Condition::like("name", "ann").unwrap());

        let c = Condition::parse("  code   =   \"007\" ").unwrap().unwrap();
        assert_eq!(c, Condition::equals("code", "007").unwrap());
    }

    #[test]
    fn parse_range_forms() {
        let c = Condition::parse("20 <= age < 30").unwrap().unwrap();
        assert_eq!(c, Condition::between_left_inclusive("age", 20, 30).unwrap());
        let c = Condition::parse("20 < age <= 30").unwrap().unwrap();
        assert_eq!(c, Condition::between_right_inclusive("age", 20, 30).unwrap());
        let c = Condition::parse("a < name < b").unwrap().unwrap();
        assert_eq!(c, Condition::between("name", "a", "b").unwrap());
    }

    #[test]
    fn parse_decimal_literals() {
        let c = Condition::parse("age > 19.5").unwrap().unwrap();
        assert_eq!(c, Condition::greater_than("age", 19.5).unwrap());
        assert!(c.matches(&record(20, "x")));
        assert!(!c.matches(&record(19, "x")));

        let c = Condition::parse("-0.5 < temp <= 2.25").unwrap().unwrap();
        assert_eq!(c, Condition::between_right_inclusive("temp", -0.5, 2.25).unwrap());

        // Not a plain decimal, stays text
        let c = Condition::parse("v = 1.2.3").unwrap().unwrap();
        assert_eq!(c, Condition::equals("v", "1.2.3").unwrap());
        let c = Condition::parse("v = .5").unwrap().unwrap();
        assert_eq!(c, Condition::equals("v", ".5").unwrap());
    }

    #[test]
    fn parse_unrecognized_is_lenient() {
        // Malformed input yields no condition rather than an error
        assert_eq!(Condition::parse("").unwrap(), None);
        assert_eq!(Condition::parse("age").unwrap(), None);
        assert_eq!(Condition::parse("age != 3").unwrap(), None);
        assert_eq!(Condition::parse("age >= 25 extra").unwrap(), None);
        assert_eq!(Condition::parse("1 > age > 3").unwrap(), None);
    }

    #[test]
    fn parse_invalid_range_is_error() {
        assert!(Condition::parse("30 <= age <= 20").is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Condition::greater_than("age", 3).unwrap().to_string(), "age > 3");
        assert_eq!(Condition::equals("id", "u1").unwrap().to_string(), "id = u1");
        assert_eq!(
            Condition::between_left_inclusive("age", 1, 9).unwrap().to_string(),
            "1 <= age < 9"
        );
        assert_eq!(Condition::like("name", "nn").unwrap().to_string(), "name like nn");
    }
}
