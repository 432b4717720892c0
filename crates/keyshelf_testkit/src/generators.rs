//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use keyshelf_codec::Value;
use keyshelf_core::{Condition, CoreResult};
use proptest::prelude::*;

/// Strategy for generating valid key values (numbers, text, bytes, arrays).
pub fn key_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(Value::Integer),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        "[a-zA-Z0-9]{0,8}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
    ];
    leaf.prop_recursive(2, 8, 3, |inner| {
        prop::collection::vec(inner, 0..3).prop_map(Value::Array)
    })
}

/// Strategy for generating valid column names.
pub fn column_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating person names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{1,7}").expect("Invalid regex")
}

/// Strategy for generating a list of `(name, age)` users.
pub fn users_strategy(max: usize) -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec((name_strategy(), 0i64..100), 0..max)
}

/// The four open/closed combinations of a two-sided range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetweenKind {
    /// `lo < c < hi`
    Open,
    /// `lo <= c < hi`
    LeftInclusive,
    /// `lo < c <= hi`
    RightInclusive,
    /// `lo <= c <= hi`
    Inclusive,
}

impl BetweenKind {
    /// Builds the condition on `column`.
    pub fn condition(self, column: &str, lo: i64, hi: i64) -> CoreResult<Condition> {
        match self {
            Self::Open => Condition::between(column, lo, hi),
            Self::LeftInclusive => Condition::between_left_inclusive(column, lo, hi),
            Self::RightInclusive => Condition::between_right_inclusive(column, lo, hi),
            Self::Inclusive => Condition::between_inclusive(column, lo, hi),
        }
    }

    /// Returns true if `value` satisfies the bound.
    pub fn admits(self, lo: i64, hi: i64, value: i64) -> bool {
        let above = match self {
            Self::Open | Self::RightInclusive => value > lo,
            Self::LeftInclusive | Self::Inclusive => value >= lo,
        };
        let below = match self {
            Self::Open | Self::LeftInclusive => value < hi,
            Self::RightInclusive | Self::Inclusive => value <= hi,
        };
        above && below
    }
}

/// Strategy for generating a between kind.
pub fn between_kind_strategy() -> impl Strategy<Value = BetweenKind> {
    prop_oneof![
        Just(BetweenKind::Open),
        Just(BetweenKind::LeftInclusive),
        Just(BetweenKind::RightInclusive),
        Just(BetweenKind::Inclusive),
    ]
}

/// Strategy for generating `(kind, lo, hi)` that always forms a valid range.
pub fn between_strategy() -> impl Strategy<Value = (BetweenKind, i64, i64)> {
    (between_kind_strategy(), 0i64..100, 1i64..50)
        .prop_map(|(kind, lo, width)| (kind, lo, lo + width))
}

/// Strategy for generating pagination windows `(start, k1, k2)`.
pub fn page_split_strategy() -> impl Strategy<Value = (i64, i64, i64)> {
    (0i64..10, 1i64..10, 1i64..10)
}
