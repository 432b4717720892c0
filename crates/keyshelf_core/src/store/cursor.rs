//! Lazy cursors over a table or one of its indexes.

use super::table::Table;
use crate::error::{CoreError, CoreResult};
use crate::key::KeyRange;
use keyshelf_codec::{Record, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Traversal direction of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending by (key, primary key).
    #[default]
    Next,
    /// Ascending, first record of each distinct key only.
    NextUnique,
    /// Descending by (key, primary key).
    Prev,
    /// Descending by key, first record of each distinct key only.
    PrevUnique,
}

impl Direction {
    /// Returns true for the descending variants.
    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(self, Self::Prev | Self::PrevUnique)
    }

    /// Returns true for the variants that skip duplicate keys.
    #[must_use]
    pub fn is_unique(self) -> bool {
        matches!(self, Self::NextUnique | Self::PrevUnique)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Next => "next",
            Self::NextUnique => "nextunique",
            Self::Prev => "prev",
            Self::PrevUnique => "prevunique",
        };
        f.write_str(s)
    }
}

/// What a cursor walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The table's records in primary key order.
    PrimaryKey,
    /// The named secondary index.
    Index(String),
}

/// One position of a cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorEntry<'a> {
    /// Key at this position (index key, or primary key for a table cursor).
    pub key: &'a Value,
    /// Primary key of the record.
    pub primary_key: &'a Value,
    /// The record.
    pub value: &'a Record,
}

/// A finite, non-restartable sequence of records.
///
/// Positions are produced lazily, so a consumer that stops early never
/// visits the rest of the range.
pub struct Cursor<'a> {
    inner: Box<dyn Iterator<Item = CursorEntry<'a>> + 'a>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn open(
        table: &'a Table,
        source: &Source,
        range: Option<&KeyRange>,
        direction: Direction,
    ) -> CoreResult<Self> {
        let inner: Box<dyn Iterator<Item = CursorEntry<'a>> + 'a> = match source {
            Source::PrimaryKey => {
                let entries = table.span(range).map(|(key, value)| CursorEntry {
                    key,
                    primary_key: key,
                    value,
                });
                // Primary keys are unique, so the unique variants change nothing.
                if direction.is_reverse() {
                    Box::new(entries.rev())
                } else {
                    Box::new(entries)
                }
            }
            Source::Index(name) => {
                let index = table
                    .index(name)
                    .ok_or_else(|| CoreError::index_not_found(table.name(), name))?;
                let span = index.span(range);
                let resolve = move |key: &'a Value, primary_key: &'a Value| {
                    table.get(primary_key).map(|value| CursorEntry {
                        key,
                        primary_key,
                        value,
                    })
                };
                match direction {
                    Direction::Next => Box::new(span.flat_map(move |(key, owners)| {
                        owners.iter().filter_map(move |pk| resolve(key, pk))
                    })),
                    Direction::Prev => Box::new(span.rev().flat_map(move |(key, owners)| {
                        owners.iter().rev().filter_map(move |pk| resolve(key, pk))
                    })),
                    Direction::NextUnique => Box::new(span.filter_map(move |(key, owners)| {
                        owners.iter().next().and_then(|pk| resolve(key, pk))
                    })),
                    Direction::PrevUnique => {
                        Box::new(span.rev().filter_map(move |(key, owners)| {
                            owners.iter().next().and_then(|pk| resolve(key, pk))
                        }))
                    }
                }
            }
        };
        Ok(Self { inner })
    }
}

impl<'a> Iterator for Cursor<'a> {
    type Item = CursorEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").finish_non_exhaustive()
    }
}
