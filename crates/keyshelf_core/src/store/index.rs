//! Secondary index over one column.

use crate::key::KeyRange;
use keyshelf_codec::{Record, Value};
use std::collections::{btree_map, BTreeMap, BTreeSet};

/// Ordered secondary index.
///
/// Maps each index key (a column value) to the set of primary keys of the
/// records holding it. Records whose column is absent or not a valid key
/// are not indexed.
#[derive(Debug, Clone)]
pub struct Index {
    /// Index name.
    name: String,
    /// Column the index reads its key from.
    column: String,
    /// Whether two records may share an index key.
    unique: bool,
    /// Index key to primary keys.
    entries: BTreeMap<Value, BTreeSet<Value>>,
    /// Total entry count.
    count: usize,
}

impl Index {
    /// Creates an empty index.
    pub(crate) fn new(name: impl Into<String>, column: impl Into<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            unique,
            entries: BTreeMap::new(),
            count: 0,
        }
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the indexed column.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Returns true for unique indexes.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Returns the number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Index key of `record`, if it has one.
    pub(crate) fn key_for<'r>(&self, record: &'r Record) -> Option<&'r Value> {
        record.get(&self.column).filter(|v| v.is_valid_key())
    }

    /// Returns the key that would collide if `record` were stored under `primary`.
    pub(crate) fn conflict<'r>(&self, record: &'r Record, primary: &Value) -> Option<&'r Value> {
        if !self.unique {
            return None;
        }
        let key = self.key_for(record)?;
        match self.entries.get(key) {
            Some(owners) if owners.iter().any(|owner| owner != primary) => Some(key),
            _ => None,
        }
    }

    /// Adds `record` (stored under `primary`) to the index.
    pub(crate) fn insert(&mut self, record: &Record, primary: &Value) {
        if let Some(key) = self.key_for(record) {
            if self
                .entries
                .entry(key.clone())
                .or_default()
                .insert(primary.clone())
            {
                self.count += 1;
            }
        }
    }

    /// Removes `record` (stored under `primary`) from the index.
    pub(crate) fn remove(&mut self, record: &Record, primary: &Value) {
        let Some(key) = self.key_for(record) else {
            return;
        };
        if let Some(owners) = self.entries.get_mut(key) {
            if owners.remove(primary) {
                self.count -= 1;
                if owners.is_empty() {
                    self.entries.remove(key);
                }
            }
        }
    }

    /// Ordered span of index keys within `range`.
    pub(crate) fn span(
        &self,
        range: Option<&KeyRange>,
    ) -> btree_map::Range<'_, Value, BTreeSet<Value>> {
        self.entries.range(KeyRange::bounds(range))
    }

    /// Number of indexed records whose key lies within `range`.
    pub(crate) fn count_in(&self, range: Option<&KeyRange>) -> usize {
        match range {
            None => self.count,
            Some(_) => self.span(range).map(|(_, owners)| owners.len()).sum(),
        }
    }

    /// Primary key of the first record (by index key, then primary key) in `range`.
    pub(crate) fn first_in(&self, range: Option<&KeyRange>) -> Option<&Value> {
        self.span(range)
            .next()
            .and_then(|(_, owners)| owners.iter().next())
    }
}
