//! Object store: records keyed by primary key, plus secondary indexes.

use super::index::Index;
use crate::error::{CoreError, CoreResult};
use crate::key::{KeyPath, KeyRange};
use keyshelf_codec::{Record, Value};
use std::collections::BTreeMap;

/// An object store.
///
/// Records are ordered by the primary key extracted through the table's
/// [`KeyPath`]. Every secondary index is kept in step with the records on
/// each write.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    key_path: KeyPath,
    records: BTreeMap<Value, Record>,
    indexes: BTreeMap<String, Index>,
}

impl Table {
    /// Creates an empty table.
    pub(crate) fn new(name: impl Into<String>, key_path: KeyPath) -> Self {
        Self {
            name: name.into(),
            key_path,
            records: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary key path.
    #[must_use]
    pub fn key_path(&self) -> &KeyPath {
        &self.key_path
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the table holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Names of the table's indexes, sorted.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    /// Iterates the indexes in name order.
    pub fn indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.values()
    }

    /// Iterates `(primary key, record)` in key order.
    pub fn records(&self) -> impl DoubleEndedIterator<Item = (&Value, &Record)> {
        self.records.iter()
    }

    /// Returns the record stored under `key`.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Record> {
        self.records.get(key)
    }

    /// Returns the first record whose primary key lies within `range`.
    #[must_use]
    pub fn first_in(&self, range: Option<&KeyRange>) -> Option<(&Value, &Record)> {
        self.span(range).next()
    }

    /// Counts records whose primary key lies within `range`.
    #[must_use]
    pub fn count_in(&self, range: Option<&KeyRange>) -> usize {
        match range {
            None => self.records.len(),
            Some(_) => self.span(range).count(),
        }
    }

    pub(crate) fn span(
        &self,
        range: Option<&KeyRange>,
    ) -> std::collections::btree_map::Range<'_, Value, Record> {
        self.records.range(KeyRange::bounds(range))
    }

    /// Inserts a new record, failing if its key is already present.
    pub(crate) fn add(&mut self, record: Record) -> CoreResult<Value> {
        let key = self.primary_key(&record)?;
        if self.records.contains_key(&key) {
            return Err(CoreError::ConstraintViolation {
                table: self.name.clone(),
                key: key.to_string(),
            });
        }
        self.check_unique(&record, &key)?;
        self.index_record(&record, &key);
        self.records.insert(key.clone(), record);
        Ok(key)
    }

    /// Inserts or replaces the record stored under its key.
    pub(crate) fn put(&mut self, record: Record) -> CoreResult<Value> {
        let key = self.primary_key(&record)?;
        self.check_unique(&record, &key)?;
        if let Some(old) = self.records.remove(&key) {
            self.unindex_record(&old, &key);
        }
        self.index_record(&record, &key);
        self.records.insert(key.clone(), record);
        Ok(key)
    }

    /// Removes and returns the record stored under `key`.
    pub(crate) fn delete(&mut self, key: &Value) -> Option<Record> {
        let record = self.records.remove(key)?;
        self.unindex_record(&record, key);
        Some(record)
    }

    /// Creates an index and fills it from the existing records.
    pub(crate) fn create_index(
        &mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        unique: bool,
    ) -> CoreResult<()> {
        let name = name.into();
        if self.indexes.contains_key(&name) {
            return Err(CoreError::invalid_operation(format!(
                "index {name} already exists on table {}",
                self.name
            )));
        }
        let mut index = Index::new(name.clone(), column, unique);
        for (key, record) in &self.records {
            if let Some(dup) = index.conflict(record, key) {
                return Err(CoreError::ConstraintViolation {
                    table: self.name.clone(),
                    key: dup.to_string(),
                });
            }
            index.insert(record, key);
        }
        self.indexes.insert(name, index);
        Ok(())
    }

    /// Removes an index.
    pub(crate) fn drop_index(&mut self, name: &str) -> CoreResult<()> {
        self.indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CoreError::index_not_found(&self.name, name))
    }

    fn primary_key(&self, record: &Record) -> CoreResult<Value> {
        self.key_path.extract(record).ok_or_else(|| {
            CoreError::invalid_argument(format!(
                "record has no valid key for key path {} in table {}",
                self.key_path, self.name
            ))
        })
    }

    fn check_unique(&self, record: &Record, key: &Value) -> CoreResult<()> {
        for index in self.indexes.values() {
            if let Some(dup) = index.conflict(record, key) {
                return Err(CoreError::ConstraintViolation {
                    table: self.name.clone(),
                    key: dup.to_string(),
                });
            }
        }
        Ok(())
    }

    fn index_record(&mut self, record: &Record, key: &Value) {
        for index in self.indexes.values_mut() {
            index.insert(record, key);
        }
    }

    fn unindex_record(&mut self, record: &Record, key: &Value) {
        for index in self.indexes.values_mut() {
            index.remove(record, key);
        }
    }
}
