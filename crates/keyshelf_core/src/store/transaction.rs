//! Store transactions.

use super::cursor::{Cursor, Direction, Source};
use super::factory::FactoryInner;
use super::table::Table;
use crate::error::{CoreError, CoreResult};
use crate::key::{KeyPath, KeyRange};
use keyshelf_codec::{Record, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Access mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Reads only.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// A transaction over a fixed set of tables of one database.
///
/// The transaction works on its own copy-on-write view of the scoped
/// tables. Reads see the state at `begin` plus the transaction's own
/// writes. [`commit`](Self::commit) publishes the written tables
/// atomically; [`abort`](Self::abort) (or dropping an active transaction)
/// discards them.
///
/// Commit fails with [`CoreError::TransactionConflict`] if a written table
/// was replaced since `begin`, whether by another commit or by an upgrade.
pub struct Transaction {
    /// Transaction ID.
    id: u64,
    factory: Arc<FactoryInner>,
    database: String,
    mode: TransactionMode,
    /// Current state.
    state: TransactionState,
    tables: BTreeMap<String, Arc<Table>>,
    /// Published tables as seen at `begin`.
    base: BTreeMap<String, Arc<Table>>,
    /// Tables written by this transaction.
    dirty: BTreeSet<String>,
}

impl Transaction {
    pub(crate) fn new(
        id: u64,
        factory: Arc<FactoryInner>,
        database: String,
        mode: TransactionMode,
        tables: BTreeMap<String, Arc<Table>>,
    ) -> Self {
        debug!(txn = id, database = %database, ?mode, tables = tables.len(), "transaction started");
        Self {
            id,
            factory,
            database,
            mode,
            state: TransactionState::Active,
            base: tables.clone(),
            tables,
            dirty: BTreeSet::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the database this transaction is bound to.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the access mode.
    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true if the transaction is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Names of the tables in scope.
    #[must_use]
    pub fn scope(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CoreError::TransactionInactive)
        }
    }

    /// Read access to a scoped table.
    pub fn table(&self, name: &str) -> CoreResult<&Table> {
        self.ensure_active()?;
        self.tables
            .get(name)
            .map(Arc::as_ref)
            .ok_or_else(|| CoreError::table_not_found(name))
    }

    fn table_mut(&mut self, name: &str) -> CoreResult<&mut Table> {
        self.ensure_active()?;
        if self.mode == TransactionMode::ReadOnly {
            return Err(CoreError::ReadOnly);
        }
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| CoreError::table_not_found(name))?;
        self.dirty.insert(name.to_string());
        Ok(Arc::make_mut(table))
    }

    /// Primary key path of a table.
    pub fn key_path(&self, table: &str) -> CoreResult<&KeyPath> {
        Ok(self.table(table)?.key_path())
    }

    /// Returns true if `table` has an index called `index`.
    pub fn has_index(&self, table: &str, index: &str) -> CoreResult<bool> {
        Ok(self.table(table)?.index(index).is_some())
    }

    /// Looks up a record by primary key.
    pub fn get(&self, table: &str, key: &Value) -> CoreResult<Option<&Record>> {
        Ok(self.table(table)?.get(key))
    }

    /// Returns the first record whose primary key lies within `range`.
    pub fn get_in_range(&self, table: &str, range: &KeyRange) -> CoreResult<Option<&Record>> {
        Ok(self.table(table)?.first_in(Some(range)).map(|(_, r)| r))
    }

    /// Returns the first record whose `index` key lies within `range`.
    pub fn index_get(
        &self,
        table: &str,
        index: &str,
        range: &KeyRange,
    ) -> CoreResult<Option<&Record>> {
        let t = self.table(table)?;
        let idx = t
            .index(index)
            .ok_or_else(|| CoreError::index_not_found(table, index))?;
        Ok(idx.first_in(Some(range)).and_then(|pk| t.get(pk)))
    }

    /// Counts records whose primary key lies within `range`.
    pub fn count(&self, table: &str, range: Option<&KeyRange>) -> CoreResult<u64> {
        Ok(self.table(table)?.count_in(range) as u64)
    }

    /// Counts records whose `index` key lies within `range`.
    pub fn index_count(
        &self,
        table: &str,
        index: &str,
        range: Option<&KeyRange>,
    ) -> CoreResult<u64> {
        let t = self.table(table)?;
        let idx = t
            .index(index)
            .ok_or_else(|| CoreError::index_not_found(table, index))?;
        Ok(idx.count_in(range) as u64)
    }

    /// Opens a cursor over `source` restricted to `range`.
    pub fn open_cursor(
        &self,
        table: &str,
        source: &Source,
        range: Option<&KeyRange>,
        direction: Direction,
    ) -> CoreResult<Cursor<'_>> {
        Cursor::open(self.table(table)?, source, range, direction)
    }

    /// Inserts a record; fails if its key already exists.
    pub fn add(&mut self, table: &str, record: Record) -> CoreResult<Value> {
        self.table_mut(table)?.add(record)
    }

    /// Inserts or replaces a record.
    pub fn put(&mut self, table: &str, record: Record) -> CoreResult<Value> {
        self.table_mut(table)?.put(record)
    }

    /// Deletes the record stored under `key`, returning it.
    pub fn delete(&mut self, table: &str, key: &Value) -> CoreResult<Option<Record>> {
        Ok(self.table_mut(table)?.delete(key))
    }

    /// Publishes this transaction's writes.
    ///
    /// On failure the transaction ends aborted and nothing is published.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        if self.dirty.is_empty() {
            self.state = TransactionState::Committed;
            debug!(txn = self.id, "transaction committed (no writes)");
            return Ok(());
        }

        let written: Vec<(String, Arc<Table>, Arc<Table>)> = self
            .dirty
            .iter()
            .filter_map(|name| {
                let table = self.tables.get(name)?;
                let base = self.base.get(name)?;
                Some((name.clone(), Arc::clone(base), Arc::clone(table)))
            })
            .collect();
        let database = self.database.clone();
        let result = self.factory.publish(|databases| {
            let db = databases
                .get_mut(&database)
                .ok_or_else(|| CoreError::DatabaseNotFound {
                    name: database.clone(),
                })?;
            for (name, base, table) in written {
                let Some(slot) = db.tables.get_mut(&name) else {
                    return Err(CoreError::table_not_found(name));
                };
                if !Arc::ptr_eq(slot, &base) {
                    return Err(CoreError::TransactionConflict { table: name });
                }
                *slot = table;
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                self.state = TransactionState::Committed;
                debug!(txn = self.id, tables = self.dirty.len(), "transaction committed");
                Ok(())
            }
            Err(e) => {
                self.discard();
                warn!(txn = self.id, error = %e, "commit failed, transaction aborted");
                Err(e)
            }
        }
    }

    /// Discards this transaction's writes.
    pub fn abort(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.discard();
        debug!(txn = self.id, "transaction aborted");
        Ok(())
    }

    fn discard(&mut self) {
        self.state = TransactionState::Aborted;
        self.tables.clear();
        self.base.clear();
        self.dirty.clear();
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() {
            debug!(txn = self.id, "active transaction dropped, aborting");
            self.discard();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("database", &self.database)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The privileged transaction in which tables and indexes may change.
///
/// Handed to the upgrade callback of [`StoreFactory::open`](super::StoreFactory::open).
/// Changes become visible together with the new version once the callback
/// returns `Ok`.
#[derive(Debug)]
pub struct UpgradeTransaction {
    database: String,
    old_version: u64,
    new_version: u64,
    tables: BTreeMap<String, Arc<Table>>,
}

impl UpgradeTransaction {
    pub(crate) fn new(
        database: String,
        old_version: u64,
        new_version: u64,
        tables: BTreeMap<String, Arc<Table>>,
    ) -> Self {
        Self {
            database,
            old_version,
            new_version,
            tables,
        }
    }

    pub(crate) fn into_tables(self) -> BTreeMap<String, Arc<Table>> {
        self.tables
    }

    /// Database being upgraded.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Version before the upgrade (0 for a new database).
    #[must_use]
    pub fn old_version(&self) -> u64 {
        self.old_version
    }

    /// Version being upgraded to.
    #[must_use]
    pub fn new_version(&self) -> u64 {
        self.new_version
    }

    /// Names of the existing tables, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Returns a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name).map(Arc::as_ref)
    }

    fn table_mut(&mut self, name: &str) -> CoreResult<&mut Table> {
        self.tables
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| CoreError::table_not_found(name))
    }

    /// Primary key path of a table.
    pub fn key_path(&self, table: &str) -> CoreResult<&KeyPath> {
        self.table(table)
            .map(Table::key_path)
            .ok_or_else(|| CoreError::table_not_found(table))
    }

    /// Creates an empty table.
    pub fn create_table(&mut self, name: &str, key_path: KeyPath) -> CoreResult<()> {
        if self.tables.contains_key(name) {
            return Err(CoreError::invalid_operation(format!(
                "table {name} already exists in database {}",
                self.database
            )));
        }
        if name.is_empty() || key_path.is_empty() {
            return Err(CoreError::invalid_argument(
                "table name and key path must not be empty",
            ));
        }
        self.tables
            .insert(name.to_string(), Arc::new(Table::new(name, key_path)));
        Ok(())
    }

    /// Drops a table and all its records.
    pub fn drop_table(&mut self, name: &str) -> CoreResult<()> {
        self.tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CoreError::table_not_found(name))
    }

    /// Names of a table's indexes, sorted.
    pub fn index_names(&self, table: &str) -> CoreResult<Vec<String>> {
        self.table(table)
            .map(Table::index_names)
            .ok_or_else(|| CoreError::table_not_found(table))
    }

    /// Creates an index over `column`, filled from the existing records.
    pub fn create_index(
        &mut self,
        table: &str,
        name: &str,
        column: &str,
        unique: bool,
    ) -> CoreResult<()> {
        self.table_mut(table)?.create_index(name, column, unique)
    }

    /// Drops an index.
    pub fn drop_index(&mut self, table: &str, name: &str) -> CoreResult<()> {
        self.table_mut(table)?.drop_index(name)
    }
}
