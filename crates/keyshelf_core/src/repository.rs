//! The storage capability interface and its store-backed implementation.

use crate::config::DatabaseConfig;
use crate::error::{CoreError, CoreResult};
use crate::query::{mutation, select, Columns, Condition, SelectQuery};
use crate::schema::{SchemaChange, SchemaManager};
use crate::store::{StoreFactory, Transaction, TransactionMode};
use keyshelf_codec::{Record, Value};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Everything the transaction coordinator needs from a storage engine.
///
/// Implementations own database lifecycle (initialisation, open/close,
/// deletion), transaction lifecycle, and the query and mutation executors
/// that run inside a transaction.
pub trait Repository: Send + Sync {
    /// Engine transaction handle.
    type Transaction;

    /// Creates or upgrades a database to `config` and opens it.
    ///
    /// Returns the schema changes applied (empty when already current).
    fn init_database(&self, config: &DatabaseConfig) -> CoreResult<Vec<SchemaChange>>;

    /// Deletes a database and everything in it.
    fn delete_database(&self, name: &str) -> CoreResult<()>;

    /// Opens an existing database that is already at `version`.
    fn open(&self, name: &str, version: u64) -> CoreResult<()>;

    /// Closes a database. Reads then yield nothing and writes fail.
    fn close(&self, name: &str);

    /// Returns true if the database is open.
    fn is_open(&self, name: &str) -> bool;

    /// Begins a read-write transaction over `tables`.
    fn begin(&self, database: &str, tables: &[String]) -> CoreResult<Self::Transaction>;

    /// Commits a transaction.
    fn commit(&self, txn: &mut Self::Transaction) -> CoreResult<()>;

    /// Aborts a transaction.
    fn abort(&self, txn: &mut Self::Transaction) -> CoreResult<()>;

    /// Returns true if the transaction can still be used.
    fn is_active(&self, txn: &Self::Transaction) -> bool;

    /// Runs a select.
    fn select(
        &self,
        txn: &Self::Transaction,
        table: &str,
        query: &SelectQuery,
    ) -> CoreResult<Vec<Record>>;

    /// Point lookup by primary key.
    fn select_by_primary_key(
        &self,
        txn: &Self::Transaction,
        table: &str,
        columns: &Columns,
        key: &Value,
    ) -> CoreResult<Option<Record>>;

    /// Counts matching records; failures count as 0.
    fn count(&self, txn: &Self::Transaction, table: &str, condition: Option<&Condition>) -> u64;

    /// Inserts a record, returning its primary key.
    fn insert(
        &self,
        txn: &mut Self::Transaction,
        table: &str,
        columns: Vec<String>,
        values: Vec<Value>,
    ) -> CoreResult<Value>;

    /// Upserts a record, returning its primary key.
    fn update(
        &self,
        txn: &mut Self::Transaction,
        table: &str,
        columns: Vec<String>,
        values: Vec<Value>,
    ) -> CoreResult<Value>;

    /// Deletes the first record matching `condition`, returning it.
    fn delete(
        &self,
        txn: &mut Self::Transaction,
        table: &str,
        condition: Option<&Condition>,
    ) -> CoreResult<Record>;
}

/// [`Repository`] over the embedded [`StoreFactory`].
#[derive(Debug)]
pub struct StoreRepository {
    factory: StoreFactory,
    /// Names of open databases.
    open: RwLock<BTreeSet<String>>,
}

impl StoreRepository {
    /// Creates a repository over `factory` with no database open.
    #[must_use]
    pub fn new(factory: StoreFactory) -> Self {
        Self {
            factory,
            open: RwLock::new(BTreeSet::new()),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn factory(&self) -> &StoreFactory {
        &self.factory
    }

    fn ensure_open(&self, txn: &Transaction) -> CoreResult<()> {
        if self.is_open(txn.database()) {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed {
                name: txn.database().to_string(),
            })
        }
    }
}

impl Repository for StoreRepository {
    type Transaction = Transaction;

    fn init_database(&self, config: &DatabaseConfig) -> CoreResult<Vec<SchemaChange>> {
        SchemaManager::validate(config)?;
        let mut changes = Vec::new();
        let outcome = self.factory.open(&config.name, config.version, |upgrade| {
            changes = SchemaManager::reconcile(upgrade, config)?;
            Ok(())
        })?;
        self.open.write().insert(config.name.clone());
        info!(
            database = %config.name,
            version = outcome.version,
            upgraded = outcome.upgraded,
            changes = changes.len(),
            "database initialised"
        );
        Ok(changes)
    }

    fn delete_database(&self, name: &str) -> CoreResult<()> {
        self.open.write().remove(name);
        self.factory.delete_database(name)
    }

    fn open(&self, name: &str, version: u64) -> CoreResult<()> {
        let current = self
            .factory
            .version(name)
            .ok_or_else(|| CoreError::DatabaseNotFound {
                name: name.to_string(),
            })?;
        if current < version {
            return Err(CoreError::schema(format!(
                "database {name} has a pending upgrade from version {current} to {version}"
            )));
        }
        if current > version {
            return Err(CoreError::VersionError {
                name: name.to_string(),
                requested: version,
                current,
            });
        }
        self.open.write().insert(name.to_string());
        debug!(database = name, version, "database opened");
        Ok(())
    }

    fn close(&self, name: &str) {
        if self.open.write().remove(name) {
            debug!(database = name, "database closed");
        }
    }

    fn is_open(&self, name: &str) -> bool {
        self.open.read().contains(name)
    }

    fn begin(&self, database: &str, tables: &[String]) -> CoreResult<Transaction> {
        self.factory.begin(database, tables, TransactionMode::ReadWrite)
    }

    fn commit(&self, txn: &mut Transaction) -> CoreResult<()> {
        txn.commit()
    }

    fn abort(&self, txn: &mut Transaction) -> CoreResult<()> {
        txn.abort()
    }

    fn is_active(&self, txn: &Transaction) -> bool {
        txn.is_active()
    }

    fn select(&self, txn: &Transaction, table: &str, query: &SelectQuery) -> CoreResult<Vec<Record>> {
        if !self.is_open(txn.database()) {
            debug!(database = txn.database(), table, "select on closed database");
            return Ok(Vec::new());
        }
        select::select(txn, table, query)
    }

    fn select_by_primary_key(
        &self,
        txn: &Transaction,
        table: &str,
        columns: &Columns,
        key: &Value,
    ) -> CoreResult<Option<Record>> {
        if !self.is_open(txn.database()) {
            debug!(database = txn.database(), table, "lookup on closed database");
            return Ok(None);
        }
        select::select_by_primary_key(txn, table, columns, key)
    }

    fn count(&self, txn: &Transaction, table: &str, condition: Option<&Condition>) -> u64 {
        if !self.is_open(txn.database()) || !txn.is_active() {
            return 0;
        }
        select::count(txn, table, condition)
    }

    fn insert(
        &self,
        txn: &mut Transaction,
        table: &str,
        columns: Vec<String>,
        values: Vec<Value>,
    ) -> CoreResult<Value> {
        self.ensure_open(txn)?;
        mutation::insert(txn, table, columns, values)
    }

    fn update(
        &self,
        txn: &mut Transaction,
        table: &str,
        columns: Vec<String>,
        values: Vec<Value>,
    ) -> CoreResult<Value> {
        self.ensure_open(txn)?;
        mutation::update(txn, table, columns, values)
    }

    fn delete(
        &self,
        txn: &mut Transaction,
        table: &str,
        condition: Option<&Condition>,
    ) -> CoreResult<Record> {
        self.ensure_open(txn)?;
        mutation::delete(txn, table, condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::error::ErrorKind;

    fn config(version: u64) -> DatabaseConfig {
        DatabaseConfig::new("app", version)
            .table(TableConfig::new("user", "id").columns(["name", "age"]))
    }

    fn repo() -> StoreRepository {
        let repo = StoreRepository::new(StoreFactory::new());
        repo.init_database(&config(1)).unwrap();
        repo
    }

    fn tables() -> Vec<String> {
        vec!["user".to_string()]
    }

    #[test]
    fn init_opens_database() {
        let repo = StoreRepository::new(StoreFactory::new());
        let changes = repo.init_database(&config(1)).unwrap();
        assert_eq!(changes.len(), 4);
        assert!(repo.is_open("app"));
        assert!(repo.init_database(&config(1)).unwrap().is_empty());
    }

    #[test]
    fn open_rules() {
        let repo = repo();
        repo.close("app");
        assert!(!repo.is_open("app"));
        assert_eq!(repo.open("app", 2).unwrap_err().kind(), ErrorKind::Schema);
        assert!(matches!(
            repo.open("missing", 1),
            Err(CoreError::DatabaseNotFound { .. })
        ));
        repo.open("app", 1).unwrap();
        assert!(repo.is_open("app"));
    }

    #[test]
    fn closed_database_degrades() {
        let repo = repo();
        let mut txn = repo.begin("app", &tables()).unwrap();
        repo.insert(&mut txn, "user", vec!["id".into()], vec![1.into()])
            .unwrap();
        repo.close("app");

        assert!(repo.select(&txn, "user", &SelectQuery::all()).unwrap().is_empty());
        assert!(repo
            .select_by_primary_key(&txn, "user", &Columns::All, &Value::Integer(1))
            .unwrap()
            .is_none());
        assert_eq!(repo.count(&txn, "user", None), 0);
        let err = repo
            .insert(&mut txn, "user", vec!["id".into()], vec![2.into()])
            .unwrap_err();
        assert!(matches!(err, CoreError::DatabaseClosed { .. }));
    }

    #[test]
    fn commit_and_abort() {
        let repo = repo();
        let mut txn = repo.begin("app", &tables()).unwrap();
        repo.insert(&mut txn, "user", vec!["id".into()], vec![1.into()])
            .unwrap();
        repo.commit(&mut txn).unwrap();
        assert!(!repo.is_active(&txn));

        let mut txn = repo.begin("app", &tables()).unwrap();
        repo.insert(&mut txn, "user", vec!["id".into()], vec![2.into()])
            .unwrap();
        repo.abort(&mut txn).unwrap();

        let txn = repo.begin("app", &tables()).unwrap();
        assert_eq!(repo.count(&txn, "user", None), 1);
    }

    #[test]
    fn delete_database_closes() {
        let repo = repo();
        repo.delete_database("app").unwrap();
        assert!(!repo.is_open("app"));
        assert!(repo.begin("app", &tables()).is_err());
    }
}
