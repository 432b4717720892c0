//! Database factory: open, upgrade and delete databases.

use super::snapshot::{self, DatabaseSnapshot, TableSnapshot};
use super::table::Table;
use super::transaction::{Transaction, TransactionMode, UpgradeTransaction};
use crate::error::{CoreError, CoreResult};
use crate::key::KeyPath;
use keyshelf_storage::StorageBackend;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Committed state of one database.
#[derive(Debug, Clone)]
pub(crate) struct DatabaseState {
    pub(crate) version: u64,
    pub(crate) tables: BTreeMap<String, Arc<Table>>,
}

type Databases = BTreeMap<String, DatabaseState>;

/// True if both maps hold the same table instances under the same names.
fn same_tables(a: &BTreeMap<String, Arc<Table>>, b: &BTreeMap<String, Arc<Table>>) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|((an, at), (bn, bt))| an == bn && Arc::ptr_eq(at, bt))
}

pub(crate) struct FactoryInner {
    /// Committed databases by name.
    databases: RwLock<Databases>,
    /// Snapshot storage, if persistent.
    backend: Option<Mutex<Box<dyn StorageBackend>>>,
    /// Next transaction ID.
    next_txn: AtomicU64,
}

impl FactoryInner {
    /// Applies `change` to a copy of the committed state, persists the copy,
    /// then makes it the committed state.
    ///
    /// Nothing is published if `change` or persisting fails.
    pub(crate) fn publish<F>(&self, change: F) -> CoreResult<()>
    where
        F: FnOnce(&mut Databases) -> CoreResult<()>,
    {
        let mut databases = self.databases.write();
        let mut next = databases.clone();
        change(&mut next)?;
        self.persist(&next)?;
        *databases = next;
        Ok(())
    }

    fn persist(&self, databases: &Databases) -> CoreResult<()> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        if databases.is_empty() {
            backend.lock().clear()?;
            debug!("last database removed, snapshot cleared");
            return Ok(());
        }
        let snapshots: Vec<DatabaseSnapshot> = databases
            .iter()
            .map(|(name, db)| DatabaseSnapshot {
                name: name.clone(),
                version: db.version,
                tables: db
                    .tables
                    .values()
                    .map(|t| TableSnapshot::capture(t))
                    .collect(),
            })
            .collect();
        let data = snapshot::encode(&snapshots)?;
        let mut backend = backend.lock();
        backend.replace(&data)?;
        backend.sync()?;
        debug!(bytes = data.len(), databases = snapshots.len(), "snapshot persisted");
        Ok(())
    }
}

/// Result of [`StoreFactory::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOutcome {
    /// Version before the call (0 if the database did not exist).
    pub old_version: u64,
    /// Version after the call.
    pub version: u64,
    /// Whether the upgrade callback ran and committed.
    pub upgraded: bool,
}

/// Structural summary of a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    /// Database name.
    pub name: String,
    /// Current version.
    pub version: u64,
    /// Tables in name order.
    pub tables: Vec<TableInfo>,
}

/// Structural summary of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Primary key path.
    pub key_path: KeyPath,
    /// Index names in order.
    pub indexes: Vec<String>,
    /// Number of records.
    pub records: usize,
}

/// Entry point to the embedded store.
///
/// Holds every database by name. Cloning is cheap and clones share state.
///
/// # Example
///
/// ```rust,ignore
/// let factory = StoreFactory::new();
/// factory.open("app", 1, |upgrade| {
///     upgrade.create_table("user", KeyPath::from("id"))?;
///     upgrade.create_index("user", "age", "age", false)
/// })?;
///
/// let mut txn = factory.begin("app", ["user"], TransactionMode::ReadWrite)?;
/// txn.add("user", record)?;
/// txn.commit()?;
/// ```
#[derive(Clone)]
pub struct StoreFactory {
    inner: Arc<FactoryInner>,
}

impl StoreFactory {
    /// Creates an empty, non-persistent store.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(BTreeMap::new(), None)
    }

    /// Creates a store persisted to `backend`, loading any existing snapshot.
    pub fn with_backend(backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        let mut databases = BTreeMap::new();
        if let Some(data) = backend.load()? {
            if !data.is_empty() {
                for db in snapshot::decode(&data)? {
                    let mut tables = BTreeMap::new();
                    for table in db.tables {
                        let name = table.name.clone();
                        tables.insert(name, Arc::new(table.restore()?));
                    }
                    databases.insert(
                        db.name,
                        DatabaseState {
                            version: db.version,
                            tables,
                        },
                    );
                }
                info!(databases = databases.len(), bytes = data.len(), "snapshot loaded");
            }
        }
        Ok(Self::from_parts(databases, Some(Mutex::new(backend))))
    }

    fn from_parts(databases: Databases, backend: Option<Mutex<Box<dyn StorageBackend>>>) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                databases: RwLock::new(databases),
                backend,
                next_txn: AtomicU64::new(1),
            }),
        }
    }

    /// Returns true if the store persists snapshots.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.inner.backend.is_some()
    }

    /// Opens `name` at `version`, creating it if missing.
    ///
    /// If `version` is above the current version, `upgrade` runs against an
    /// [`UpgradeTransaction`]; its changes and the new version are
    /// published together once it returns `Ok`. If it fails nothing
    /// changes (a database created by this call disappears again) and the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `version` is 0
    /// - `VersionError` if `version` is below the current version
    pub fn open<F>(&self, name: &str, version: u64, upgrade: F) -> CoreResult<OpenOutcome>
    where
        F: FnOnce(&mut UpgradeTransaction) -> CoreResult<()>,
    {
        if version == 0 {
            return Err(CoreError::invalid_argument(format!(
                "database {name} must be opened with a version of at least 1"
            )));
        }

        let (current, tables) = match self.inner.databases.read().get(name) {
            Some(db) => (db.version, db.tables.clone()),
            None => (0, BTreeMap::new()),
        };
        if version < current {
            return Err(CoreError::VersionError {
                name: name.to_string(),
                requested: version,
                current,
            });
        }
        if version == current {
            debug!(database = name, version, "database opened");
            return Ok(OpenOutcome {
                old_version: current,
                version,
                upgraded: false,
            });
        }

        info!(database = name, from = current, to = version, "upgrading database");
        let base = tables.clone();
        let mut txn = UpgradeTransaction::new(name.to_string(), current, version, tables);
        if let Err(e) = upgrade(&mut txn) {
            warn!(database = name, error = %e, "upgrade aborted");
            return Err(e);
        }
        let tables = txn.into_tables();

        self.inner.publish(|databases| {
            let unchanged = match databases.get(name) {
                Some(db) => db.version == current && same_tables(&db.tables, &base),
                None => current == 0,
            };
            if !unchanged {
                return Err(CoreError::invalid_operation(format!(
                    "database {name} changed during upgrade"
                )));
            }
            databases.insert(name.to_string(), DatabaseState { version, tables });
            Ok(())
        })?;
        info!(database = name, version, "upgrade committed");

        Ok(OpenOutcome {
            old_version: current,
            version,
            upgraded: true,
        })
    }

    /// Deletes a database. Deleting a missing database succeeds.
    pub fn delete_database(&self, name: &str) -> CoreResult<()> {
        if !self.inner.databases.read().contains_key(name) {
            return Ok(());
        }
        self.inner.publish(|databases| {
            databases.remove(name);
            Ok(())
        })?;
        info!(database = name, "database deleted");
        Ok(())
    }

    /// Names of all databases, sorted.
    #[must_use]
    pub fn database_names(&self) -> Vec<String> {
        self.inner.databases.read().keys().cloned().collect()
    }

    /// Current version of a database.
    #[must_use]
    pub fn version(&self, name: &str) -> Option<u64> {
        self.inner.databases.read().get(name).map(|db| db.version)
    }

    /// Table names of a database, sorted.
    pub fn table_names(&self, name: &str) -> CoreResult<Vec<String>> {
        self.inner
            .databases
            .read()
            .get(name)
            .map(|db| db.tables.keys().cloned().collect())
            .ok_or_else(|| CoreError::DatabaseNotFound {
                name: name.to_string(),
            })
    }

    /// Structural summary of a database.
    pub fn describe(&self, name: &str) -> CoreResult<DatabaseInfo> {
        let databases = self.inner.databases.read();
        let db = databases.get(name).ok_or_else(|| CoreError::DatabaseNotFound {
            name: name.to_string(),
        })?;
        Ok(DatabaseInfo {
            name: name.to_string(),
            version: db.version,
            tables: db
                .tables
                .values()
                .map(|t| TableInfo {
                    name: t.name().to_string(),
                    key_path: t.key_path().clone(),
                    indexes: t.index_names(),
                    records: t.len(),
                })
                .collect(),
        })
    }

    /// Begins a transaction over `tables` of database `name`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `tables` is empty
    /// - `DatabaseNotFound` / `TableNotFound` for unknown names
    pub fn begin<I, S>(&self, name: &str, tables: I, mode: TransactionMode) -> CoreResult<Transaction>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let databases = self.inner.databases.read();
        let db = databases.get(name).ok_or_else(|| CoreError::DatabaseNotFound {
            name: name.to_string(),
        })?;
        let mut scope = BTreeMap::new();
        for table in tables {
            let table = table.as_ref();
            let handle = db
                .tables
                .get(table)
                .ok_or_else(|| CoreError::table_not_found(table))?;
            scope.insert(table.to_string(), Arc::clone(handle));
        }
        drop(databases);
        if scope.is_empty() {
            return Err(CoreError::invalid_argument(
                "a transaction needs at least one table",
            ));
        }

        let id = self.inner.next_txn.fetch_add(1, Ordering::SeqCst);
        Ok(Transaction::new(
            id,
            Arc::clone(&self.inner),
            name.to_string(),
            mode,
            scope,
        ))
    }
}

impl Default for StoreFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StoreFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreFactory")
            .field("databases", &self.database_names())
            .field("persistent", &self.is_persistent())
            .finish()
    }
}
