//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up configured stores
//! and common test data.

use keyshelf_codec::{Record, Value};
use keyshelf_core::{DatabaseConfig, Persistence, StoreFactory, TableConfig};
use keyshelf_storage::FileBackend;
use std::path::PathBuf;
use tempfile::TempDir;

/// Name of the database used by [`user_schema`].
pub const APP_DATABASE: &str = "app";

/// Name of the table used by [`user_schema`].
pub const USER_TABLE: &str = "user";

/// The `user{id, name, age}` schema keyed by `id`, at `version`.
pub fn user_schema(version: u64) -> DatabaseConfig {
    DatabaseConfig::new(APP_DATABASE, version)
        .table(TableConfig::new(USER_TABLE, "id").columns(["id", "name", "age"]))
}

/// A `user` record without an id.
pub fn user_record(name: &str, age: i64) -> Record {
    let mut record = Record::new();
    record.insert("name".into(), Value::from(name));
    record.insert("age".into(), Value::Integer(age));
    record
}

/// A `user` record with an id.
pub fn user_record_with_id(id: impl Into<Value>, name: &str, age: i64) -> Record {
    let mut record = user_record(name, age);
    record.insert("id".into(), id.into());
    record
}

/// A configured store with automatic cleanup.
pub struct TestStore {
    /// The persistence layer.
    pub persistence: Persistence,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
    path: Option<PathBuf>,
}

impl TestStore {
    /// Creates an in-memory store initialised with `configs`.
    pub fn memory(configs: Vec<DatabaseConfig>) -> Self {
        Self {
            persistence: Persistence::open(StoreFactory::new(), configs)
                .expect("Failed to open in-memory store"),
            _temp_dir: None,
            path: None,
        }
    }

    /// Creates a file-backed store initialised with `configs`.
    pub fn file(configs: Vec<DatabaseConfig>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("test.kshf");
        let persistence =
            Persistence::open(open_file_factory(&path), configs).expect("Failed to open file store");
        Self {
            persistence,
            _temp_dir: Some(temp_dir),
            path: Some(path),
        }
    }

    /// Returns the snapshot path if file-based, None if in-memory.
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Opens a second, independent view of the snapshot file with `configs`.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores.
    pub fn reopen(&self, configs: Vec<DatabaseConfig>) -> Persistence {
        let path = self.path.as_ref().expect("Only file stores can be reopened");
        Persistence::open(open_file_factory(path), configs).expect("Failed to reopen file store")
    }
}

impl std::ops::Deref for TestStore {
    type Target = Persistence;

    fn deref(&self) -> &Self::Target {
        &self.persistence
    }
}

fn open_file_factory(path: &std::path::Path) -> StoreFactory {
    let backend = FileBackend::open_with_create_dirs(path).expect("Failed to create file backend");
    StoreFactory::with_backend(Box::new(backend)).expect("Failed to load snapshot")
}

/// Runs a test with an in-memory store holding the `user` schema.
///
/// # Example
///
/// ```rust,ignore
/// use keyshelf_testkit::with_user_store;
///
/// #[test]
/// fn my_test() {
///     with_user_store(|store| {
///         let users = store.dao("app", "user").unwrap();
///         // ... test operations
///     });
/// }
/// ```
pub fn with_user_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    let store = TestStore::memory(vec![user_schema(1)]);
    f(&store)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A store whose `user` table holds `users` as `(id, name, age)`.
    pub fn populated_users(users: &[(i64, &str, i64)]) -> TestStore {
        let store = TestStore::memory(vec![user_schema(1)]);
        let dao = store
            .dao(APP_DATABASE, USER_TABLE)
            .expect("user table is configured");
        store
            .transaction(None, [USER_TABLE], |c| {
                for (id, name, age) in users {
                    dao.add(c, user_record_with_id(*id, name, *age))?;
                }
                Ok(())
            })
            .expect("Failed to populate users");
        store
    }
}
