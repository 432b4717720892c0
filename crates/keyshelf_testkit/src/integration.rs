//! Cross-crate integration test helpers.
//!
//! Provides a harness that mirrors every write in an in-memory model and
//! checks the store against it.

use crate::fixtures::{user_record_with_id, user_schema, TestStore, APP_DATABASE, USER_TABLE};
use keyshelf_codec::{Record, Value};
use keyshelf_core::{
    Condition, ConditionArg, CoreError, OrderArg, Persistence, TableDao, TransactionCoordinator,
};
use std::collections::BTreeMap;

/// A test harness for integration testing against the `user` table.
pub struct IntegrationHarness {
    /// The backing store.
    pub store: TestStore,
    dao: TableDao,
    users: BTreeMap<i64, Record>,
}

impl IntegrationHarness {
    /// Creates a new integration harness with an in-memory store.
    pub fn new() -> Self {
        Self::from_store(TestStore::memory(vec![user_schema(1)]))
    }

    /// Creates a new integration harness with a file-backed store.
    pub fn file() -> Self {
        Self::from_store(TestStore::file(vec![user_schema(1)]))
    }

    fn from_store(store: TestStore) -> Self {
        let dao = store
            .dao(APP_DATABASE, USER_TABLE)
            .expect("user table is configured");
        Self {
            store,
            dao,
            users: BTreeMap::new(),
        }
    }

    /// The `user` DAO.
    pub fn dao(&self) -> &TableDao {
        &self.dao
    }

    /// Adds a user and tracks it for later verification.
    pub fn add_user(&mut self, id: i64, name: &str, age: i64) {
        let record = user_record_with_id(id, name, age);
        self.store
            .transaction(None, [USER_TABLE], |c| self.dao.add(c, record.clone()))
            .expect("Failed to add user");
        self.users.insert(id, record);
    }

    /// Deletes a user and updates tracking.
    pub fn delete(&mut self, id: i64) {
        self.store
            .transaction(None, [USER_TABLE], |c| self.dao.delete(c, id))
            .expect("Failed to delete user");
        self.users.remove(&id);
    }

    /// Runs `f` in a transaction over the `user` table.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&TableDao, &mut TransactionCoordinator) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        self.store
            .transaction(None, [USER_TABLE], |c| f(&self.dao, c))
    }

    /// Selects users by condition and order.
    pub fn select(
        &self,
        condition: impl Into<ConditionArg>,
        order: impl Into<OrderArg>,
        start: Option<i64>,
        size: Option<i64>,
    ) -> Vec<Record> {
        let condition = condition.into();
        let order = order.into();
        self.transaction(|dao, c| dao.get_list_by_conditions(c, condition, order, start, size))
            .expect("Failed to select users")
    }

    /// Ids of the tracked users admitted by `condition`, ascending.
    pub fn expected_ids(&self, condition: &Condition) -> Vec<i64> {
        self.users
            .iter()
            .filter(|(_, record)| condition.matches(record))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Verifies all tracked users are in the store and nothing else is.
    pub fn verify_all(&self) {
        let (count, stored) = self
            .transaction(|dao, c| {
                let count = dao.get_all_count(c)?;
                let mut stored = Vec::with_capacity(self.users.len());
                for id in self.users.keys() {
                    stored.push((*id, dao.get_by_id(c, *id)?));
                }
                Ok((count, stored))
            })
            .expect("Failed to read users");
        assert_eq!(count as usize, self.users.len(), "User count mismatch");
        for (id, actual) in stored {
            assert_eq!(
                actual.as_ref(),
                self.users.get(&id),
                "User data mismatch for {}",
                id
            );
        }
    }

    /// Returns the count of tracked users.
    pub fn tracked_count(&self) -> usize {
        self.users.len()
    }

    /// The persistence layer.
    pub fn persistence(&self) -> &Persistence {
        &self.store
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the integer `id` column from each record.
pub fn ids(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_integer))
        .collect()
}

/// Extracts the text `name` column from each record.
pub fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get("name").and_then(Value::as_text))
        .map(str::to_string)
        .collect()
}
