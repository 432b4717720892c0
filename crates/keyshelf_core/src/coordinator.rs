//! Transaction coordinator.
//!
//! Owns the one live transaction and the database it is bound to, and
//! routes logical actions to the query and mutation executors. Any failed
//! action aborts the whole transaction before the error is returned.

use crate::error::{CoreError, CoreResult};
use crate::query::{Columns, Condition, SelectQuery};
use crate::repository::{Repository, StoreRepository};
use keyshelf_codec::{Record, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A logical action against one table.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Range/ordered/paged select.
    Select(SelectQuery),
    /// Point lookup by primary key.
    SelectByPrimaryKey {
        /// Projection.
        columns: Columns,
        /// Primary key.
        key: Value,
    },
    /// Count matching records.
    Count {
        /// Filter; `None` counts the whole table.
        condition: Option<Condition>,
    },
    /// Insert a new record.
    Add {
        /// Column names.
        columns: Vec<String>,
        /// Values, one per column.
        values: Vec<Value>,
    },
    /// Upsert a record by primary key.
    Update {
        /// Column names.
        columns: Vec<String>,
        /// Values, one per column.
        values: Vec<Value>,
    },
    /// Delete the first record matching a condition.
    Delete {
        /// Filter resolving the record.
        condition: Option<Condition>,
    },
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::SelectByPrimaryKey { .. } => "selectByPrimaryKey",
            Self::Count { .. } => "count",
            Self::Add { .. } => "add",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Result of an [`Action`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    /// Rows of a select.
    Records(Vec<Record>),
    /// Result of a point lookup.
    Record(Option<Record>),
    /// Result of a count.
    Count(u64),
    /// Primary key written by add/update.
    Key(Value),
    /// Record removed by delete.
    Deleted(Record),
}

impl ActionResult {
    fn mismatch(&self, expected: &str) -> CoreError {
        CoreError::invalid_operation(format!("expected {expected} result, got {self:?}"))
    }

    /// Rows of a select.
    pub fn into_records(self) -> CoreResult<Vec<Record>> {
        match self {
            Self::Records(records) => Ok(records),
            other => Err(other.mismatch("records")),
        }
    }

    /// Result of a point lookup.
    pub fn into_record(self) -> CoreResult<Option<Record>> {
        match self {
            Self::Record(record) => Ok(record),
            other => Err(other.mismatch("record")),
        }
    }

    /// Result of a count.
    pub fn into_count(self) -> CoreResult<u64> {
        match self {
            Self::Count(n) => Ok(n),
            other => Err(other.mismatch("count")),
        }
    }

    /// Key written by add/update.
    pub fn into_key(self) -> CoreResult<Value> {
        match self {
            Self::Key(key) => Ok(key),
            other => Err(other.mismatch("key")),
        }
    }

    /// Record removed by delete.
    pub fn into_deleted(self) -> CoreResult<Record> {
        match self {
            Self::Deleted(record) => Ok(record),
            other => Err(other.mismatch("deleted record")),
        }
    }
}

/// Coordinates one transaction at a time over a [`Repository`].
///
/// Several coordinators may share a repository; each has its own current
/// transaction and bound database.
pub struct TransactionCoordinator<R: Repository = StoreRepository> {
    repository: Arc<R>,
    database: Option<String>,
    transaction: Option<R::Transaction>,
}

impl<R: Repository> TransactionCoordinator<R> {
    /// Creates a coordinator with nothing bound.
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            database: None,
            transaction: None,
        }
    }

    /// The repository.
    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Binds `database` and begins a read-write transaction over `tables`.
    ///
    /// A still-active previous transaction is committed first.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `tables` is empty; storage errors from commit
    /// or begin.
    pub fn start<I, S>(&mut self, database: &str, tables: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables: Vec<String> = tables.into_iter().map(Into::into).collect();
        if tables.is_empty() {
            return Err(CoreError::invalid_argument(
                "a transaction needs at least one table",
            ));
        }
        if self.is_active() {
            debug!("committing previous transaction before start");
            self.commit()?;
        }
        let txn = self.repository.begin(database, &tables)?;
        self.database = Some(database.to_string());
        self.transaction = Some(txn);
        debug!(database, ?tables, "coordinator transaction started");
        Ok(())
    }

    /// Returns true if a transaction is live.
    pub fn is_active(&self) -> bool {
        self.transaction
            .as_ref()
            .is_some_and(|txn| self.repository.is_active(txn))
    }

    /// Name of the bound database.
    pub fn database(&self) -> CoreResult<&str> {
        self.database.as_deref().ok_or(CoreError::NoDatabaseBound)
    }

    /// Runs `action` against `table` in the current transaction.
    ///
    /// On failure the transaction is aborted and the error returned.
    /// `Count` without a live transaction yields 0.
    pub fn execute(&mut self, table: &str, action: Action) -> CoreResult<ActionResult> {
        let repo = Arc::clone(&self.repository);
        let txn = match self.transaction.as_mut() {
            Some(txn) if repo.is_active(txn) => txn,
            _ if matches!(action, Action::Count { .. }) => return Ok(ActionResult::Count(0)),
            _ => return Err(CoreError::TransactionInactive),
        };

        let name = action.name();
        let result = match action {
            Action::Select(query) => repo.select(txn, table, &query).map(ActionResult::Records),
            Action::SelectByPrimaryKey { columns, key } => repo
                .select_by_primary_key(txn, table, &columns, &key)
                .map(ActionResult::Record),
            Action::Count { condition } => {
                Ok(ActionResult::Count(repo.count(txn, table, condition.as_ref())))
            }
            Action::Add { columns, values } => {
                repo.insert(txn, table, columns, values).map(ActionResult::Key)
            }
            Action::Update { columns, values } => {
                repo.update(txn, table, columns, values).map(ActionResult::Key)
            }
            Action::Delete { condition } => repo
                .delete(txn, table, condition.as_ref())
                .map(ActionResult::Deleted),
        };

        if let Err(e) = &result {
            warn!(table, action = name, error = %e, "action failed, aborting transaction");
            self.abort_quietly();
        }
        result
    }

    /// Aborts the transaction and returns `message` as an error.
    ///
    /// The uniform failure path for domain validation:
    /// `return Err(coordinator.throw_exception("missing id"))`.
    pub fn throw_exception(&mut self, message: impl Into<String>) -> CoreError {
        let reason = message.into();
        warn!(reason = %reason, "transaction aborted by caller");
        self.abort_quietly();
        CoreError::transaction_aborted(reason)
    }

    /// Commits the live transaction. Without one this does nothing.
    pub fn commit(&mut self) -> CoreResult<()> {
        match self.transaction.as_mut() {
            Some(txn) if self.repository.is_active(txn) => self.repository.commit(txn),
            _ => Ok(()),
        }
    }

    /// Aborts the live transaction. Without one this does nothing.
    pub fn abort(&mut self) -> CoreResult<()> {
        match self.transaction.as_mut() {
            Some(txn) if self.repository.is_active(txn) => self.repository.abort(txn),
            _ => Ok(()),
        }
    }

    fn abort_quietly(&mut self) {
        if let Err(e) = self.abort() {
            warn!(error = %e, "abort failed");
        }
    }

    /// Runs `f` inside a new transaction.
    ///
    /// Commits if `f` returns `Ok` and the transaction is still live,
    /// aborts if it returns `Err`.
    pub fn run<F, T, I, S>(&mut self, database: &str, tables: I, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Self) -> CoreResult<T>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.start(database, tables)?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                self.abort_quietly();
                Err(e)
            }
        }
    }
}

impl<R: Repository> fmt::Debug for TransactionCoordinator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("database", &self.database)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
