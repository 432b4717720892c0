//! Error types for keyshelf core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse classification of a [`CoreError`].
///
/// Callers that only care about the failure category match on this rather
/// than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: column names, null operands, mismatched lengths.
    InvalidArgument,
    /// A delete target does not resolve to an existing record.
    NotFound,
    /// Missing or inconsistent schema configuration.
    Schema,
    /// The store rejected a request.
    Storage,
    /// A caller aborted the transaction with a domain error.
    Aborted,
}

/// Errors that can occur in keyshelf core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Snapshot storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] keyshelf_storage::StorageError),

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] keyshelf_codec::CodecError),

    /// An argument was malformed.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// The record to operate on does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was missing.
        message: String,
    },

    /// Schema configuration is missing or inconsistent.
    #[error("schema error: {message}")]
    Schema {
        /// Description of the problem.
        message: String,
    },

    /// Database does not exist.
    #[error("database not found: {name}")]
    DatabaseNotFound {
        /// Name of the database.
        name: String,
    },

    /// Database exists but has not been opened.
    #[error("database is not open: {name}")]
    DatabaseClosed {
        /// Name of the database.
        name: String,
    },

    /// No database is bound to the coordinator.
    #[error("no database is bound to the transaction coordinator")]
    NoDatabaseBound,

    /// Table does not exist or is outside the transaction scope.
    #[error("table not found: {table}")]
    TableNotFound {
        /// Name of the table.
        table: String,
    },

    /// Index does not exist on the table.
    #[error("index {index} not found on table {table}")]
    IndexNotFound {
        /// Name of the table.
        table: String,
        /// Name of the index.
        index: String,
    },

    /// A write would duplicate a primary key or unique index key.
    #[error("constraint violation in table {table}: key {key} already exists")]
    ConstraintViolation {
        /// Name of the table.
        table: String,
        /// The duplicated key.
        key: String,
    },

    /// Requested version is lower than the stored one.
    #[error("version error: database {name} is at version {current}, requested {requested}")]
    VersionError {
        /// Name of the database.
        name: String,
        /// Version requested by the caller.
        requested: u64,
        /// Version currently stored.
        current: u64,
    },

    /// Operation on a transaction that already finished.
    #[error("transaction is not active")]
    TransactionInactive,

    /// Write attempted in a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnly,

    /// Transaction was aborted.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },

    /// A table written by the transaction changed after the transaction began.
    #[error("transaction conflict: table {table} changed since the transaction began")]
    TransactionConflict {
        /// Name of the table.
        table: String,
    },

    /// Snapshot data is malformed.
    #[error("invalid snapshot format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    /// Creates an index not found error.
    pub fn index_not_found(table: impl Into<String>, index: impl Into<String>) -> Self {
        Self::IndexNotFound {
            table: table.into(),
            index: index.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Schema { .. } => ErrorKind::Schema,
            Self::TransactionAborted { .. } => ErrorKind::Aborted,
            Self::Storage(_)
            | Self::Codec(_)
            | Self::DatabaseNotFound { .. }
            | Self::DatabaseClosed { .. }
            | Self::NoDatabaseBound
            | Self::TableNotFound { .. }
            | Self::IndexNotFound { .. }
            | Self::ConstraintViolation { .. }
            | Self::VersionError { .. }
            | Self::TransactionInactive
            | Self::ReadOnly
            | Self::TransactionConflict { .. }
            | Self::InvalidFormat { .. }
            | Self::InvalidOperation { .. } => ErrorKind::Storage,
        }
    }
}
