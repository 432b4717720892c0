//! # keyshelf core
//!
//! Transactional indexed query engine for keyshelf.
//!
//! This crate provides:
//! - An embedded ordered object store with secondary indexes, key ranges,
//!   cursors, versioned databases and atomic transactions ([`store`])
//! - Condition and order algebra with a small string form ([`query`])
//! - Schema reconciliation during version upgrades ([`SchemaManager`])
//! - A transaction coordinator that routes actions to the query and
//!   mutation executors and aborts on the first failure
//! - Per-table DAOs and a startup facade ([`Persistence`])
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keyshelf_core::{DatabaseConfig, Persistence, StoreFactory, TableConfig};
//!
//! let config = DatabaseConfig::new("app", 1)
//!     .table(TableConfig::new("user", "id").columns(["name", "age"]));
//! let persistence = Persistence::open(StoreFactory::new(), vec![config])?;
//! let users = persistence.dao("app", "user")?;
//!
//! let adults = persistence.transaction(None, ["user"], |c| {
//!     users.get_list_by_conditions(c, "age >= 18", "age asc", None, Some(20))
//! })?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod dao;
mod error;
mod key;
mod persistence;
pub mod query;
mod repository;
mod schema;
pub mod store;

pub use config::{DatabaseConfig, TableConfig};
pub use coordinator::{Action, ActionResult, TransactionCoordinator};
pub use dao::{ConditionArg, OrderArg, TableDao};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use key::{KeyPath, KeyRange};
pub use persistence::Persistence;
pub use query::{Columns, Condition, Order, Predicate, SelectQuery};
pub use repository::{Repository, StoreRepository};
pub use schema::{SchemaChange, SchemaManager};
pub use store::{
    DatabaseInfo, Direction, OpenOutcome, StoreFactory, TableInfo, Transaction, TransactionMode,
};

pub use keyshelf_codec::{Record, Value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
