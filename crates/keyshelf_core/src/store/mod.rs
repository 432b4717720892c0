//! Embedded ordered object store.
//!
//! Databases hold tables (object stores) keyed by primary key; each table
//! carries ordered secondary indexes. All reads and writes happen inside a
//! [`Transaction`]; structure changes happen inside an
//! [`UpgradeTransaction`] while a database moves to a higher version.

mod cursor;
mod factory;
mod index;
mod snapshot;
mod table;
mod transaction;

pub use cursor::{Cursor, CursorEntry, Direction, Source};
pub use factory::{DatabaseInfo, OpenOutcome, StoreFactory, TableInfo};
pub use index::Index;
pub use table::Table;
pub use transaction::{Transaction, TransactionMode, TransactionState, UpgradeTransaction};
