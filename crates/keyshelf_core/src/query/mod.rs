//! Declarative queries over the store.
//!
//! [`Condition`] and [`Order`] describe what to read and in which order;
//! the [`select`] and [`mutation`] executors turn them into cursor scans
//! and writes inside a [`Transaction`](crate::store::Transaction).

mod condition;
pub mod mutation;
mod order;
pub mod select;

pub use condition::{Condition, Predicate};
pub use order::Order;
pub use select::{Columns, SelectQuery};
