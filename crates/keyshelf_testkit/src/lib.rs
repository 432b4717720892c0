//! # keyshelf testkit
//!
//! Test utilities for keyshelf.
//!
//! This crate provides:
//! - Test fixtures: in-memory and file-backed stores, the `user` schema
//! - Property-based test generators using proptest
//! - An integration harness that mirrors writes in a model and verifies
//!   the store against it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keyshelf_testkit::prelude::*;
//!
//! #[test]
//! fn adults() {
//!     with_user_store(|store| {
//!         let users = store.dao("app", "user").unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
