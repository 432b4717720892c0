//! # keyshelf storage
//!
//! Snapshot storage backends for keyshelf.
//!
//! A backend holds exactly one opaque blob: the latest snapshot of every
//! database managed by a store factory. Backends do not interpret the
//! bytes; framing, checksums and decoding belong to `keyshelf_core`.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral stores
//! - [`FileBackend`] - Persistent storage with atomic replace
//!
//! ## Example
//!
//! ```rust
//! use keyshelf_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! assert!(backend.load().unwrap().is_none());
//! backend.replace(b"snapshot").unwrap();
//! assert_eq!(backend.load().unwrap().as_deref(), Some(&b"snapshot"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
