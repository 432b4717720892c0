//! Storage backend trait definition.

use crate::error::StorageResult;

/// A snapshot store for keyshelf.
///
/// Backends are **opaque byte slots**: they keep the most recently written
/// snapshot and hand it back on load.
///
/// # Invariants
///
/// - `load` returns exactly the bytes of the last successful `replace`
/// - a failed `replace` leaves the previous snapshot intact
/// - `clear` makes the next `load` return `None`
pub trait StorageBackend: Send + Sync {
    /// Loads the current snapshot, or `None` if nothing was written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    fn load(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically replaces the snapshot with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data could not be written. The previous
    /// snapshot is still readable in that case.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Returns the size of the current snapshot in bytes (0 when empty).
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs the snapshot and its metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Removes the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot could not be removed.
    fn clear(&mut self) -> StorageResult<()>;
}
