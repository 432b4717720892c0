//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory snapshot slot.
///
/// Clones share the same slot, so a test can hand one clone to a store
/// factory, drop the factory and "reopen" from another clone.
///
/// # Example
///
/// ```rust
/// use keyshelf_storage::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let reader = backend.clone();
/// backend.replace(b"v1").unwrap();
/// assert_eq!(reader.size().unwrap(), 2);
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Option<Vec<u8>>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that already holds a snapshot.
    ///
    /// Useful for testing corrupted or foreign snapshots.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(Some(data))),
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().clone())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        *self.data.write() = Some(data.to_vec());
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().as_ref().map_or(0, |d| d.len() as u64))
    }

    fn sync(&mut self) -> StorageResult<()> {
        // Nothing to make durable
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        *self.data.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.load().unwrap().is_none());
        assert_eq!(backend.size().unwrap(), 0);
    }

    #[test]
    fn memory_replace_overwrites() {
        let mut backend = InMemoryBackend::new();
        backend.replace(b"first snapshot").unwrap();
        backend.replace(b"second").unwrap();
        assert_eq!(backend.load().unwrap().unwrap(), b"second");
        assert_eq!(backend.size().unwrap(), 6);
    }

    #[test]
    fn memory_clones_share_slot() {
        let mut writer = InMemoryBackend::new();
        let reader = writer.clone();
        writer.replace(b"shared").unwrap();
        assert_eq!(reader.load().unwrap().unwrap(), b"shared");
    }

    #[test]
    fn memory_with_data() {
        let backend = InMemoryBackend::with_data(b"preloaded".to_vec());
        assert_eq!(backend.size().unwrap(), 9);
        assert_eq!(backend.load().unwrap().unwrap(), b"preloaded");
    }

    #[test]
    fn memory_clear() {
        let mut backend = InMemoryBackend::new();
        backend.replace(b"some data").unwrap();
        backend.clear().unwrap();
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn memory_sync_succeeds() {
        let mut backend = InMemoryBackend::new();
        backend.replace(b"data").unwrap();
        assert!(backend.sync().is_ok());
    }
}
