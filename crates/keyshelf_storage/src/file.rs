//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// A file-based snapshot slot.
///
/// `replace` writes the new snapshot to a sibling temporary file, syncs it
/// and renames it over the target, so a crash mid-write leaves the previous
/// snapshot in place.
///
/// # Example
///
/// ```no_run
/// use keyshelf_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("shelf.ksh")).unwrap();
/// backend.replace(b"snapshot").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    tmp_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Opens a file backend at the given path.
    ///
    /// The file itself is created lazily by the first `replace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path exists but is not a regular file.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if path.exists() && !path.is_file() {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )
            .into());
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path: path.with_file_name(tmp_name),
            write_lock: Mutex::new(()),
        })
    }

    /// Opens a file backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let _guard = self.write_lock.lock();

        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.tmp_path)?;
        tmp.write_all(data)?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&self.tmp_path, &self.path)?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn sync(&mut self) -> StorageResult<()> {
        match File::open(&self.path) {
            Ok(file) => {
                file.sync_all()?;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&mut self) -> StorageResult<()> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
