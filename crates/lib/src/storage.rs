//! Durable key-value slots: the storage port the session store writes through.
//!
//! A slot holds one opaque string blob under a fixed key. [`FileSlotStorage`] keeps each slot
//! in `<dir>/<key>.json`; [`MemorySlotStorage`] is an in-process substitute.

use fs2::FileExt;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("encoding slot value: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decoding slot value: {0}")]
    Decode(#[source] serde_json::Error),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read and overwrite opaque blobs by key. Writes replace the whole value; last write wins.
pub trait SlotStorage: Send + Sync {
    /// Current value, or `None` when the slot was never written.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Keys become file names, so only `[A-Za-z0-9._-]` is allowed and no leading dot.
fn check_key(key: &str) -> Result<(), StorageError> {
    let ok = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// One JSON file per slot under a data directory.
#[derive(Debug, Clone)]
pub struct FileSlotStorage {
    dir: PathBuf,
}

impl FileSlotStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File backing `key`.
    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SlotStorage for FileSlotStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        check_key(key)?;
        let path = self.slot_path(key);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    /// Write to a temp file and rename over the slot while holding an exclusive lock on
    /// `<key>.lock`, so readers see either the old or the new blob.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_key(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let lock_path = self.dir.join(format!("{}.lock", key));
        let lock = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StorageError::io(&lock_path, e))?;
        lock.lock_exclusive()
            .map_err(|e| StorageError::io(&lock_path, e))?;

        let path = self.slot_path(key);
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        let result = (|| {
            let mut f = std::fs::File::create(&tmp).map_err(|e| StorageError::io(&tmp, e))?;
            f.write_all(value.as_bytes())
                .and_then(|_| f.sync_all())
                .map_err(|e| StorageError::io(&tmp, e))?;
            std::fs::rename(&tmp, &path).map_err(|e| StorageError::io(&path, e))
        })();
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        drop(lock);
        result
    }
}

/// Slots kept in memory for the lifetime of the value.
#[derive(Debug, Default)]
pub struct MemorySlotStorage {
    slots: RwLock<HashMap<String, String>>,
}

impl MemorySlotStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStorage for MemorySlotStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let g = self
            .slots
            .read()
            .map_err(|_| StorageError::Unavailable("memory slots lock poisoned".to_string()))?;
        Ok(g.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut g = self
            .slots
            .write()
            .map_err(|_| StorageError::Unavailable("memory slots lock poisoned".to_string()))?;
        g.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
