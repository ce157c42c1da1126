//! File-backed key-value store — one JSON document per key.
//!
//! Storage location: `~/.promptscaffold/data/<key>.json`
//!
//! Values are loaded lazily into an in-process cache and written through to
//! disk on every mutation. Single writer; concurrent processes are not
//! coordinated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use promptscaffold_core::error::StorageError;
use promptscaffold_core::storage::KeyValueStore;
use tracing::{debug, warn};

pub struct FileStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(dir = %dir.display(), "File store opened");
        Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::Other(format!("Invalid storage key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn read_from_disk(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read stored value");
                Err(StorageError::Other(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        }
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Other(format!("Lock poisoned: {e}"))
}

impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if let Some(value) = self.cache.read().map_err(poisoned)?.get(key) {
            return Ok(Some(value.clone()));
        }

        let value = self.read_from_disk(key)?;
        if let Some(v) = &value {
            self.cache
                .write()
                .map_err(poisoned)?
                .insert(key.to_string(), v.clone());
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StorageError::Other(format!("Failed to create data directory: {e}"))
        })?;

        // Write to a sibling file first so a crash never leaves half a document.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| StorageError::Other(format!("Failed to write {}: {e}", path.display())))?;

        self.cache
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        self.cache.write().map_err(poisoned)?.remove(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Other(format!(
                "Failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}
