//! Session storage trait and implementations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::StorageError;

/// Synchronous key-value string store scoped to one session.
///
/// Writes complete before the call returns so a reload immediately after a
/// cart mutation sees the new state.
pub trait SessionStorage: Send + Sync {
    /// Reads the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Deletes the value under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
struct InMemoryStorageState {
    values: HashMap<String, String>,
    fail_on_write: bool,
    fail_on_read: bool,
}

/// In-memory session storage.
///
/// Clones share the same underlying map, so a test can keep a handle and
/// "reload" a cart from it later.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStorage {
    state: Arc<RwLock<InMemoryStorageState>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the storage to reject every write until reset.
    pub fn set_fail_on_write(&self, fail: bool) {
        if let Ok(mut state) = self.state.write() {
            state.fail_on_write = fail;
        }
    }

    /// Configures the storage to reject every read until reset.
    pub fn set_fail_on_read(&self, fail: bool) {
        if let Ok(mut state) = self.state.write() {
            state.fail_on_read = fail;
        }
    }

    /// Returns the raw stored value, bypassing failure injection.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.values.get(key).cloned())
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("storage lock poisoned".to_string())
}

impl SessionStorage for InMemorySessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        if state.fail_on_read {
            return Err(StorageError::Unavailable("read rejected".to_string()));
        }
        Ok(state.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if state.fail_on_write {
            return Err(StorageError::Unavailable("write rejected".to_string()));
        }
        state.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if state.fail_on_write {
            return Err(StorageError::Unavailable("write rejected".to_string()));
        }
        state.values.remove(key);
        Ok(())
    }
}

/// File-backed session storage: one file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    dir: PathBuf,
}

impl FileSessionStorage {
    /// Uses `dir` for storage, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl SessionStorage for FileSessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
