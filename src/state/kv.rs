//! Key-value durable store for small pieces of state.
//!
//! Values are opaque strings; structured values go through [`load_json`] and
//! [`save_json`]. `JsonFileStore` re-reads its file on every access because the CLI
//! and the daemon are separate processes writing the same store.

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{CoreError, CoreResult};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> CoreResult<()>;
    fn remove(&self, key: &str) -> CoreResult<()>;
}

/// Read a JSON value. A missing key and an unparseable value both read as `None`;
/// the latter is logged since it means the store was edited by hand or truncated.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log_warning!("Ignoring corrupt value for '{}': {}", key, e);
            None
        }
    }
}

pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> CoreResult<()> {
    let raw = serde_json::to_string(value)
        .map_err(|e| CoreError::InvalidArgument(format!("cannot encode '{key}': {e}")))?;
    store.set(key, &raw)
}

/// Write `bytes` to `path` through a temp file in the same directory, so readers see
/// either the old or the new content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| CoreError::storage_write(dir, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CoreError::storage_write(dir, e))?;
    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| CoreError::storage_write(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| CoreError::storage_write(path, e.error))?;
    Ok(())
}

/// Store backed by one JSON object on disk.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`. Fails if an existing file is not a
    /// JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let store = Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        };
        store.read_entries()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> CoreResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| CoreError::StorageRead {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(CoreError::StorageRead {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Read-modify-write under the in-process mutex and an exclusive `flock` on a
    /// sidecar `.lock` file, so a CLI write and a daemon write never drop each other.
    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> CoreResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let lock_path = self.path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::storage_write(parent, e))?;
        }
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| CoreError::storage_write(&lock_path, e))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| CoreError::storage_write(&lock_path, e))?;

        let result = self.update_locked(apply);
        let _ = FileExt::unlock(&lock_file);
        result
    }

    fn update_locked(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> CoreResult<()> {
        let mut entries = self.read_entries()?;
        apply(&mut entries);
        let content = serde_json::to_string_pretty(&entries).map_err(|e| CoreError::StorageRead {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        write_atomic(&self.path, content.as_bytes())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.read_entries() {
            Ok(mut entries) => entries.remove(key),
            Err(e) => {
                log_warning!("{}", e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}
