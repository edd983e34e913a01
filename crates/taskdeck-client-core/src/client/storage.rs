//! Key-value backends the [`crate::TokenStore`] persists into

use std::{
    collections::HashMap,
    fmt::Debug,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use taskdeck_shared::time::{Seconds, Timestamp};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
    #[error("failed to persist to storage: {0}")]
    Persist(String),
}

/// A string key-value store. Backends that have no notion of expiry ignore
/// `lifetime`
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str, lifetime: Option<Seconds>) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Cookie like store, entries stop being readable once their lifetime elapses
#[derive(Debug, Default)]
pub struct ExpiringStore {
    entries: Mutex<HashMap<String, ExpiringEntry>>,
}

#[derive(Debug)]
struct ExpiringEntry {
    value: String,
    expires_at: Option<Timestamp>,
}

/// Plain durable store held in memory. Lifetimes are ignored
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

/// Plain durable store persisted as a JSON object in a single file.
/// Lifetimes are ignored
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl ExpiringStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for ExpiringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut guard = self.entries.lock().expect("mutex poisoned");
        let is_expired = match guard.get(key) {
            None => return Ok(None),
            Some(entry) => entry.expires_at.is_some_and(|at| at.is_reached()),
        };
        if is_expired {
            guard.remove(key);
            return Ok(None);
        }
        Ok(guard.get(key).map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: &str, lifetime: Option<Seconds>) -> Result<(), StorageError> {
        let entry = ExpiringEntry {
            value: value.to_string(),
            expires_at: lifetime.map(|lifetime| Timestamp::now() + lifetime),
        };
        self.entries
            .lock()
            .expect("mutex poisoned")
            .insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().expect("mutex poisoned").remove(key);
        Ok(())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().expect("mutex poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, _lifetime: Option<Seconds>) -> Result<(), StorageError> {
        self.entries
            .lock()
            .expect("mutex poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().expect("mutex poisoned").remove(key);
        Ok(())
    }
}

impl FileStore {
    /// The file is created on first write, a missing file reads as empty
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| StorageError::Unavailable(format!("corrupt store file: {e}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StorageError::Unavailable(e.to_string())),
        }
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::Persist(e.to_string()))?;
        }
        let text =
            serde_json::to_string(entries).map_err(|e| StorageError::Persist(e.to_string()))?;
        fs::write(&self.path, text).map_err(|e| StorageError::Persist(e.to_string()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().expect("mutex poisoned");
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str, _lifetime: Option<Seconds>) -> Result<(), StorageError> {
        let _guard = self.lock.lock().expect("mutex poisoned");
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().expect("mutex poisoned");
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}
