//! Durable mirror of the conversation and the auto-speak preference.
//!
//! Two independent entries are kept: the serialized message log and the
//! serialized preference. Both are rewritten in full on every change.

#[cfg(test)]
use std::collections::HashMap;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::conversation::Message;
use crate::error::StorageError;

pub const HISTORY_KEY: &str = "maxAI_history";
pub const AUTO_SPEAK_KEY: &str = "maxAI_autospeak";

/// Local string key-value storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Stores each key as `{data_dir}/{key}.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    /// Create the store, creating the data directory if needed.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|source| StorageError::Io {
            path: data_dir.clone(),
            source,
        })?;
        Ok(Self { data_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(value) => Some(value),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write through a temp file and rename, so a crash never leaves a
    /// half-written entry behind.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp_path = self.data_dir.join(format!(".{}.tmp", key));

        std::fs::write(&tmp_path, value.as_bytes()).map_err(|source| StorageError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;

        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Typed access to the two persisted entries.
pub struct Persistence {
    store: Box<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Load the saved conversation. Missing or unreadable data yields an
    /// empty log.
    pub fn load_log(&self) -> Vec<Message> {
        let Some(raw) = self.store.get(HISTORY_KEY) else {
            return Vec::new();
        };

        match serde_json::from_str(&raw) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Discarding corrupt conversation history: {}", e);
                Vec::new()
            }
        }
    }

    pub fn save_log(&self, messages: &[Message]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(messages).map_err(|source| StorageError::Serialize {
            key: HISTORY_KEY,
            source,
        })?;
        self.store.set(HISTORY_KEY, &raw)
    }

    /// Load the auto-speak preference, `true` unless a valid `false` was saved.
    pub fn load_preference(&self) -> bool {
        let Some(raw) = self.store.get(AUTO_SPEAK_KEY) else {
            return true;
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring corrupt auto-speak preference: {}", e);
            true
        })
    }

    pub fn save_preference(&self, auto_speak: bool) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&auto_speak).map_err(|source| StorageError::Serialize {
            key: AUTO_SPEAK_KEY,
            source,
        })?;
        self.store.set(AUTO_SPEAK_KEY, &raw)
    }
}
