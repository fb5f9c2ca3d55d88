//! Durable key-value storage for collector state.
//!
//! Plays the role browser local storage plays for a web tracker: a small
//! string map holding the session identifier, its last-activity timestamp,
//! and the consent flag. Storage failure is never fatal; callers get
//! in-memory behavior for the rest of the process lifetime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Key-value store for the collector's persisted state.
///
/// Implementations must not panic and must not surface errors to callers;
/// a failed write degrades to whatever the in-memory view holds.
pub trait Storage: Send + Sync {
    /// Read a value, `None` when absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str);

    /// Remove a value if present.
    fn remove(&self, key: &str);
}

/// Purely in-memory storage.
///
/// Used by tests, and as the degraded mode when disk storage is unusable.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

/// File-backed storage: one JSON object per collector instance.
///
/// The whole map is rewritten on every set; the state is a handful of short
/// strings, so this stays cheap. I/O problems are logged and the in-memory
/// cache keeps serving reads.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open (or create) storage at the given file path.
    pub fn open(path: PathBuf) -> Self {
        let cache = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Discarding unreadable state file {path:?}: {e}");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            cache: Mutex::new(cache),
        }
    }

    fn persist(&self, snapshot: &HashMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Could not create state directory {parent:?}: {e}");
                return;
            }
        }

        match serde_json::to_string_pretty(snapshot) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    tracing::warn!("Could not persist state to {:?}: {e}", self.path);
                }
            }
            Err(e) => tracing::warn!("Could not serialize state: {e}"),
        }
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let snapshot = {
            let mut cache = self.cache.lock().unwrap();
            cache.insert(key.to_string(), value.to_string());
            cache.clone()
        };
        self.persist(&snapshot);
    }

    fn remove(&self, key: &str) {
        let snapshot = {
            let mut cache = self.cache.lock().unwrap();
            cache.remove(key);
            cache.clone()
        };
        self.persist(&snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("missing"), None);

        storage.set("key", "value");
        assert_eq!(storage.get("key"), Some("value".to_string()));

        storage.remove("key");
        assert_eq!(storage.get("key"), None);
    }

    #[test]
    fn test_file_storage_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let storage = FileStorage::open(path.clone());
        storage.set("fintrack_session_id", "abc");
        drop(storage);

        let reopened = FileStorage::open(path);
        assert_eq!(
            reopened.get("fintrack_session_id"),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_file_storage_survives_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json at all").unwrap();

        let storage = FileStorage::open(path);
        assert_eq!(storage.get("anything"), None);

        // Writes still work after the corrupt file is discarded.
        storage.set("key", "value");
        assert_eq!(storage.get("key"), Some("value".to_string()));
    }

    #[test]
    fn test_file_storage_unwritable_path_degrades_to_memory() {
        // A path whose parent cannot be created: writes fail, reads keep
        // serving the in-memory cache.
        let path = PathBuf::from("/dev/null/nested/state.json");
        let storage = FileStorage::open(path);

        storage.set("key", "value");
        assert_eq!(storage.get("key"), Some("value".to_string()));
    }
}
