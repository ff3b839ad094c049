//! Key-value storage backends for persisted cache entries.
//!
//! Backends store opaque strings. Serialization and expiry live in the
//! caller; a backend never interprets what it stores.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable string store keyed by name.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a temp file unique to the call and are renamed into place,
/// so concurrent writers never share a temp file and a reader sees one
/// complete value.
pub struct FileStorage {
    cache_dir: PathBuf,
    next_write: AtomicU64,
}

impl FileStorage {
    pub fn new(cache_dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&cache_dir).map_err(|source| StorageError::Io {
            key: cache_dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            cache_dir,
            next_write: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.cache_dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.cache_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.cache_path(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };
        let write_id = self.next_write.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .cache_dir
            .join(format!(".{}.{}-{}.tmp", key, std::process::id(), write_id));

        let written = match tokio::fs::write(&tmp, value).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(source) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(source));
        }
        debug!(key = key, bytes = value.len(), "Cache entry written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.cache_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// In-process storage, for tests and sessions that must not touch disk.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "roadeye-storage-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = temp_dir("round-trip");
        let storage = FileStorage::new(dir.clone()).expect("create storage");

        assert_eq!(storage.get("cachedHazards").await.unwrap(), None);
        storage.set("cachedHazards", "{\"a\":1}").await.unwrap();
        assert_eq!(
            storage.get("cachedHazards").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        assert!(dir.join("cachedHazards.json").exists());

        storage.remove("cachedHazards").await.unwrap();
        assert_eq!(storage.get("cachedHazards").await.unwrap(), None);
        // Removing a missing key is fine
        storage.remove("cachedHazards").await.unwrap();

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_file_storage_concurrent_writes() {
        let dir = temp_dir("concurrent");
        let storage = Arc::new(FileStorage::new(dir.clone()).expect("create storage"));

        for round in 0..10 {
            let values: Vec<String> = (0..32)
                .map(|i| format!("{{\"round\":{},\"writer\":{}}}", round, i))
                .collect();

            let writes = values.iter().cloned().map(|value| {
                let storage = Arc::clone(&storage);
                tokio::spawn(async move { storage.set("cachedHazards", &value).await })
            });
            for result in futures::future::join_all(writes).await {
                result.unwrap().expect("concurrent set");
            }

            // The entry holds exactly one writer's value
            let stored = storage.get("cachedHazards").await.unwrap().expect("entry");
            assert!(values.contains(&stored), "mixed entry: {}", stored);
        }

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_file_storage_rejects_path_keys() {
        let dir = temp_dir("bad-key");
        let storage = FileStorage::new(dir.clone()).expect("create storage");
        let err = storage.set("../escape", "x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert!(storage.get("").await.is_err());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").await.unwrap(), None);
        storage.set("k", "v1").await.unwrap();
        storage.set("k", "v2").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v2"));
        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
    }
}
