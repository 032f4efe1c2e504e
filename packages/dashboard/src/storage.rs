//! Durable client storage.
//!
//! A flat string key/value store in the spirit of browser local storage.
//! Components never see the whole store: they are handed a [`Slot`] bound to
//! the single key they own.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::error::Result;

/// Credential token.
pub const TOKEN_KEY: &str = "token";
/// Locally persisted feedback list.
pub const FEEDBACK_KEY: &str = "feedback";
/// Changelog entries added from the dashboard.
pub const CHANGELOG_KEY: &str = "changelog_user_entries";

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Process-lifetime storage.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Storage persisted as one JSON object in a file, rewritten on every change.
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => HashMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened file storage");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let raw = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }
}

/// One key of a [`Storage`], owned by a single component.
///
/// Clones share one update lock, so [`Slot::update_json`] cycles never
/// interleave.
#[derive(Clone)]
pub struct Slot {
    storage: Arc<dyn Storage>,
    key: &'static str,
    updates: Arc<Mutex<()>>,
}

impl Slot {
    pub fn new(storage: Arc<dyn Storage>, key: &'static str) -> Self {
        Self {
            storage,
            key,
            updates: Arc::new(Mutex::new(())),
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub async fn get(&self) -> Result<Option<String>> {
        self.storage.get(self.key).await
    }

    pub async fn set(&self, value: &str) -> Result<()> {
        self.storage.set(self.key, value).await
    }

    pub async fn remove(&self) -> Result<()> {
        self.storage.remove(self.key).await
    }

    /// Decode the stored JSON. Missing, unreadable or corrupt values read as
    /// `T::default()`.
    pub async fn read_json<T>(&self) -> T
    where
        T: DeserializeOwned + Default,
    {
        let raw = match self.get().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(e) => {
                tracing::warn!(key = self.key, error = %e, "Failed to read storage");
                return T::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(key = self.key, error = %e, "Ignoring corrupt stored value");
            T::default()
        })
    }

    pub async fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(&raw).await
    }

    /// Read, modify and write back the stored JSON as one step. Concurrent
    /// updates through this slot run one after another.
    pub async fn update_json<T, F, R>(&self, apply: F) -> Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> R,
    {
        let _update = self.updates.lock().await;
        let mut value: T = self.read_json().await;
        let out = apply(&mut value);
        self.write_json(&value).await?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slot_reads_default_for_missing_and_corrupt_values() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let slot = Slot::new(storage.clone(), FEEDBACK_KEY);

        let empty: Vec<String> = slot.read_json().await;
        assert!(empty.is_empty());

        storage.set(FEEDBACK_KEY, "{not json").await.unwrap();
        let corrupt: Vec<String> = slot.read_json().await;
        assert!(corrupt.is_empty());

        slot.write_json(&vec!["a".to_string()]).await.unwrap();
        let stored: Vec<String> = slot.read_json().await;
        assert_eq!(stored, vec!["a".to_string()]);
    }

    /// Yields between reading and writing so overlapping updates interleave.
    struct SlowStorage {
        inner: MemoryStorage,
    }

    #[async_trait]
    impl Storage for SlowStorage {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let value = self.inner.get(key).await;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            value
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn overlapping_updates_keep_every_change() {
        let storage: Arc<dyn Storage> = Arc::new(SlowStorage {
            inner: MemoryStorage::new(),
        });
        let slot = Slot::new(storage, FEEDBACK_KEY);
        let other = slot.clone();

        let (a, b) = tokio::join!(
            slot.update_json(|list: &mut Vec<String>| list.push("a".to_string())),
            other.update_json(|list: &mut Vec<String>| list.push("b".to_string())),
        );
        a.unwrap();
        b.unwrap();

        let mut stored: Vec<String> = slot.read_json().await;
        stored.sort();
        assert_eq!(stored, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn slots_do_not_see_each_other() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let token = Slot::new(storage.clone(), TOKEN_KEY);
        let changelog = Slot::new(storage, CHANGELOG_KEY);

        token.set("abc").await.unwrap();
        assert_eq!(changelog.get().await.unwrap(), None);

        token.remove().await.unwrap();
        assert_eq!(token.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let storage = FileStorage::open(&path).await.unwrap();
        storage.set(TOKEN_KEY, "token-7").await.unwrap();
        storage.set(FEEDBACK_KEY, "[]").await.unwrap();
        storage.remove(FEEDBACK_KEY).await.unwrap();
        drop(storage);

        let reopened = FileStorage::open(&path).await.unwrap();
        assert_eq!(reopened.get(TOKEN_KEY).await.unwrap().as_deref(), Some("token-7"));
        assert_eq!(reopened.get(FEEDBACK_KEY).await.unwrap(), None);
    }
}
