use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable string key/value store holding the persisted progress records.
///
/// Values are opaque UTF-8 text; the ledger stores JSON documents under keys
/// such as `bookmarks:private`.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
}

/// Simple in-memory store for tests and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Storage handles behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub preferences: Arc<dyn PreferenceStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            preferences: Arc::new(InMemoryStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_round_trips_values() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("bookmarks:private").await.unwrap(), None);

        store
            .set("bookmarks:private", r#"{"1":[0]}"#.to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get("bookmarks:private").await.unwrap().as_deref(),
            Some(r#"{"1":[0]}"#)
        );

        store.set("bookmarks:private", "{}".to_string()).await.unwrap();
        assert_eq!(
            store.get("bookmarks:private").await.unwrap().as_deref(),
            Some("{}")
        );
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::new();
        let other = store.clone();
        store.set("k", "v".into()).await.unwrap();
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
