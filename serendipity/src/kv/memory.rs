//! In-memory key-value store using dashmap.
//!
//! Nothing survives the process. Used in tests and when no state directory
//! is configured.

use dashmap::DashMap;

use super::traits::{BoxFuture, KeyValueStore, KvError};

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, String>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, KvError>> {
        let value = self.entries.get(key).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'_, Result<(), KvError>> {
        self.entries.insert(key.to_string(), value);
        Box::pin(async { Ok(()) })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<(), KvError>> {
        self.entries.remove(key);
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_memory_store_set_and_get() {
        let store = MemoryKeyValueStore::new();
        store.set("key", "value".to_string()).await.unwrap();

        let value = store.get("key").await.unwrap();
        assert_eq!(value.as_deref(), Some("value"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_get_missing() {
        let store = MemoryKeyValueStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_replace_and_remove() {
        let store = MemoryKeyValueStore::new();
        store.set("key", "one".to_string()).await.unwrap();
        store.set("key", "two".to_string()).await.unwrap();
        assert_eq!(store.get("key").await.unwrap().as_deref(), Some("two"));

        store.remove("key").await.unwrap();
        assert!(store.get("key").await.unwrap().is_none());

        // Removing again is fine
        store.remove("key").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_as_trait_object() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        store.set("a", "1".to_string()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
    }
}
