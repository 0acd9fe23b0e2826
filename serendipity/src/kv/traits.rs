//! Key-value persistence interface.
//!
//! The preference store keeps its whole collection as one string value under
//! a single key, so the interface only needs `get`, `set` and `remove`.
//!
//! # Design Principles
//!
//! - **String keys and values**: the store serializes to JSON itself
//! - **Minimal interface**: no listing, no TTL, no eviction
//! - **Dyn-compatible**: uses `Pin<Box<dyn Future>>` so callers can hold
//!   `Arc<dyn KeyValueStore>`
//!
//! # Example
//!
//! ```ignore
//! use serendipity::kv::{KeyValueStore, MemoryKeyValueStore};
//!
//! let store = MemoryKeyValueStore::new();
//! store.set("pin_preferences", "{}".to_string()).await?;
//! let value = store.get("pin_preferences").await?;
//! ```

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Errors that can occur during key-value operations.
#[derive(Debug, Error)]
pub enum KvError {
    /// I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key cannot be mapped to storage (empty or contains path separators).
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    /// Stored bytes are not valid UTF-8.
    #[error("Value for key {key:?} is not valid UTF-8")]
    NotUtf8 { key: String },
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistent string key-value storage.
///
/// Implementations must be `Send + Sync` for use across async tasks.
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))` if the key exists
    /// - `Ok(None)` if the key is not found
    /// - `Err(_)` if the backing storage failed
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, KvError>>;

    /// Store a value, replacing any existing one.
    fn set(&self, key: &str, value: String) -> BoxFuture<'_, Result<(), KvError>>;

    /// Delete a value by key.
    ///
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> BoxFuture<'_, Result<(), KvError>>;
}
