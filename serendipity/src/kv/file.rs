//! File-backed key-value store.
//!
//! Each key maps to one file inside a state directory. Writes go to a
//! temporary sibling first and are renamed into place, so a crash mid-write
//! leaves either the old value or the new one.

use std::path::{Path, PathBuf};

use super::traits::{BoxFuture, KeyValueStore, KvError};

/// Extension appended to key names on disk.
const VALUE_EXTENSION: &str = "json";

/// Key-value store persisting each key as a file.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    directory: PathBuf,
}

impl FileKeyValueStore {
    /// Create a store rooted at `directory`.
    ///
    /// The directory is created lazily on the first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// The state directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Resolve the on-disk path for a key.
    fn path_for(&self, key: &str) -> Result<PathBuf, KvError> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\'])
            && !key.contains('\0');
        if !valid {
            return Err(KvError::InvalidKey(key.to_string()));
        }
        Ok(self.directory.join(format!("{}.{}", key, VALUE_EXTENSION)))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, KvError>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.path_for(&key)?;
            match tokio::fs::read(&path).await {
                Ok(bytes) => String::from_utf8(bytes)
                    .map(Some)
                    .map_err(|_| KvError::NotUtf8 { key }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'_, Result<(), KvError>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.path_for(&key)?;
            tokio::fs::create_dir_all(&self.directory).await?;

            let tmp_path = path.with_extension(format!("{}.tmp", VALUE_EXTENSION));
            tokio::fs::write(&tmp_path, value.as_bytes()).await?;
            tokio::fs::rename(&tmp_path, &path).await?;

            tracing::trace!(key = %key, bytes = value.len(), "Persisted value");
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<(), KvError>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.path_for(&key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}
