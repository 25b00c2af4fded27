//! Key-to-file JSON persistence.
//!
//! Each storage key maps to `<key>.json` in the data directory. Reads
//! are synchronous; a missing or unparsable file degrades to the type's
//! default value (corruption is logged, never surfaced to the caller).
//! Writes go through tokio's async fs so the entry store can persist
//! without blocking its execution context.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// JSON file store rooted at a directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Store rooted at the default data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be resolved or
    /// created.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            root: super::data_dir()?,
        })
    }

    /// Store rooted at a specific directory (for testing).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File backing a storage key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Read a key, returning `T::default()` when the file is missing or
    /// unreadable.
    pub fn read_or_default<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path_for(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return T::default(),
        };

        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "unreadable storage file; starting empty");
                T::default()
            }
        }
    }

    /// Persist a value under a key as pretty-printed JSON.
    pub async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(value)?;
        tokio::fs::write(self.path_for(key), data)
            .await
            .map_err(|source| StoreError::Persist {
                key: key.to_string(),
                source,
            })?;
        Ok(())
    }
}
