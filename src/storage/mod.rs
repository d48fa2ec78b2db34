//! # Durable Storage
//!
//! Key-value persistence that survives restarts, used only as the last-resort
//! source of data when the live fetch path fails.
//!
//! Backends implement [`DurableStore`] and report failures as
//! [`StorageError`]. Callers in the data path never see those errors: the
//! [`SnapshotStore`] adapter absorbs them, reports them to the observer and
//! degrades to "no snapshot available".

pub mod file;
pub mod memory;
pub mod snapshot;

use crate::config::{StorageBackend, StorageConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub use file::FileStore;
pub use memory::InMemoryStore;
pub use snapshot::{SnapshotRecord, SnapshotStore};

/// Durable storage backend failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("I/O error for key '{key}': {message}")]
    Io { key: String, message: String },

    #[error("Stored value for key '{key}' is not valid JSON: {message}")]
    Serialization { key: String, message: String },

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn io(key: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Io {
            key: key.into(),
            message: error.to_string(),
        }
    }

    pub fn serialization(key: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Serialization {
            key: key.into(),
            message: error.to_string(),
        }
    }
}

/// Asynchronous durable key-value store holding JSON documents
#[async_trait]
pub trait DurableStore: Send + Sync + std::fmt::Debug {
    /// `Ok(None)` when nothing is stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Returns whether a value was removed
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;

    fn backend_name(&self) -> &'static str;
}

/// Shared store handle
pub type SharedStore = Arc<dyn DurableStore>;

/// Construct the backend selected in configuration
pub fn store_from_config(config: &StorageConfig) -> SharedStore {
    match config.backend {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::File => Arc::new(FileStore::new(&config.directory)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_from_config_selects_backend() {
        let memory = store_from_config(&StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        });
        assert_eq!(memory.backend_name(), "memory");

        let file = store_from_config(&StorageConfig::default());
        assert_eq!(file.backend_name(), "file");
    }
}
