//! One JSON document per key under a directory
//!
//! Writes go to a temporary sibling file that is renamed over the target, so
//! a crash mid-write leaves either the previous document or the new one.

use super::{DurableStore, StorageError};
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Readable prefix length kept from the original key
const MAX_STEM_LEN: usize = 64;

#[derive(Debug)]
pub struct FileStore {
    directory: PathBuf,
    write_counter: AtomicU64,
}

impl FileStore {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            write_counter: AtomicU64::new(0),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Filesystem-safe file for `key`
    ///
    /// Unsafe characters become `_`; a digest of the raw key keeps distinct
    /// keys apart after sanitizing.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let stem: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .take(MAX_STEM_LEN)
            .collect();
        let digest = hex::encode(Sha256::digest(key.as_bytes()));

        self.directory.join(format!("{stem}-{}.json", &digest[..8]))
    }

    fn temp_path_for(&self, target: &Path) -> PathBuf {
        let sequence = self.write_counter.fetch_add(1, Ordering::Relaxed);
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.{sequence}.tmp", std::process::id()));
        target.with_file_name(name)
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(key, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::serialization(key, e))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| StorageError::io(key, e))?;

        let bytes = serde_json::to_vec(&value).map_err(|e| StorageError::serialization(key, e))?;
        let target = self.path_for(key);
        let temp = self.temp_path_for(&target);

        if let Err(e) = tokio::fs::write(&temp, &bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::io(key, e));
        }
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::io(key, e));
        }

        debug!(key = %key, path = %target.display(), bytes = bytes.len(), "Stored document");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
