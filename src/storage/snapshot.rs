//! Failure-absorbing snapshot adapter over a [`DurableStore`]
//!
//! Snapshots are stored as `{ "value": ..., "saved_at": ... }` under
//! `snapshot:{key}` so a served fallback can report its age. Every backend
//! or decoding failure becomes a `StorageReadFailed` / `StorageWriteFailed`
//! event and a "nothing there" result.

use super::{SharedStore, StorageError};
use crate::constants::storage::SNAPSHOT_KEY_PREFIX;
use crate::events::{tracing_observer, ResilienceEvent, SharedObserver};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A persisted last-known-good value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord<T> {
    pub value: T,
    pub saved_at: DateTime<Utc>,
}

impl<T> SnapshotRecord<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            saved_at: Utc::now(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.saved_at
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    store: SharedStore,
    observer: SharedObserver,
}

impl SnapshotStore {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            observer: tracing_observer(),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn backend(&self) -> &SharedStore {
        &self.store
    }

    fn storage_key(key: &str) -> String {
        format!("{SNAPSHOT_KEY_PREFIX}{key}")
    }

    /// Last snapshot for `key`, or `None` when absent or unreadable
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<SnapshotRecord<T>> {
        let storage_key = Self::storage_key(key);
        let raw = match self.store.get(&storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "No durable snapshot");
                return None;
            }
            Err(error) => {
                self.report_read_failure(key, &error);
                return None;
            }
        };

        match serde_json::from_value::<SnapshotRecord<T>>(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                self.report_read_failure(key, &StorageError::serialization(&storage_key, e));
                None
            }
        }
    }

    /// Persist `value` as the latest snapshot; returns whether it was written
    pub async fn save<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let storage_key = Self::storage_key(key);
        let record = SnapshotRecord::new(value);

        let document = match serde_json::to_value(&record) {
            Ok(document) => document,
            Err(e) => {
                self.report_write_failure(key, &StorageError::serialization(&storage_key, e));
                return false;
            }
        };

        match self.store.set(&storage_key, document).await {
            Ok(()) => true,
            Err(error) => {
                self.report_write_failure(key, &error);
                false
            }
        }
    }

    fn report_read_failure(&self, key: &str, error: &StorageError) {
        self.observer.on_event(&ResilienceEvent::StorageReadFailed {
            key: key.to_string(),
            error: error.to_string(),
        });
    }

    fn report_write_failure(&self, key: &str, error: &StorageError) {
        self.observer.on_event(&ResilienceEvent::StorageWriteFailed {
            key: key.to_string(),
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingObserver;
    use crate::storage::{DurableStore, InMemoryStore};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait]
    impl DurableStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Value>, StorageError> {
            Err(StorageError::Unavailable("disk detached".to_string()))
        }

        async fn set(&self, _key: &str, _value: Value) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk detached".to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<bool, StorageError> {
            Err(StorageError::Unavailable("disk detached".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_save_then_load_uses_prefixed_key() {
        let backend = Arc::new(InMemoryStore::new());
        let snapshots = SnapshotStore::new(backend.clone());

        assert!(snapshots.save("tasks:default", &vec!["a", "b"]).await);
        assert!(backend.contains_key("snapshot:tasks:default"));

        let record: SnapshotRecord<Vec<String>> = snapshots.load("tasks:default").await.unwrap();
        assert_eq!(record.value, vec!["a".to_string(), "b".to_string()]);
        assert!(record.age(Utc::now()) >= chrono::Duration::zero());
    }

    #[tokio::test]
    async fn test_backend_failures_are_absorbed_and_reported() {
        let observer = RecordingObserver::shared();
        let snapshots = SnapshotStore::new(Arc::new(BrokenStore)).with_observer(observer.clone());

        assert!(!snapshots.save("items:default", &json!({"x": 1})).await);
        assert!(snapshots.load::<Value>("items:default").await.is_none());

        assert_eq!(
            observer.count(|e| matches!(e, ResilienceEvent::StorageWriteFailed { .. })),
            1
        );
        assert_eq!(
            observer.count(|e| matches!(e, ResilienceEvent::StorageReadFailed { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_undecodable_snapshot_is_reported_as_read_failure() {
        let observer = RecordingObserver::shared();
        let backend = Arc::new(InMemoryStore::new());
        backend
            .set("snapshot:maps:default", json!({"unexpected": true}))
            .await
            .unwrap();
        let snapshots = SnapshotStore::new(backend).with_observer(observer.clone());

        assert!(snapshots.load::<Value>("maps:default").await.is_none());
        assert_eq!(observer.warnings().len(), 1);
    }
}
