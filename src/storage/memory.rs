//! Process-local store for tests and ephemeral sessions

use super::{DurableStore, StorageError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: DashMap<String, Value>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.values.remove(key).is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
