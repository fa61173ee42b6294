//! Local key-value store abstraction
//!
//! Mirrors the browser storage contract: string keys, string values, finite
//! capacity. A write that would exceed capacity fails with
//! [`LocalStoreError::QuotaExceeded`] and leaves the previous value in place.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

/// Default byte budget (5 MiB)
pub const DEFAULT_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

/// Local store errors
#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("Storage quota exceeded: {required} bytes required, capacity {capacity}")]
    QuotaExceeded { required: usize, capacity: usize },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl LocalStoreError {
    pub fn is_quota(&self) -> bool {
        matches!(self, LocalStoreError::QuotaExceeded { .. })
    }
}

impl From<sqlx::Error> for LocalStoreError {
    fn from(e: sqlx::Error) -> Self {
        LocalStoreError::Backend(e.to_string())
    }
}

/// Namespaced string key-value store
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

    async fn remove(&self, key: &str) -> Result<(), LocalStoreError>;
}

/// Bytes a single entry counts against capacity
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// In-process store used by tests and ephemeral runs
#[derive(Debug)]
pub struct MemoryLocalStore {
    entries: Mutex<HashMap<String, String>>,
    capacity: usize,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY_BYTES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Pre-populate a key, bypassing the quota check
    pub async fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }

    pub async fn used_bytes(&self) -> usize {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum()
    }
}

impl Default for MemoryLocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut entries = self.entries.lock().await;

        let others: usize = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| entry_size(k, v))
            .sum();
        let required = others + entry_size(key, value);
        if required > self.capacity {
            return Err(LocalStoreError::QuotaExceeded {
                required,
                capacity: self.capacity,
            });
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_get_set_remove() {
        let store = MemoryLocalStore::new();
        assert_eq!(store.get("sms_students").await.unwrap(), None);

        store.set("sms_students", "[]").await.unwrap();
        assert_eq!(store.get("sms_students").await.unwrap().as_deref(), Some("[]"));

        store.remove("sms_students").await.unwrap();
        assert_eq!(store.get("sms_students").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_quota_keeps_previous_value() {
        let store = MemoryLocalStore::with_capacity(20);
        store.set("k", "small").await.unwrap();

        let err = store.set("k", "this value is far too large").await.unwrap_err();
        assert!(err.is_quota());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("small"));
    }

    #[tokio::test]
    async fn test_memory_store_overwrite_does_not_double_count() {
        // 1 + 9 = 10 bytes, exactly at capacity
        let store = MemoryLocalStore::with_capacity(10);
        store.set("k", "123456789").await.unwrap();
        store.set("k", "987654321").await.unwrap();
        assert_eq!(store.used_bytes().await, 10);
    }
}
