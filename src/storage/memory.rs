use async_trait::async_trait;
use log::warn;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{KeyValueStore, StoreResult, UpdateFn};
use crate::types::StoreError;

/// Process-local store; contents are lost on restart
pub struct MemoryStore {
    data: Arc<RwLock<BTreeMap<String, Value>>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: every call fails with `StoreError::Unavailable`
    pub fn set_available(&self, available: bool) {
        if !available {
            warn!("Memory store marked unavailable");
        }
        self.available.store(available, Ordering::Relaxed);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.ensure_available()?;
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        self.ensure_available()?;
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.ensure_available()?;
        Ok(self.data.write().await.remove(key).is_some())
    }

    async fn list_by_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Value)>> {
        self.ensure_available()?;
        let data = self.data.read().await;
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn update(&self, key: &str, apply: UpdateFn) -> StoreResult<Value> {
        self.ensure_available()?;
        let mut data = self.data.write().await;
        let updated = apply(data.get(key).cloned())?;
        data.insert(key.to_string(), updated.clone());
        Ok(updated)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_by_prefix_only_returns_matching_keys() {
        let store = MemoryStore::new();
        store.set("warnings/1/10", json!([1])).await.unwrap();
        store.set("warnings/1/11", json!([1, 2])).await.unwrap();
        store.set("warnings/2/10", json!([])).await.unwrap();
        store.set("afk/10", json!({})).await.unwrap();

        let listed = store.list_by_prefix("warnings/1/").await.unwrap();
        let keys: Vec<&str> = listed.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["warnings/1/10", "warnings/1/11"]);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set("a", json!(1)).await.unwrap();
        store.set_available(false);

        assert!(matches!(store.get("a").await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.set("a", json!(2)).await, Err(StoreError::Unavailable(_))));

        store.set_available(true);
        assert_eq!(store.get("a").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_failed_update_leaves_value_untouched() {
        let store = MemoryStore::new();
        store.set("k", json!("before")).await.unwrap();

        let result = store
            .update("k", Box::new(|_| Err(StoreError::Unavailable("boom".to_string()))))
            .await;
        assert!(result.is_err());
        assert_eq!(store.get("k").await.unwrap(), Some(json!("before")));
    }
}
