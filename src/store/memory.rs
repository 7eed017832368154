//! In-process stores for development and tests

use super::{ApplyFn, CasOutcome, KvStore, ObjectStore, StoreResult, StoredObject, Versioned};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Debug, Default)]
pub struct MemoryKvStore(Arc<RwLock<HashMap<String, Versioned>>>);

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Versioned>> {
        Ok(self.0.read().await.get(key).cloned())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<i64>,
        value: Value,
    ) -> StoreResult<CasOutcome> {
        let mut guard = self.0.write().await;
        let current = guard.get(key).map(|entry| entry.version);

        if current != expected {
            return Ok(CasOutcome::Conflict);
        }

        guard.insert(
            key.to_string(),
            Versioned {
                value,
                version: current.unwrap_or(0) + 1,
            },
        );

        Ok(CasOutcome::Updated)
    }

    async fn put(&self, key: &str, value: Value) -> StoreResult<()> {
        let mut guard = self.0.write().await;
        let version = guard.get(key).map_or(0, |entry| entry.version) + 1;
        guard.insert(key.to_string(), Versioned { value, version });
        Ok(())
    }

    /// Runs `apply` under the write lock, so it never retries
    async fn update(&self, key: &str, apply: &mut ApplyFn<'_>) -> StoreResult<Value> {
        let mut guard = self.0.write().await;
        let (current, version) = match guard.get(key) {
            Some(entry) => (Some(entry.value.clone()), entry.version),
            None => (None, 0),
        };

        let next = apply(current)?;
        guard.insert(
            key.to_string(),
            Versioned {
                value: next.clone(),
                version: version + 1,
            },
        );
        Ok(next)
    }
}

#[cfg(test)]
pub use yielding::YieldingKvStore;


#[derive(Clone, Debug, Default)]
pub struct MemoryObjectStore(Arc<RwLock<HashMap<String, StoredObject>>>);

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, object: StoredObject) -> StoreResult<()> {
        self.0.write().await.insert(key.to_string(), object);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        Ok(self.0.read().await.get(key).cloned())
    }
}
