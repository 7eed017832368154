//! Storage contracts and implementations
//!
//! ## Key-value store
//!
//! JSON documents with a version counter. Writers go through
//! [`KvStore::update`], which applies a change atomically. Backends without a
//! native lock fall back to [`KvStore::compare_and_swap`] in a retry loop: a
//! concurrent writer bumps the version and makes the swap fail instead of
//! being overwritten.
//!
//! ```text
//! paper:{paperId}        → PaperRecord
//! daily:{YYYY-MM-DD}     → DailyAggregate
//! journal:stats          → JournalStats
//! author:{lowercased}    → AuthorStats
//! ```
//!
//! ## Object store
//!
//! Binary objects with a content type and string metadata, keyed by paths
//! such as `submissions/{submissionId}/paper.pdf`.

mod fs;
mod memory;
mod postgres;

pub use fs::FsObjectStore;
pub use memory::{MemoryKvStore, MemoryObjectStore};
#[cfg(test)]
pub use memory::YieldingKvStore;
pub use postgres::PgKvStore;

use async_trait::async_trait;
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Attempts made by the compare-and-swap loop before giving up on a key
pub const MAX_CAS_ATTEMPTS: usize = 32;

const CAS_BACKOFF_BASE_MS: u64 = 1;
const CAS_BACKOFF_CAP_MS: u64 = 50;

/// Change applied by [`KvStore::update`]: current document (if any) in, new document out
pub type ApplyFn<'a> = dyn FnMut(Option<Value>) -> StoreResult<Value> + Send + 'a;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend failure: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Key '{key}' still contended after {attempts} attempts")]
    Contention { key: String, attempts: usize },
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        StoreError::Backend(error.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        StoreError::Backend(error.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A stored JSON document and the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub value: Value,
    pub version: i64,
}

/// Result of a compare-and-swap write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The stored version matched and the document was replaced
    Updated,
    /// Another writer got there first
    Conflict,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Versioned>>;

    /// Write `value` only if the stored version still equals `expected`
    /// (`None` meaning the key must not exist yet)
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<i64>,
        value: Value,
    ) -> StoreResult<CasOutcome>;

    /// Unconditional write
    async fn put(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Atomic read-modify-write. `apply` may run more than once.
    async fn update(&self, key: &str, apply: &mut ApplyFn<'_>) -> StoreResult<Value> {
        cas_update(self, key, apply).await
    }
}

/// Full-jitter exponential backoff for the given attempt
fn cas_backoff(attempt: usize) -> Duration {
    let ceiling = (CAS_BACKOFF_BASE_MS << attempt.min(6)).min(CAS_BACKOFF_CAP_MS);
    Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
}

/// Compare-and-swap retry loop behind the default [`KvStore::update`]
pub async fn cas_update<S>(kv: &S, key: &str, apply: &mut ApplyFn<'_>) -> StoreResult<Value>
where
    S: KvStore + ?Sized,
{
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let (current, expected) = match kv.get(key).await? {
            Some(entry) => (Some(entry.value), Some(entry.version)),
            None => (None, None),
        };

        let next = apply(current)?;

        match kv.compare_and_swap(key, expected, next.clone()).await? {
            CasOutcome::Updated => return Ok(next),
            CasOutcome::Conflict => {
                tracing::debug!(key, attempt, "Compare-and-swap conflict, retrying");
                tokio::time::sleep(cas_backoff(attempt)).await;
            }
        }
    }

    Err(StoreError::Contention {
        key: key.to_string(),
        attempts: MAX_CAS_ATTEMPTS,
    })
}

/// Stored binary object
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub metadata: BTreeMap<String, String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, object: StoredObject) -> StoreResult<()>;

    async fn get(&self, key: &str) -> StoreResult<Option<StoredObject>>;
}

/// Read a typed document, returning `None` when absent
pub async fn get_json<T: DeserializeOwned>(kv: &dyn KvStore, key: &str) -> StoreResult<Option<T>> {
    match kv.get(key).await? {
        Some(entry) => Ok(Some(serde_json::from_value(entry.value)?)),
        None => Ok(None),
    }
}

/// Read-modify-write a typed document through [`KvStore::update`].
///
/// `apply` may run more than once; it must only depend on the document it
/// is handed.
pub async fn update_json<T, F>(kv: &dyn KvStore, key: &str, mut apply: F) -> StoreResult<T>
where
    T: DeserializeOwned + Serialize + Default + Send,
    F: FnMut(&mut T) + Send,
{
    let updated = kv
        .update(key, &mut |current: Option<Value>| -> StoreResult<Value> {
            let mut doc = match current {
                Some(value) => serde_json::from_value::<T>(value)?,
                None => T::default(),
            };
            apply(&mut doc);
            Ok(serde_json::to_value(&doc)?)
        })
        .await?;

    Ok(serde_json::from_value(updated)?)
}
