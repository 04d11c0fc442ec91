//! The [`KvStore`] trait: the persistence substrate the host supplies.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::KvResult;

/// Asynchronous key-value substrate holding JSON documents.
///
/// Implementations must satisfy these invariants:
/// - `set` is atomic: either every entry is written or none is.
/// - A write that would exceed a capacity limit fails with
///   [`KvError::CapacityExceeded`](crate::KvError::CapacityExceeded) and
///   leaves the store unchanged.
/// - Removing an absent key is not an error.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the given keys, or every key when `keys` is `None`.
    ///
    /// Absent keys are simply missing from the returned map.
    async fn get(&self, keys: Option<&[String]>) -> KvResult<BTreeMap<String, Value>>;

    /// Write (create or replace) all entries.
    async fn set(&self, entries: BTreeMap<String, Value>) -> KvResult<()>;

    /// Remove the given keys.
    async fn remove(&self, keys: &[String]) -> KvResult<()>;

    /// Read a single key.
    async fn get_one(&self, key: &str) -> KvResult<Option<Value>> {
        let keys = [key.to_string()];
        let mut found = self.get(Some(&keys)).await?;
        Ok(found.remove(key))
    }

    /// Every entry whose key starts with `prefix`, sorted by key.
    async fn scan_prefix(&self, prefix: &str) -> KvResult<BTreeMap<String, Value>> {
        let mut all = self.get(None).await?;
        all.retain(|k, _| k.starts_with(prefix));
        Ok(all)
    }
}
