use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{KvError, KvResult};
use crate::traits::KvStore;

/// In-memory key-value substrate.
///
/// Intended for tests and embedding. Entries live in a `BTreeMap` behind a
/// `RwLock`. An optional quota bounds the total size of keys plus their
/// serialized values, mirroring the limits of browser extension storage.
pub struct InMemoryKvStore {
    entries: RwLock<BTreeMap<String, Value>>,
    quota: Option<u64>,
}

impl InMemoryKvStore {
    /// Create an empty, unbounded store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: None,
        }
    }

    /// Create an empty store that rejects writes beyond `quota` bytes.
    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: Some(quota),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes currently counted against the quota.
    pub fn used_bytes(&self) -> KvResult<u64> {
        let map = self.read_lock()?;
        total_size(&map)
    }

    fn read_lock(&self) -> KvResult<std::sync::RwLockReadGuard<'_, BTreeMap<String, Value>>> {
        self.entries
            .read()
            .map_err(|e| KvError::Backend(format!("lock poisoned: {e}")))
    }

    fn write_lock(&self) -> KvResult<std::sync::RwLockWriteGuard<'_, BTreeMap<String, Value>>> {
        self.entries
            .write()
            .map_err(|e| KvError::Backend(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvStore")
            .field("key_count", &self.len())
            .field("quota", &self.quota)
            .finish()
    }
}

/// Bytes an entry counts against a quota: key plus compact JSON value.
pub(crate) fn entry_size(key: &str, value: &Value) -> KvResult<u64> {
    let encoded =
        serde_json::to_vec(value).map_err(|e| KvError::Serialization(e.to_string()))?;
    Ok((key.len() + encoded.len()) as u64)
}

pub(crate) fn total_size(map: &BTreeMap<String, Value>) -> KvResult<u64> {
    map.iter().map(|(k, v)| entry_size(k, v)).sum()
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, keys: Option<&[String]>) -> KvResult<BTreeMap<String, Value>> {
        let map = self.read_lock()?;
        Ok(match keys {
            None => map.clone(),
            Some(keys) => keys
                .iter()
                .filter_map(|k| map.get(k).map(|v| (k.clone(), v.clone())))
                .collect(),
        })
    }

    async fn set(&self, entries: BTreeMap<String, Value>) -> KvResult<()> {
        let mut map = self.write_lock()?;
        if let Some(limit) = self.quota {
            let mut projected = map.clone();
            projected.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
            let required = total_size(&projected)?;
            if required > limit {
                return Err(KvError::CapacityExceeded { required, limit });
            }
        }
        map.extend(entries);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> KvResult<()> {
        let mut map = self.write_lock()?;
        for key in keys {
            map.remove(key);
        }
        Ok(())
    }
}
