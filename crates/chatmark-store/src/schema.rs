use std::collections::BTreeMap;
use std::sync::Arc;

use chatmark_types::{Annotation, Collection};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{KvError, StoreError, StoreResult};
use crate::key::{CollectionKey, CollectionKeys};
use crate::migrate::{migrate, normalize};
use crate::traits::KvStore;

/// What a successful save wrote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveReport {
    pub key: CollectionKey,
    /// Size of the serialized collection.
    pub bytes: u64,
    /// The collection is larger than the configured soft limit. The write
    /// succeeded, but the host should suggest exporting or pruning.
    pub over_soft_limit: bool,
}

/// Versioned read/write of collections over a [`KvStore`].
///
/// Cheap to clone; clones share the same substrate.
#[derive(Clone)]
pub struct SchemaStore {
    kv: Arc<dyn KvStore>,
    keys: CollectionKeys,
    soft_limit_bytes: u64,
}

impl SchemaStore {
    pub fn new(kv: Arc<dyn KvStore>, config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self {
            kv,
            keys: CollectionKeys::from_config(config)?,
            soft_limit_bytes: config.soft_limit_bytes,
        })
    }

    /// Key derivation for this store's namespace.
    pub fn keys(&self) -> &CollectionKeys {
        &self.keys
    }

    /// The underlying substrate.
    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// Read the collection stored under `key`, normalized to the versioned
    /// envelope but not migrated.
    ///
    /// An absent key yields an empty current-version collection.
    pub async fn load_raw(&self, key: &CollectionKey) -> StoreResult<Collection> {
        match self.kv.get_one(key.as_str()).await? {
            None => Ok(Collection::empty()),
            Some(value) => self.decode(key, value),
        }
    }

    /// Read and migrate the collection stored under `key`.
    ///
    /// Migration happens in memory only; storage is rewritten by the next
    /// [`save`](Self::save).
    pub async fn load(&self, key: &CollectionKey) -> StoreResult<Collection> {
        let collection = self.load_raw(key).await?;
        Ok(migrate(collection))
    }

    /// Persist `annotations` under `key` in a current-version envelope.
    ///
    /// Records already stored under `key` that cannot be decoded are appended
    /// to the envelope unchanged, so a save never discards them.
    pub async fn save(
        &self,
        key: &CollectionKey,
        annotations: &[Annotation],
    ) -> StoreResult<SaveReport> {
        let carried = self.unreadable_records(key).await?;
        let envelope = Collection::new(annotations.to_vec());
        let mut value =
            serde_json::to_value(&envelope).map_err(|e| StoreError::Serialization(e.to_string()))?;
        if !carried.is_empty() {
            debug!(key = %key, count = carried.len(), "carrying undecodable records forward");
            if let Some(Value::Array(records)) = value.get_mut("annotations") {
                records.extend(carried);
            }
        }
        let bytes = serde_json::to_vec(&value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?
            .len() as u64;

        let over_soft_limit = bytes > self.soft_limit_bytes;
        if over_soft_limit {
            warn!(
                key = %key,
                bytes,
                soft_limit = self.soft_limit_bytes,
                "collection is over the soft size limit"
            );
        }

        let entries = BTreeMap::from([(key.as_str().to_string(), value)]);
        match self.kv.set(entries).await {
            Ok(()) => {}
            Err(KvError::CapacityExceeded { required, limit }) => {
                warn!(key = %key, required, limit, "storage quota exceeded");
                return Err(StoreError::CapacityExceeded {
                    key: key.to_string(),
                    required,
                    limit,
                });
            }
            Err(e) => {
                warn!(key = %key, error = %e, "collection write failed");
                return Err(e.into());
            }
        }

        debug!(key = %key, count = annotations.len(), bytes, "collection saved");
        Ok(SaveReport {
            key: key.clone(),
            bytes,
            over_soft_limit,
        })
    }

    /// Remove one collection. An absent key is not an error.
    pub async fn delete(&self, key: &CollectionKey) -> StoreResult<()> {
        self.delete_many(std::slice::from_ref(key)).await
    }

    /// Remove several collections at once.
    pub async fn delete_many(&self, keys: &[CollectionKey]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let raw: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();
        self.kv.remove(&raw).await?;
        debug!(count = keys.len(), "collections deleted");
        Ok(())
    }

    /// Every collection in this namespace, normalized and migrated in memory,
    /// sorted by key. Entries that cannot be decoded are skipped.
    pub async fn enumerate(&self) -> StoreResult<Vec<(CollectionKey, Collection)>> {
        let entries = self.kv.scan_prefix(self.keys.prefix()).await?;
        let mut out = Vec::with_capacity(entries.len());
        for (raw_key, value) in entries {
            let key = CollectionKey::new(raw_key);
            match self.decode(&key, value) {
                Ok(collection) => out.push((key, migrate(collection))),
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable collection"),
            }
        }
        Ok(out)
    }

    /// Every namespaced key currently stored.
    pub async fn list_keys(&self) -> StoreResult<Vec<CollectionKey>> {
        let entries = self.kv.scan_prefix(self.keys.prefix()).await?;
        Ok(entries.into_keys().map(CollectionKey::new).collect())
    }

    async fn unreadable_records(&self, key: &CollectionKey) -> StoreResult<Vec<Value>> {
        let Some(value) = self.kv.get_one(key.as_str()).await? else {
            return Ok(Vec::new());
        };
        Ok(normalize(value)
            .map(|normalized| normalized.unreadable)
            .unwrap_or_default())
    }

    fn decode(&self, key: &CollectionKey, value: Value) -> StoreResult<Collection> {
        let normalized = normalize(value).map_err(|reason| StoreError::Malformed {
            key: key.to_string(),
            reason,
        })?;
        if !normalized.unreadable.is_empty() {
            warn!(key = %key, skipped = normalized.skipped(), "set aside undecodable annotations");
        }
        Ok(normalized.collection)
    }
}

impl std::fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaStore")
            .field("prefix", &self.keys.prefix())
            .field("soft_limit_bytes", &self.soft_limit_bytes)
            .finish()
    }
}
