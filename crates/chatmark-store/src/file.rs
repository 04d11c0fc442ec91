use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{KvError, KvResult};
use crate::memory::total_size;
use crate::traits::KvStore;

/// Key-value substrate backed by a single JSON file.
///
/// The whole map is rewritten on every mutation: the new document goes to a
/// temporary file in the same directory which is then renamed over the old
/// one, so readers see either the previous or the next state, never a torn
/// write. Mutations are serialized by an async mutex.
pub struct FileKvStore {
    path: PathBuf,
    quota: Option<u64>,
    write_lock: Mutex<()>,
}

impl FileKvStore {
    /// Open a store at `path`. The file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quota: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Reject writes that would grow the stored entries beyond `quota` bytes.
    pub fn with_quota(mut self, quota: Option<u64>) -> Self {
        self.quota = quota;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> KvResult<BTreeMap<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| KvError::Serialization(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(KvError::Io(e)),
        }
    }

    async fn write_all(&self, map: &BTreeMap<String, Value>) -> KvResult<()> {
        let payload =
            serde_json::to_vec_pretty(map).map_err(|e| KvError::Serialization(e.to_string()))?;
        let path = self.path.clone();
        let len = payload.len();
        tokio::task::spawn_blocking(move || replace_file(&path, &payload))
            .await
            .map_err(|e| KvError::Backend(format!("write task failed: {e}")))??;
        debug!(path = %self.path.display(), bytes = len, "store file replaced");
        Ok(())
    }
}

fn replace_file(path: &Path, payload: &[u8]) -> KvResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(payload)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| KvError::Io(e.error))?;
    Ok(())
}

impl std::fmt::Debug for FileKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKvStore")
            .field("path", &self.path)
            .field("quota", &self.quota)
            .finish()
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, keys: Option<&[String]>) -> KvResult<BTreeMap<String, Value>> {
        let mut all = self.read_all().await?;
        Ok(match keys {
            None => all,
            Some(keys) => keys
                .iter()
                .filter_map(|k| all.remove_entry(k))
                .collect(),
        })
    }

    async fn set(&self, entries: BTreeMap<String, Value>) -> KvResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_all().await?;
        map.extend(entries);
        if let Some(limit) = self.quota {
            let required = total_size(&map)?;
            if required > limit {
                return Err(KvError::CapacityExceeded { required, limit });
            }
        }
        self.write_all(&map).await
    }

    async fn remove(&self, keys: &[String]) -> KvResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_all().await?;
        let before = map.len();
        for key in keys {
            map.remove(key);
        }
        if map.len() == before {
            return Ok(());
        }
        self.write_all(&map).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one(key: &str, value: Value) -> BTreeMap<String, Value> {
        BTreeMap::from([(key.to_string(), value)])
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path().join("none.json"));
        assert!(store.get(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileKvStore::open(&path);
        store.set(one("a", json!({"n": 1}))).await.unwrap();
        store.set(one("b", json!([1, 2]))).await.unwrap();
        drop(store);

        let reopened = FileKvStore::open(&path);
        let all = reopened.get(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"], json!({"n": 1}));
    }

    #[tokio::test]
    async fn remove_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path().join("s.json"));
        store.set(one("a", json!(1))).await.unwrap();
        store.set(one("b", json!(2))).await.unwrap();
        store
            .remove(&["a".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        let keys: Vec<String> = store.get(None).await.unwrap().into_keys().collect();
        assert_eq!(keys, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn quota_rejection_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path().join("q.json")).with_quota(Some(16));
        store.set(one("k", json!("ok"))).await.unwrap();

        let err = store
            .set(one("k", json!("this will not fit in sixteen bytes")))
            .await
            .unwrap_err();
        assert!(matches!(err, KvError::CapacityExceeded { limit: 16, .. }));
        assert_eq!(store.get_one("k").await.unwrap(), Some(json!("ok")));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = FileKvStore::open(&path);
        assert!(matches!(
            store.get(None).await,
            Err(KvError::Serialization(_))
        ));
    }
}
