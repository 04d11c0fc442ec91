//! High-level SDK for chatmark.
//!
//! [`Chatmark`] is the main entry point for hosts: it derives collection
//! keys from page paths, opens per-conversation [`Session`]s, and hands out
//! a [`Registry`] for namespace-wide listing, export, import, and clearing.
//! [`debounce`] coalesces the host's rescan triggers.

pub mod debounce;
pub mod error;
pub mod export;
pub mod registry;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use chatmark_store::{FileKvStore, InMemoryKvStore, KvStore, StoreConfig};
use tracing::debug;

pub use debounce::{run_debounced, Debouncer, Edge};
pub use error::{SdkError, SdkResult};
pub use export::{
    parse_import, parse_import_value, BundleEntry, BundleExport, CollectionExport,
    ImportDocument, ParsedImport,
};
pub use registry::{ClearOutcome, CollectionSummary, ImportReport, Registry};
pub use session::{PendingRelink, Session};

// Re-export key types
pub use chatmark_fingerprint::compute_fingerprint;
pub use chatmark_merge::{merge, MergeOutcome};
pub use chatmark_resolve::{MatchTier, ResolutionSummary, ResolvedAnnotation};
pub use chatmark_store::{CollectionKey, SaveReport, SchemaStore};
pub use chatmark_types::{scan_items, Annotation, AnnotationId, Item, MarkerColor, Reference};

/// A chatmark namespace over one key-value substrate.
#[derive(Clone, Debug)]
pub struct Chatmark {
    store: SchemaStore,
}

impl Chatmark {
    pub fn new(kv: Arc<dyn KvStore>, config: &StoreConfig) -> SdkResult<Self> {
        Ok(Self {
            store: SchemaStore::new(kv, config)?,
        })
    }

    /// A namespace held in memory, bounded by the configured capacity.
    pub fn in_memory(config: &StoreConfig) -> SdkResult<Self> {
        let kv = match config.capacity_bytes {
            Some(quota) => InMemoryKvStore::with_quota(quota),
            None => InMemoryKvStore::new(),
        };
        Self::new(Arc::new(kv), config)
    }

    /// A namespace persisted to a JSON file at `path`.
    pub fn open_file(path: impl Into<PathBuf>, config: &StoreConfig) -> SdkResult<Self> {
        let path = path.into();
        debug!(path = %path.display(), "opening file store");
        let kv = FileKvStore::open(path).with_quota(config.capacity_bytes);
        Self::new(Arc::new(kv), config)
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    /// The collection key for a host page path.
    pub fn key_for(&self, path: &str) -> CollectionKey {
        self.store.keys().derive(path)
    }

    /// Open the session for the conversation at `path`.
    pub async fn session_for(&self, path: &str) -> SdkResult<Session> {
        self.session(self.key_for(path)).await
    }

    pub async fn session(&self, key: CollectionKey) -> SdkResult<Session> {
        Session::open(self.store.clone(), key).await
    }

    pub fn registry(&self) -> Registry {
        Registry::new(self.store.clone())
    }
}
