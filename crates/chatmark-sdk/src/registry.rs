use std::collections::BTreeMap;

use chatmark_merge::{merge, merge_all};
use chatmark_store::{CollectionKey, SchemaStore};
use chatmark_types::Annotation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{SdkError, SdkResult};
use crate::export::{BundleEntry, BundleExport, CollectionExport, ImportDocument, ParsedImport};

/// One row of the collection listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub key: CollectionKey,
    pub count: usize,
    /// Most recent `updatedAt` among the collection's annotations.
    pub last_updated: Option<DateTime<Utc>>,
}

/// What an import changed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Annotations appended to some collection.
    pub added: usize,
    /// Records dropped by validation.
    pub skipped: usize,
    /// Valid records whose id was already present.
    pub duplicates: usize,
    /// Collections that were rewritten, in write order.
    pub collections_changed: Vec<CollectionKey>,
    /// Collections now larger than the soft size limit.
    pub over_soft_limit: Vec<CollectionKey>,
}

/// Outcome of [`Registry::clear_all`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClearOutcome {
    NothingToClear,
    Cleared { collections: usize },
}

/// Operations over every collection in a namespace: listing, export,
/// import, and bulk deletion.
#[derive(Clone, Debug)]
pub struct Registry {
    store: SchemaStore,
}

impl Registry {
    pub fn new(store: SchemaStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    /// Key, size, and last activity of every stored collection, by key.
    pub async fn summaries(&self) -> SdkResult<Vec<CollectionSummary>> {
        let all = self.store.enumerate().await?;
        Ok(all
            .into_iter()
            .map(|(key, collection)| CollectionSummary {
                count: collection.len(),
                last_updated: collection.annotations.iter().map(|a| a.updated_at).max(),
                key,
            })
            .collect())
    }

    /// Export one collection. An absent key exports an empty list.
    pub async fn export_one(&self, key: &CollectionKey) -> SdkResult<CollectionExport> {
        let collection = self.store.load(key).await?;
        debug!(key = %key, count = collection.len(), "exported collection");
        Ok(CollectionExport::new(key.clone(), collection.annotations))
    }

    /// Export every non-empty collection in key order.
    ///
    /// Each collection passes through the merge engine, so a collection that
    /// somehow holds duplicate ids is exported with the first of each.
    pub async fn export_all(&self) -> SdkResult<BundleExport> {
        let all = self.store.enumerate().await?;
        let conversations: Vec<BundleEntry> = all
            .into_iter()
            .filter(|(_, collection)| !collection.is_empty())
            .map(|(key, collection)| BundleEntry {
                key,
                markers: merge(Vec::new(), collection.annotations).merged,
            })
            .collect();
        let bundle = BundleExport::new(conversations);
        info!(
            collections = bundle.conversations.len(),
            annotations = bundle.annotation_count(),
            "exported all collections"
        );
        Ok(bundle)
    }

    /// Merge a parsed document into storage.
    ///
    /// A single-collection document goes into `target` when given, otherwise
    /// into the collection it names; with neither the document is rejected.
    /// A bundle goes into the collections it names and ignores `target`.
    /// Existing annotations always win over imported ones with the same id.
    ///
    /// A collection is only rewritten when the merge added something. If a
    /// write fails, collections written before it keep their new contents.
    pub async fn import(
        &self,
        parsed: ParsedImport,
        target: Option<&CollectionKey>,
    ) -> SdkResult<ImportReport> {
        let mut batches: BTreeMap<CollectionKey, Vec<Vec<Annotation>>> = BTreeMap::new();
        match parsed.document {
            ImportDocument::Single { key, annotations } => {
                let key = target.cloned().or(key).ok_or_else(|| {
                    SdkError::MalformedInput(
                        "document names no collection and no target was given".into(),
                    )
                })?;
                batches.entry(self.adopt(key)).or_default().push(annotations);
            }
            ImportDocument::Bundle { collections } => {
                for (key, annotations) in collections {
                    batches.entry(self.adopt(key)).or_default().push(annotations);
                }
            }
        }

        let mut report = ImportReport {
            skipped: parsed.skipped,
            ..ImportReport::default()
        };
        for (key, incoming) in batches {
            let base = self.store.load(&key).await?;
            let outcome = merge_all(base.annotations, incoming);
            report.duplicates += outcome.discarded;
            if !outcome.changed() {
                continue;
            }
            let saved = self.store.save(&key, &outcome.merged).await?;
            report.added += outcome.added;
            if saved.over_soft_limit {
                report.over_soft_limit.push(key.clone());
            }
            report.collections_changed.push(key);
        }

        info!(
            added = report.added,
            skipped = report.skipped,
            duplicates = report.duplicates,
            collections = report.collections_changed.len(),
            "import finished"
        );
        Ok(report)
    }

    /// Delete one collection.
    pub async fn delete(&self, key: &CollectionKey) -> SdkResult<()> {
        self.store.delete(key).await?;
        Ok(())
    }

    /// Delete every collection in the namespace.
    pub async fn clear_all(&self) -> SdkResult<ClearOutcome> {
        let keys = self.store.list_keys().await?;
        if keys.is_empty() {
            return Ok(ClearOutcome::NothingToClear);
        }
        self.store.delete_many(&keys).await?;
        info!(collections = keys.len(), "cleared all collections");
        Ok(ClearOutcome::Cleared {
            collections: keys.len(),
        })
    }

    /// Keys from another namespace are re-homed under ours.
    fn adopt(&self, key: CollectionKey) -> CollectionKey {
        let keys = self.store.keys();
        if keys.owns(key.as_str()) {
            key
        } else {
            CollectionKey::new(format!("{}{}", keys.prefix(), key.as_str()))
        }
    }
}
