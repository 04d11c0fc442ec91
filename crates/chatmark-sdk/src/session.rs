use chatmark_merge::merge;
use chatmark_resolve::{resolve_annotations, ResolvedAnnotation};
use chatmark_store::{CollectionKey, SaveReport, SchemaStore};
use chatmark_types::{make_reference, Annotation, AnnotationId, Item, MarkerColor, Reference};
use tracing::{debug, info};

use crate::error::{SdkError, SdkResult};

/// The working copy of one conversation's collection.
///
/// Every mutation is applied in memory first and then persisted. When the
/// write fails (for example on a quota rejection) the in-memory change is
/// kept and the error is returned, so the host can tell the user the change
/// is not saved and retry with [`Session::save`].
#[derive(Debug)]
pub struct Session {
    store: SchemaStore,
    key: CollectionKey,
    annotations: Vec<Annotation>,
}

/// A relink started by [`Session::begin_relink`].
///
/// Consumed by either [`Session::complete_relink`] or
/// [`PendingRelink::cancel`], so it completes at most once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending relink does nothing until completed or cancelled"]
pub struct PendingRelink {
    annotation: AnnotationId,
}

impl PendingRelink {
    pub fn annotation(&self) -> &AnnotationId {
        &self.annotation
    }

    pub fn cancel(self) {
        debug!(annotation = %self.annotation, "relink cancelled");
    }
}

impl Session {
    /// Load (and migrate in memory) the collection stored under `key`.
    pub async fn open(store: SchemaStore, key: CollectionKey) -> SdkResult<Self> {
        let collection = store.load(&key).await?;
        debug!(key = %key, count = collection.len(), "session opened");
        Ok(Self {
            store,
            key,
            annotations: collection.annotations,
        })
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| &a.id == id)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Annotate `item` and persist. Returns the new annotation's id.
    ///
    /// On a failed write the annotation stays in [`annotations`](Self::annotations).
    pub async fn annotate(
        &mut self,
        item: &Item,
        note: impl Into<String>,
        tag: Option<String>,
        color: MarkerColor,
    ) -> SdkResult<(AnnotationId, SaveReport)> {
        let annotation = Annotation::new(make_reference(item), note, tag, color)?;
        let id = annotation.id.clone();
        info!(key = %self.key, annotation = %id, ordinal = item.ordinal, "annotation added");
        self.annotations.push(annotation);
        let report = self.save().await?;
        Ok((id, report))
    }

    /// Replace an annotation's note. A blank note is rejected without any
    /// change.
    pub async fn edit_note(
        &mut self,
        id: &AnnotationId,
        note: impl Into<String>,
    ) -> SdkResult<SaveReport> {
        self.find_mut(id)?.set_note(note)?;
        self.save().await
    }

    pub async fn set_tag(&mut self, id: &AnnotationId, tag: Option<String>) -> SdkResult<SaveReport> {
        self.find_mut(id)?.set_tag(tag);
        self.save().await
    }

    pub async fn set_color(&mut self, id: &AnnotationId, color: MarkerColor) -> SdkResult<SaveReport> {
        self.find_mut(id)?.set_color(color);
        self.save().await
    }

    /// Remove an annotation and persist.
    pub async fn delete(&mut self, id: &AnnotationId) -> SdkResult<SaveReport> {
        let idx = self.position(id)?;
        self.annotations.remove(idx);
        info!(key = %self.key, annotation = %id, "annotation deleted");
        self.save().await
    }

    /// Start pointing an annotation at a different item.
    pub fn begin_relink(&self, id: &AnnotationId) -> SdkResult<PendingRelink> {
        self.position(id)?;
        Ok(PendingRelink {
            annotation: id.clone(),
        })
    }

    /// Finish a relink onto `item` and persist.
    ///
    /// Fails with [`SdkError::AnnotationNotFound`] if the annotation was
    /// deleted while the relink was pending.
    pub async fn complete_relink(
        &mut self,
        pending: PendingRelink,
        item: &Item,
    ) -> SdkResult<SaveReport> {
        self.relink(&pending.annotation, make_reference(item)).await
    }

    /// Point an annotation at `reference` and persist.
    pub async fn relink(&mut self, id: &AnnotationId, reference: Reference) -> SdkResult<SaveReport> {
        self.find_mut(id)?.relink(reference);
        info!(key = %self.key, annotation = %id, "annotation relinked");
        self.save().await
    }

    /// Resolve every annotation against the current scan.
    pub fn resolve<'a>(&'a self, items: &'a [Item]) -> Vec<ResolvedAnnotation<'a>> {
        resolve_annotations(&self.annotations, items)
    }

    /// Persist the working copy as-is.
    pub async fn save(&self) -> SdkResult<SaveReport> {
        Ok(self.store.save(&self.key, &self.annotations).await?)
    }

    /// Replace the working copy with what storage now holds. Use when another
    /// writer changed this collection and local state has nothing unsaved.
    pub async fn reload(&mut self) -> SdkResult<()> {
        let collection = self.store.load(&self.key).await?;
        debug!(key = %self.key, count = collection.len(), "session reloaded");
        self.annotations = collection.annotations;
        Ok(())
    }

    /// Reconcile with storage after another writer changed this collection.
    ///
    /// Stored annotations win; local annotations storage does not know about
    /// are appended and written back. Returns how many were appended.
    pub async fn resync(&mut self) -> SdkResult<usize> {
        let stored = self.store.load(&self.key).await?;
        let local = std::mem::take(&mut self.annotations);
        let outcome = merge(stored.annotations, local);
        let changed = outcome.changed();
        self.annotations = outcome.merged;
        if changed {
            self.save().await?;
        }
        debug!(key = %self.key, appended = outcome.added, "session resynced");
        Ok(outcome.added)
    }

    fn position(&self, id: &AnnotationId) -> SdkResult<usize> {
        self.annotations
            .iter()
            .position(|a| &a.id == id)
            .ok_or_else(|| SdkError::AnnotationNotFound(id.clone()))
    }

    fn find_mut(&mut self, id: &AnnotationId) -> SdkResult<&mut Annotation> {
        let idx = self.position(id)?;
        Ok(&mut self.annotations[idx])
    }
}
