use serde::{Deserialize, Serialize};

use crate::annotation::{Annotation, AnnotationId};

/// Current on-disk schema version.
///
/// - 1: bare array of annotations; references may lack `fingerprint`.
/// - 2: `{ schemaVersion, annotations }` envelope; fingerprints backfilled.
pub const SCHEMA_VERSION: u32 = 2;

/// The versioned set of annotations stored under one collection key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub schema_version: u32,
    #[serde(default, alias = "markers")]
    pub annotations: Vec<Annotation>,
}

impl Collection {
    /// An empty collection at the current schema version.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Wrap annotations in a current-version envelope.
    pub fn new(annotations: Vec<Annotation>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            annotations,
        }
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| &a.id == id)
    }

    pub fn get_mut(&mut self, id: &AnnotationId) -> Option<&mut Annotation> {
        self.annotations.iter_mut().find(|a| &a.id == id)
    }

    /// Remove an annotation by id, returning it if it was present.
    pub fn remove(&mut self, id: &AnnotationId) -> Option<Annotation> {
        let idx = self.annotations.iter().position(|a| &a.id == id)?;
        Some(self.annotations.remove(idx))
    }

    pub fn contains(&self, id: &AnnotationId) -> bool {
        self.get(id).is_some()
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::empty()
    }
}
