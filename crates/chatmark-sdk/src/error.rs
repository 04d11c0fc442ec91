use chatmark_types::{AnnotationId, ModelError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    /// An import document is not JSON or has an unrecognized shape. Nothing
    /// was written.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("annotation not found: {0}")]
    AnnotationNotFound(AnnotationId),

    #[error("invalid annotation: {0}")]
    Model(#[from] ModelError),

    #[error("store error: {0}")]
    Store(#[from] chatmark_store::StoreError),
}

impl SdkError {
    /// Returns `true` when the storage quota rejected a write.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_capacity())
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
