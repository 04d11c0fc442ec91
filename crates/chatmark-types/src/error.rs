use thiserror::Error;

/// Errors produced when constructing or editing model values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("note must not be empty")]
    EmptyNote,

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("unknown marker color: {0}")]
    UnknownColor(String),
}
