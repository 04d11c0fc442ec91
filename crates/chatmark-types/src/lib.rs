//! Foundation types for chatmark.
//!
//! Every other chatmark crate depends on `chatmark-types`.
//!
//! # Key Types
//!
//! - [`Item`] -- one message of the host's current scan, with its derived
//!   fingerprint and snippet. Ephemeral.
//! - [`Reference`] -- the persisted descriptor of "which item" an annotation
//!   targets, carrying three independent re-matching signals.
//! - [`Annotation`] -- a user note bound to a reference.
//! - [`AnnotationId`] -- the sole identity used for dedup and merge.
//! - [`MarkerColor`] -- the fixed highlight palette.
//! - [`Collection`] -- the versioned envelope persisted per conversation.

pub mod annotation;
pub mod collection;
pub mod error;
pub mod item;
pub mod reference;
pub mod timestamp;

pub use annotation::{Annotation, AnnotationId, MarkerColor};
pub use collection::{Collection, SCHEMA_VERSION};
pub use error::ModelError;
pub use item::{scan_items, Item};
pub use reference::{make_reference, Reference};

pub use chatmark_fingerprint::Fingerprint;
