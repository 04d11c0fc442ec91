//! Merge engine for chatmark.
//!
//! Combines annotation sets keyed by [`AnnotationId`]: the base always wins,
//! unseen incoming annotations are appended in their incoming order. The same
//! rule serves live re-sync, file import and bundle assembly, and makes every
//! merge idempotent.
//!
//! [`AnnotationId`]: chatmark_types::AnnotationId

pub mod merge;

pub use merge::{merge, merge_all, MergeOutcome};
