//! Reference resolution for chatmark.
//!
//! Maps stored [`Reference`]s onto the host's current scan of [`Item`]s.
//! Each reference is resolved independently by trying three tiers in order
//! of decreasing confidence:
//!
//! 1. [`MatchTier::Fingerprint`] -- exact content identity
//! 2. [`MatchTier::SnippetPrefix`] -- same role, case-insensitive snippet prefix
//! 3. [`MatchTier::NearestOrdinal`] -- same role, closest position
//!
//! A reference that no tier can place is *missing*: a normal steady state,
//! not an error. Resolution is a pure function of its inputs and can be
//! re-run at any time.
//!
//! [`Reference`]: chatmark_types::Reference
//! [`Item`]: chatmark_types::Item

pub mod resolver;

pub use resolver::{
    resolve, resolve_annotations, Match, MatchTier, Resolution, ResolutionSummary,
    ResolvedAnnotation, ScanIndex, SNIPPET_PREFIX_LEN,
};
