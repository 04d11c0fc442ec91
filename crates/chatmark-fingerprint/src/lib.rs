//! Content fingerprints for chat items.
//!
//! Hosts render no stable per-message identifier, so every item is
//! identified by what it says. This crate turns an item's role and text into
//! two derived values:
//!
//! - [`Fingerprint`] -- a short DJB2-xor hash of `role|text-prefix`, rendered
//!   in base 36. The algorithm is part of the export wire format: exports from
//!   any implementation must agree on it bit for bit.
//! - [`snippet`] -- a whitespace-collapsed, truncated preview of the text used
//!   for human display and for fuzzy re-matching.
//!
//! Both are pure functions of their inputs.

pub mod fingerprint;
pub mod hasher;
pub mod snippet;

pub use fingerprint::{compute_fingerprint, Fingerprint, FINGERPRINT_TEXT_LEN};
pub use hasher::{to_base36, Djb2Hasher};
pub use snippet::{is_host_whitespace, snippet, trim_text, truncate_utf16, SNIPPET_LEN};
