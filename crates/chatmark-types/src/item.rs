use chatmark_fingerprint::{compute_fingerprint, snippet, Fingerprint};
use serde::Serialize;

/// One message in the host's current list.
///
/// Items are rebuilt from scratch on every scan. The host keeps its own live
/// handles; the engine only ever reports an item's index in the slice it was
/// given, so nothing here outlives the scan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Item {
    /// Author role as the host reports it (e.g. `"user"`, `"assistant"`).
    pub role: String,
    /// Full rendered text.
    pub text: String,
    /// Zero-based position among items of any role.
    pub ordinal: u32,
    /// Content fingerprint of `role` + leading text.
    pub fingerprint: Fingerprint,
    /// Whitespace-collapsed preview of `text`.
    pub snippet: String,
}

impl Item {
    /// Build an item, deriving its fingerprint and snippet.
    pub fn new(role: impl Into<String>, text: impl Into<String>, ordinal: u32) -> Self {
        let role = role.into();
        let text = text.into();
        let fingerprint = compute_fingerprint(&role, &text);
        let snippet = snippet(&text);
        Self {
            role,
            text,
            ordinal,
            fingerprint,
            snippet,
        }
    }
}

/// Build a scan from `(role, text)` pairs in display order, numbering
/// ordinals from zero.
pub fn scan_items<R, T, I>(entries: I) -> Vec<Item>
where
    R: Into<String>,
    T: Into<String>,
    I: IntoIterator<Item = (R, T)>,
{
    entries
        .into_iter()
        .zip(0u32..)
        .map(|((role, text), ordinal)| Item::new(role, text, ordinal))
        .collect()
}
