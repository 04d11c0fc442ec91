use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hasher::{to_base36, Djb2Hasher};
use crate::snippet::trim_text;

/// Number of leading UTF-16 code units of the trimmed text that feed the hash.
pub const FINGERPRINT_TEXT_LEN: usize = 120;

/// Separator placed between role and text before hashing.
const ROLE_SEPARATOR: u16 = b'|' as u16;

/// Content-derived identity of a chat item.
///
/// Serialized as a bare string so exports stay readable and compatible with
/// other implementations of the same hash.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already-computed fingerprint string (e.g. read from storage).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The fingerprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty fingerprint, which never matches anything
    /// meaningfully and is rejected on new references.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Compute the fingerprint of an item.
///
/// The text is trimmed of [host whitespace](crate::is_host_whitespace) and
/// cut to its first [`FINGERPRINT_TEXT_LEN`] UTF-16 code units; `role`, a `|`
/// separator and that prefix are hashed with [`Djb2Hasher`] and the unsigned
/// result is rendered in base 36.
///
/// # Examples
///
/// ```
/// use chatmark_fingerprint::compute_fingerprint;
///
/// let fp = compute_fingerprint("user", "  hello  ");
/// assert_eq!(fp.as_str(), "f9ekyy");
/// ```
pub fn compute_fingerprint(role: &str, text: &str) -> Fingerprint {
    let mut hasher = Djb2Hasher::new();
    hasher.write_str(role);
    hasher.write_unit(ROLE_SEPARATOR);
    for unit in trim_text(text).encode_utf16().take(FINGERPRINT_TEXT_LEN) {
        hasher.write_unit(unit);
    }
    Fingerprint(to_base36(hasher.finish()))
}
