use chatmark_fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::item::Item;

/// Resolver-facing descriptor of the item an annotation targets.
///
/// A reference carries three independent signals, tried in decreasing order
/// of confidence when re-finding the item: exact fingerprint, role plus
/// snippet prefix, role plus nearest ordinal. References written by old
/// schema versions may lack any of the optional signals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal_hint: Option<u32>,
}

impl Reference {
    /// Capture a reference to `item` as it appears in the current scan.
    pub fn from_item(item: &Item) -> Self {
        Self {
            role: item.role.clone(),
            fingerprint: Some(item.fingerprint.clone()),
            snippet: Some(item.snippet.clone()),
            ordinal_hint: Some(item.ordinal),
        }
    }

    /// Check the fields every newly created reference must carry.
    ///
    /// Only non-empty role and fingerprint are required; snippet and ordinal
    /// hint are optional signals.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.role.trim().is_empty() {
            return Err(ModelError::InvalidReference("role is empty".into()));
        }
        match &self.fingerprint {
            Some(fp) if !fp.is_empty() => Ok(()),
            _ => Err(ModelError::InvalidReference("fingerprint is missing".into())),
        }
    }

    /// The snippet, treating an empty string as absent.
    pub fn snippet(&self) -> Option<&str> {
        self.snippet.as_deref().filter(|s| !s.is_empty())
    }
}

/// Free-function form of [`Reference::from_item`].
pub fn make_reference(item: &Item) -> Reference {
    Reference::from_item(item)
}
