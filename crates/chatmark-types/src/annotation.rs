use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ModelError;
use crate::reference::Reference;

/// Identity of an annotation within its collection.
///
/// Freshly minted ids are `cm-` followed by a time-ordered UUID v7, but any
/// string read from storage or an import is accepted as-is: ids are opaque
/// and only compared for equality.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(String);

impl AnnotationId {
    /// Prefix of generated ids.
    pub const PREFIX: &'static str = "cm-";

    /// Generate a new time-ordered id.
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, uuid::Uuid::now_v7().simple()))
    }

    /// Wrap an existing id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnnotationId({})", self.0)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AnnotationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Highlight color of an annotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    #[default]
    Yellow,
    Blue,
    Green,
    Red,
    Purple,
}

impl MarkerColor {
    /// Every color, in palette order.
    pub const ALL: [MarkerColor; 5] = [
        MarkerColor::Yellow,
        MarkerColor::Blue,
        MarkerColor::Green,
        MarkerColor::Red,
        MarkerColor::Purple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Red => "red",
            Self::Purple => "purple",
        }
    }
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarkerColor {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| ModelError::UnknownColor(s.to_string()))
    }
}

/// A user note bound to one chat item.
///
/// `note` is guaranteed non-empty for annotations created or edited through
/// this API. Records decoded from storage are taken as they are.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    pub reference: Reference,
    pub note: String,
    #[serde(
        default,
        deserialize_with = "deserialize_tag",
        skip_serializing_if = "Option::is_none"
    )]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "deserialize_color")]
    pub color: MarkerColor,
    #[serde(default, with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "crate::timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Annotation {
    /// Create an annotation with a freshly generated id.
    ///
    /// Fails if `note` is blank or `reference` lacks a role or fingerprint.
    pub fn new(
        reference: Reference,
        note: impl Into<String>,
        tag: Option<String>,
        color: MarkerColor,
    ) -> Result<Self, ModelError> {
        Self::with_id(AnnotationId::generate(), reference, note, tag, color)
    }

    /// Create an annotation with a caller-chosen id.
    pub fn with_id(
        id: AnnotationId,
        reference: Reference,
        note: impl Into<String>,
        tag: Option<String>,
        color: MarkerColor,
    ) -> Result<Self, ModelError> {
        let note = validate_note(note.into())?;
        reference.validate()?;
        let now = Utc::now();
        Ok(Self {
            id,
            reference,
            note,
            tag: normalize_tag(tag),
            color,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the note text. Blank notes are rejected and leave the
    /// annotation untouched.
    pub fn set_note(&mut self, note: impl Into<String>) -> Result<(), ModelError> {
        self.note = validate_note(note.into())?;
        self.touch();
        Ok(())
    }

    /// Replace the tag. `None` or an empty string clears it.
    pub fn set_tag(&mut self, tag: Option<String>) {
        self.tag = normalize_tag(tag);
        self.touch();
    }

    pub fn set_color(&mut self, color: MarkerColor) {
        self.color = color;
        self.touch();
    }

    /// Point the annotation at a different item.
    ///
    /// The new reference is trusted: it was derived by the host from an item
    /// the user picked, so it is not checked against any scan.
    pub fn relink(&mut self, reference: Reference) {
        self.reference = reference;
        self.touch();
    }

    fn touch(&mut self) {
        let now = Utc::now();
        // Clocks can step backwards; never let updatedAt precede createdAt.
        self.updated_at = now.max(self.created_at);
    }
}

fn validate_note(note: String) -> Result<String, ModelError> {
    if note.trim().is_empty() {
        Err(ModelError::EmptyNote)
    } else {
        Ok(note)
    }
}

fn normalize_tag(tag: Option<String>) -> Option<String> {
    tag.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn deserialize_tag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(normalize_tag(Option::<String>::deserialize(deserializer)?))
}

// Null, non-string, or unknown colors from older data fall back to the default.
fn deserialize_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MarkerColor, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default())
}
