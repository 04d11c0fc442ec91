//! Export document formats and import parsing.
//!
//! Two shapes are written and accepted:
//!
//! - a single collection: `{conversationKey, exportedAt, schemaVersion, markers}`
//! - a bundle: `{exportedAt, schemaVersion, conversations: [{key, markers}]}`
//!
//! Import is all-or-nothing at the shape level: text that is not JSON, or a
//! document that is neither shape, is rejected before anything is written.
//! Inside a recognized document each record is checked on its own and
//! incomplete records are skipped and counted.

use chatmark_store::CollectionKey;
use chatmark_types::{Annotation, SCHEMA_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{SdkError, SdkResult};

/// One collection, as written by a single-collection export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionExport {
    pub conversation_key: CollectionKey,
    #[serde(with = "chatmark_types::timestamp")]
    pub exported_at: DateTime<Utc>,
    pub schema_version: u32,
    pub markers: Vec<Annotation>,
}

impl CollectionExport {
    pub fn new(conversation_key: CollectionKey, markers: Vec<Annotation>) -> Self {
        Self {
            conversation_key,
            exported_at: Utc::now(),
            schema_version: SCHEMA_VERSION,
            markers,
        }
    }
}

/// One entry of a bundle export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub key: CollectionKey,
    pub markers: Vec<Annotation>,
}

/// Every non-empty collection, as written by an export-all.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleExport {
    #[serde(with = "chatmark_types::timestamp")]
    pub exported_at: DateTime<Utc>,
    pub schema_version: u32,
    pub conversations: Vec<BundleEntry>,
}

impl BundleExport {
    pub fn new(conversations: Vec<BundleEntry>) -> Self {
        Self {
            exported_at: Utc::now(),
            schema_version: SCHEMA_VERSION,
            conversations,
        }
    }

    /// Total annotations across all entries.
    pub fn annotation_count(&self) -> usize {
        self.conversations.iter().map(|c| c.markers.len()).sum()
    }
}

/// A parsed import document, with incomplete records already dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportDocument {
    /// A single-collection document. `key` is the collection it was exported
    /// from, when the document names one.
    Single {
        key: Option<CollectionKey>,
        annotations: Vec<Annotation>,
    },
    Bundle {
        collections: Vec<(CollectionKey, Vec<Annotation>)>,
    },
}

/// Result of [`parse_import`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedImport {
    pub document: ImportDocument,
    /// Records skipped because they lacked an id, a reference, or a note, or
    /// could not be decoded.
    pub skipped: usize,
}

impl ParsedImport {
    /// Number of records that survived validation.
    pub fn annotation_count(&self) -> usize {
        match &self.document {
            ImportDocument::Single { annotations, .. } => annotations.len(),
            ImportDocument::Bundle { collections } => {
                collections.iter().map(|(_, a)| a.len()).sum()
            }
        }
    }
}

/// Parse import text into a document.
pub fn parse_import(text: &str) -> SdkResult<ParsedImport> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| SdkError::MalformedInput(format!("not valid JSON: {e}")))?;
    parse_import_value(value)
}

/// Parse an already-decoded JSON value into a document.
pub fn parse_import_value(value: Value) -> SdkResult<ParsedImport> {
    let Value::Object(mut map) = value else {
        return Err(SdkError::MalformedInput(
            "expected a JSON object at top level".into(),
        ));
    };

    let mut skipped = 0usize;

    if let Some(conversations) = map.remove("conversations") {
        let Value::Array(entries) = conversations else {
            return Err(SdkError::MalformedInput(
                "conversations must be an array".into(),
            ));
        };
        let mut collections = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.into_iter().enumerate() {
            let Value::Object(mut entry) = entry else {
                return Err(SdkError::MalformedInput(format!(
                    "conversations[{idx}] is not an object"
                )));
            };
            let key = match entry.remove("key") {
                Some(Value::String(key)) if !key.is_empty() => CollectionKey::new(key),
                _ => {
                    return Err(SdkError::MalformedInput(format!(
                        "conversations[{idx}] has no key"
                    )))
                }
            };
            let records = take_markers(&mut entry)
                .ok_or_else(|| {
                    SdkError::MalformedInput(format!("conversations[{idx}] has no markers array"))
                })?;
            let (annotations, dropped) = validate_records(records);
            skipped += dropped;
            collections.push((key, annotations));
        }
        debug!(collections = collections.len(), skipped, "parsed bundle import");
        return Ok(ParsedImport {
            document: ImportDocument::Bundle { collections },
            skipped,
        });
    }

    let records = take_markers(&mut map).ok_or_else(|| {
        SdkError::MalformedInput("expected a markers array or a conversations array".into())
    })?;
    let key = match map.remove("conversationKey") {
        Some(Value::String(key)) if !key.is_empty() => Some(CollectionKey::new(key)),
        _ => None,
    };
    let (annotations, dropped) = validate_records(records);
    skipped += dropped;
    debug!(count = annotations.len(), skipped, "parsed single-collection import");
    Ok(ParsedImport {
        document: ImportDocument::Single { key, annotations },
        skipped,
    })
}

fn take_markers(map: &mut Map<String, Value>) -> Option<Vec<Value>> {
    match map.remove("markers").or_else(|| map.remove("annotations")) {
        Some(Value::Array(records)) => Some(records),
        _ => None,
    }
}

fn validate_records(records: Vec<Value>) -> (Vec<Annotation>, usize) {
    let total = records.len();
    let annotations: Vec<Annotation> = records
        .into_iter()
        .enumerate()
        .filter_map(|(idx, record)| match accept_record(record) {
            Ok(annotation) => Some(annotation),
            Err(reason) => {
                warn!(index = idx, reason = %reason, "skipping import record");
                None
            }
        })
        .collect();
    let skipped = total - annotations.len();
    (annotations, skipped)
}

fn accept_record(record: Value) -> Result<Annotation, String> {
    let Value::Object(fields) = &record else {
        return Err("record is not an object".into());
    };
    match fields.get("id") {
        Some(Value::String(id)) if !id.is_empty() => {}
        _ => return Err("missing id".into()),
    }
    match fields.get("reference") {
        Some(Value::Object(_)) => {}
        _ => return Err("missing reference".into()),
    }
    match fields.get("note") {
        Some(Value::String(_)) => {}
        _ => return Err("missing note".into()),
    }
    serde_json::from_value(record).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> Value {
        json!({
            "id": id,
            "reference": {"role": "user", "fingerprint": "abc", "snippet": "hi"},
            "note": "n",
            "color": "blue",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": 1704067200000i64
        })
    }

    #[test]
    fn single_document_with_key() {
        let parsed = parse_import_value(json!({
            "conversationKey": "chatmark:abcdefgh",
            "exportedAt": "2024-01-01T00:00:00Z",
            "schemaVersion": 2,
            "markers": [record("cm-1"), record("cm-2")]
        }))
        .unwrap();
        assert_eq!(parsed.skipped, 0);
        match parsed.document {
            ImportDocument::Single { key, annotations } => {
                assert_eq!(key, Some(CollectionKey::new("chatmark:abcdefgh")));
                assert_eq!(annotations.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bundle_document() {
        let parsed = parse_import_value(json!({
            "exportedAt": "2024-01-01T00:00:00Z",
            "schemaVersion": 2,
            "conversations": [
                {"key": "chatmark:aaaaaaaa", "markers": [record("cm-1")]},
                {"key": "chatmark:bbbbbbbb", "markers": []}
            ]
        }))
        .unwrap();
        assert_eq!(parsed.annotation_count(), 1);
        assert!(matches!(
            parsed.document,
            ImportDocument::Bundle { ref collections } if collections.len() == 2
        ));
    }

    #[test]
    fn incomplete_records_are_skipped_and_counted() {
        let mut no_note = record("cm-3");
        no_note.as_object_mut().unwrap().remove("note");
        let mut no_reference = record("cm-4");
        no_reference["reference"] = Value::Null;

        let parsed = parse_import_value(json!({
            "markers": [record("cm-1"), {"note": "x"}, no_note, no_reference, "junk"]
        }))
        .unwrap();
        assert_eq!(parsed.annotation_count(), 1);
        assert_eq!(parsed.skipped, 4);
    }

    #[test]
    fn unrecognized_shapes_are_malformed() {
        for text in [
            "not json",
            "[1, 2, 3]",
            "{\"foo\": 1}",
            "{\"markers\": {}}",
            "{\"conversations\": [{\"markers\": []}]}",
        ] {
            assert!(
                matches!(parse_import(text), Err(SdkError::MalformedInput(_))),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn export_documents_serialize_in_camel_case() {
        let single = CollectionExport::new(CollectionKey::new("chatmark:abcdefgh"), Vec::new());
        let value = serde_json::to_value(&single).unwrap();
        assert_eq!(value["conversationKey"], json!("chatmark:abcdefgh"));
        assert_eq!(value["schemaVersion"], json!(SCHEMA_VERSION));
        assert!(value["exportedAt"].is_string());

        let bundle = BundleExport::new(vec![BundleEntry {
            key: CollectionKey::new("chatmark:abcdefgh"),
            markers: Vec::new(),
        }]);
        let value = serde_json::to_value(&bundle).unwrap();
        assert_eq!(value["conversations"][0]["key"], json!("chatmark:abcdefgh"));
    }
}
