//! Shape normalization and schema migration.
//!
//! Reading goes through two steps. [`normalize`] turns whatever JSON is
//! stored under a key into a [`Collection`] envelope without changing its
//! version. [`migrate`] then upgrades the envelope to [`SCHEMA_VERSION`] one
//! step at a time.

use chatmark_fingerprint::compute_fingerprint;
use chatmark_types::{Annotation, Collection, SCHEMA_VERSION};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of normalizing a stored value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Normalized {
    pub collection: Collection,
    /// Raw records that could not be decoded, in stored order. They are kept
    /// out of `collection` but written back on save.
    pub unreadable: Vec<Value>,
}

impl Normalized {
    /// How many records were left out of `collection`.
    pub fn skipped(&self) -> usize {
        self.unreadable.len()
    }
}

/// Turn a stored value into a versioned envelope.
///
/// - A bare array is a version 1 collection.
/// - An object with a numeric `schemaVersion` is an envelope; its records are
///   read from `annotations` (or `markers`).
///
/// Each record is decoded on its own; undecodable records are set aside in
/// [`Normalized::unreadable`]. Any other shape is an error carrying the reason.
pub fn normalize(value: Value) -> Result<Normalized, String> {
    let (schema_version, records) = match value {
        Value::Array(records) => (1, records),
        Value::Object(mut map) => {
            let version = map
                .get("schemaVersion")
                .and_then(Value::as_u64)
                .ok_or_else(|| "object without numeric schemaVersion".to_string())?;
            let version = u32::try_from(version)
                .map_err(|_| format!("schemaVersion {version} out of range"))?;
            let records = match map.remove("annotations").or_else(|| map.remove("markers")) {
                Some(Value::Array(records)) => records,
                None | Some(Value::Null) => Vec::new(),
                Some(other) => {
                    return Err(format!("annotations is {}, expected array", kind(&other)))
                }
            };
            (version, records)
        }
        other => return Err(format!("unexpected {} at top level", kind(&other))),
    };

    let mut annotations = Vec::with_capacity(records.len());
    let mut unreadable = Vec::new();
    for (idx, record) in records.into_iter().enumerate() {
        match Annotation::deserialize(&record) {
            Ok(annotation) => annotations.push(annotation),
            Err(e) => {
                warn!(index = idx, error = %e, "skipping undecodable annotation");
                unreadable.push(record);
            }
        }
    }

    Ok(Normalized {
        collection: Collection {
            schema_version,
            annotations,
        },
        unreadable,
    })
}

/// Upgrade a collection to the current schema version.
///
/// Monotonic and idempotent: a current collection is returned unchanged, and
/// a collection from a newer release is left as-is rather than downgraded.
/// No step ever removes an annotation.
pub fn migrate(mut collection: Collection) -> Collection {
    if collection.schema_version > SCHEMA_VERSION {
        warn!(
            found = collection.schema_version,
            supported = SCHEMA_VERSION,
            "collection is newer than this engine; leaving it unmigrated"
        );
        return collection;
    }

    while collection.schema_version < SCHEMA_VERSION {
        let next = collection.schema_version.max(1) + 1;
        apply_migration(&mut collection, next);
        collection.schema_version = next;
    }
    collection
}

fn apply_migration(collection: &mut Collection, version: u32) {
    match version {
        2 => backfill_fingerprints(collection),
        other => debug!(version = other, "no migration step"),
    }
}

/// v1 -> v2: derive missing or empty fingerprints from the stored snippet.
fn backfill_fingerprints(collection: &mut Collection) {
    let mut backfilled = 0usize;
    for annotation in &mut collection.annotations {
        let reference = &mut annotation.reference;
        if reference
            .fingerprint
            .as_ref()
            .is_some_and(|fp| !fp.is_empty())
        {
            continue;
        }
        let derived = reference
            .snippet()
            .map(|snippet| compute_fingerprint(&reference.role, snippet));
        if derived.is_some() {
            reference.fingerprint = derived;
            backfilled += 1;
        }
    }
    debug!(backfilled, "migrated collection to schema v2");
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatmark_types::Fingerprint;
    use proptest::prelude::*;
    use serde_json::json;

    fn legacy_record(id: &str, snippet: Option<&str>, fingerprint: Option<&str>) -> Value {
        let mut reference = json!({"role": "assistant"});
        if let Some(s) = snippet {
            reference["snippet"] = json!(s);
        }
        if let Some(fp) = fingerprint {
            reference["fingerprint"] = json!(fp);
        }
        json!({"id": id, "reference": reference, "note": "n", "createdAt": 1700000000000i64})
    }

    #[test]
    fn bare_array_is_version_one() {
        let normalized = normalize(json!([legacy_record("cm-1", Some("hi"), None)])).unwrap();
        assert_eq!(normalized.collection.schema_version, 1);
        assert_eq!(normalized.collection.len(), 1);
        assert_eq!(normalized.skipped(), 0);
    }

    #[test]
    fn envelope_keeps_its_version() {
        let normalized = normalize(json!({
            "schemaVersion": 2,
            "annotations": [legacy_record("cm-1", Some("hi"), Some("abc"))]
        }))
        .unwrap();
        assert_eq!(normalized.collection.schema_version, 2);
        assert_eq!(normalized.collection.len(), 1);
    }

    #[test]
    fn envelope_without_records_is_empty() {
        let normalized = normalize(json!({"schemaVersion": 2})).unwrap();
        assert!(normalized.collection.is_empty());
    }

    #[test]
    fn undecodable_records_are_skipped() {
        let normalized = normalize(json!([
            legacy_record("cm-1", Some("a"), None),
            {"id": "cm-2"},
            42,
        ]))
        .unwrap();
        assert_eq!(normalized.collection.len(), 1);
        assert_eq!(normalized.skipped(), 2);
        assert_eq!(normalized.unreadable, vec![json!({"id": "cm-2"}), json!(42)]);
    }

    #[test]
    fn unrecognized_shapes_are_rejected() {
        assert!(normalize(json!("text")).is_err());
        assert!(normalize(json!({"markers": []})).is_err());
        assert!(normalize(json!({"schemaVersion": 2, "annotations": {}})).is_err());
    }

    #[test]
    fn v1_to_v2_backfills_fingerprint_from_snippet() {
        let c = normalize(json!([
            legacy_record("cm-1", Some("Hello world"), None),
            legacy_record("cm-2", None, None),
            legacy_record("cm-3", Some("x"), Some("keep")),
        ]))
        .unwrap()
        .collection;

        let migrated = migrate(c);
        assert_eq!(migrated.schema_version, SCHEMA_VERSION);
        assert_eq!(
            migrated.annotations[0].reference.fingerprint,
            Some(compute_fingerprint("assistant", "Hello world"))
        );
        assert_eq!(migrated.annotations[1].reference.fingerprint, None);
        assert_eq!(
            migrated.annotations[2].reference.fingerprint,
            Some(Fingerprint::new("keep"))
        );
    }

    #[test]
    fn v1_to_v2_replaces_empty_fingerprint() {
        let mut record = legacy_record("cm-1", Some("hello"), Some(""));
        record["reference"]["role"] = json!("user");
        let c = normalize(json!([record])).unwrap().collection;

        let migrated = migrate(c);
        let fp = migrated.annotations[0].reference.fingerprint.clone();
        assert_eq!(fp, Some(compute_fingerprint("user", "hello")));
        assert_eq!(fp.unwrap().as_str(), "f9ekyy");
    }

    #[test]
    fn version_zero_is_treated_as_one() {
        let c = Collection {
            schema_version: 0,
            annotations: Vec::new(),
        };
        assert_eq!(migrate(c).schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn newer_versions_are_not_downgraded() {
        let c = Collection {
            schema_version: SCHEMA_VERSION + 1,
            annotations: Vec::new(),
        };
        assert_eq!(migrate(c.clone()), c);
    }

    fn record_strategy() -> impl Strategy<Value = Value> {
        (
            "[a-z0-9]{1,6}",
            prop::option::of("[A-Za-z ]{0,30}"),
            prop::option::of("[a-z0-9]{3,7}"),
        )
            .prop_map(|(id, snippet, fp)| {
                legacy_record(&format!("cm-{id}"), snippet.as_deref(), fp.as_deref())
            })
    }

    proptest! {
        #[test]
        fn migrate_is_idempotent_and_keeps_length(
            records in prop::collection::vec(record_strategy(), 0..12),
            version in 0u32..=2,
        ) {
            let c = normalize(json!({"schemaVersion": version, "annotations": records}))
                .unwrap()
                .collection;
            let before = c.len();
            let once = migrate(c);
            let twice = migrate(once.clone());
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(once.len(), before);
        }
    }
}
