//! Write acknowledgements returned by the stores.
//!
//! Shapes follow what a document database driver reports, so clients that were
//! written against one keep working (`insertedId`, `matchedCount`, ...).
use serde::Serialize;

/// JSON object stored in a collection.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Field name of the server-assigned document id.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub acknowledged: bool,
    pub inserted_id: String,
}

impl InsertOutcome {
    pub fn new(inserted_id: impl Into<String>) -> Self {
        Self {
            acknowledged: true,
            inserted_id: inserted_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<String>,
}

impl UpdateOutcome {
    pub fn matched(modified: bool) -> Self {
        Self {
            acknowledged: true,
            matched_count: 1,
            modified_count: u64::from(modified),
            upserted_count: 0,
            upserted_id: None,
        }
    }

    pub fn unmatched() -> Self {
        Self {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_count: 0,
            upserted_id: None,
        }
    }

    pub fn upserted(id: impl Into<String>) -> Self {
        Self {
            acknowledged: true,
            matched_count: 0,
            modified_count: 0,
            upserted_count: 1,
            upserted_id: Some(id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

impl DeleteOutcome {
    pub fn new(deleted_count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count,
        }
    }
}

/// Drops the server-owned id from client input.
pub fn strip_id(mut doc: Document) -> Document {
    doc.remove(ID_FIELD);
    doc
}

/// True when every field of `patch` already holds the same value in `doc`.
pub fn already_applied(doc: &Document, patch: &Document) -> bool {
    patch.iter().all(|(k, v)| doc.get(k) == Some(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn update_outcome_serializes_camel_case() {
        let v = serde_json::to_value(UpdateOutcome::upserted("bob@example.com")).unwrap();
        assert_eq!(
            v,
            json!({
                "acknowledged": true,
                "matchedCount": 0,
                "modifiedCount": 0,
                "upsertedCount": 1,
                "upsertedId": "bob@example.com"
            })
        );
    }

    #[test]
    fn strip_id_removes_client_id() {
        let d = strip_id(doc(json!({"_id": "x", "name": "Civic"})));
        assert_eq!(d, doc(json!({"name": "Civic"})));
    }

    #[test]
    fn already_applied_compares_patched_fields_only() {
        let current = doc(json!({"status": "shipped", "email": "a@example.com"}));
        assert!(already_applied(&current, &doc(json!({"status": "shipped"}))));
        assert!(!already_applied(&current, &doc(json!({"status": "pending"}))));
        assert!(!already_applied(&current, &doc(json!({"price": 10}))));
    }
}
