//! In-memory backends for local development (no `DATABASE_URL`) and tests.
//!
//! Each operation takes a single lock guard, so reads and writes are atomic per call.
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repos::document_repo::{Collection, DocumentStore};
use crate::repos::error::RepoError;
use crate::repos::outcome::{
    DeleteOutcome, Document, ID_FIELD, InsertOutcome, UpdateOutcome, already_applied, strip_id,
};
use crate::repos::user_repo::{UserDirectory, UserRecord, sanitize_profile};

#[derive(Debug)]
struct StoredDocument {
    seq: u64,
    doc: Document,
}

#[derive(Debug, Default)]
struct DocumentTable {
    next_seq: u64,
    rows: BTreeMap<Uuid, StoredDocument>,
}

#[derive(Clone, Debug)]
pub struct MemoryDocumentStore {
    collection: Collection,
    inner: Arc<RwLock<DocumentTable>>,
}

impl MemoryDocumentStore {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            inner: Arc::new(RwLock::new(DocumentTable::default())),
        }
    }
}

fn with_id(id: Uuid, doc: &Document) -> Document {
    let mut out = doc.clone();
    out.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    out
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn collection(&self) -> Collection {
        self.collection
    }

    async fn find(&self, filter: &Document) -> Result<Vec<Document>, RepoError> {
        let table = self.inner.read().await;
        let mut hits: Vec<(&Uuid, &StoredDocument)> = table
            .rows
            .iter()
            .filter(|(_, stored)| already_applied(&stored.doc, filter))
            .collect();
        // insertion order, like the Postgres backend's "createdAt" ordering
        hits.sort_by_key(|(_, stored)| stored.seq);

        Ok(hits
            .into_iter()
            .map(|(id, stored)| with_id(*id, &stored.doc))
            .collect())
    }

    async fn find_one(&self, id: Uuid) -> Result<Option<Document>, RepoError> {
        let table = self.inner.read().await;
        Ok(table.rows.get(&id).map(|stored| with_id(id, &stored.doc)))
    }

    async fn insert_one(&self, doc: Document) -> Result<InsertOutcome, RepoError> {
        let id = Uuid::new_v4();
        let mut table = self.inner.write().await;
        let seq = table.next_seq;
        table.next_seq += 1;
        table.rows.insert(
            id,
            StoredDocument {
                seq,
                doc: strip_id(doc),
            },
        );
        Ok(InsertOutcome::new(id.to_string()))
    }

    async fn update_one(&self, id: Uuid, patch: Document) -> Result<UpdateOutcome, RepoError> {
        let patch = strip_id(patch);
        let mut table = self.inner.write().await;
        let Some(stored) = table.rows.get_mut(&id) else {
            return Ok(UpdateOutcome::unmatched());
        };
        if already_applied(&stored.doc, &patch) {
            return Ok(UpdateOutcome::matched(false));
        }
        stored.doc.extend(patch);
        Ok(UpdateOutcome::matched(true))
    }

    async fn delete_one(&self, id: Uuid) -> Result<DeleteOutcome, RepoError> {
        let mut table = self.inner.write().await;
        let deleted = table.rows.remove(&id).is_some();
        Ok(DeleteOutcome::new(u64::from(deleted)))
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryUserDirectory {
    inner: Arc<RwLock<BTreeMap<String, UserRecord>>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn put(&self, email: &str, role: Option<&str>) {
        let mut record = Self::blank(email);
        record.role = role.map(str::to_string);
        self.inner.write().await.insert(email.to_string(), record);
    }

    fn blank(email: &str) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            email: email.to_string(),
            role: None,
            profile: Document::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn list(&self) -> Result<Vec<UserRecord>, RepoError> {
        let users = self.inner.read().await;
        let mut out: Vec<UserRecord> = users.values().cloned().collect();
        out.sort_by_key(|u| u.created_at);
        Ok(out)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.inner.read().await.get(email).cloned())
    }

    async fn insert(&self, email: &str, profile: Document) -> Result<InsertOutcome, RepoError> {
        let mut users = self.inner.write().await;
        if users.contains_key(email) {
            return Err(RepoError::Conflict);
        }
        let mut record = Self::blank(email);
        record.profile = sanitize_profile(profile);
        users.insert(email.to_string(), record);
        Ok(InsertOutcome::new(email))
    }

    async fn upsert_profile(
        &self,
        email: &str,
        profile: Document,
    ) -> Result<UpdateOutcome, RepoError> {
        let profile = sanitize_profile(profile);
        let mut users = self.inner.write().await;
        match users.get_mut(email) {
            Some(record) => {
                if already_applied(&record.profile, &profile) {
                    return Ok(UpdateOutcome::matched(false));
                }
                record.profile.extend(profile);
                record.updated_at = Utc::now();
                Ok(UpdateOutcome::matched(true))
            }
            None => {
                let mut record = Self::blank(email);
                record.profile = profile;
                users.insert(email.to_string(), record);
                Ok(UpdateOutcome::upserted(email))
            }
        }
    }

    async fn set_role(
        &self,
        email: &str,
        role: &str,
        upsert: bool,
    ) -> Result<UpdateOutcome, RepoError> {
        let mut users = self.inner.write().await;
        match users.get_mut(email) {
            Some(record) => {
                if record.role.as_deref() == Some(role) {
                    return Ok(UpdateOutcome::matched(false));
                }
                record.role = Some(role.to_string());
                record.updated_at = Utc::now();
                Ok(UpdateOutcome::matched(true))
            }
            None if upsert => {
                let mut record = Self::blank(email);
                record.role = Some(role.to_string());
                users.insert(email.to_string(), record);
                Ok(UpdateOutcome::upserted(email))
            }
            None => Ok(UpdateOutcome::unmatched()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn documents_keep_insertion_order_and_filter() {
        let store = MemoryDocumentStore::new(Collection::Orders);
        store
            .insert_one(doc(json!({"email": "a@example.com", "car": "Civic"})))
            .await
            .unwrap();
        store
            .insert_one(doc(json!({"email": "b@example.com", "car": "Golf"})))
            .await
            .unwrap();
        store
            .insert_one(doc(json!({"email": "a@example.com", "car": "Polo"})))
            .await
            .unwrap();

        let all = store.find(&Document::new()).await.unwrap();
        let cars: Vec<&str> = all.iter().map(|d| d["car"].as_str().unwrap()).collect();
        assert_eq!(cars, ["Civic", "Golf", "Polo"]);

        let mine = store
            .find(&doc(json!({"email": "a@example.com"})))
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|d| d.contains_key(ID_FIELD)));
    }

    #[tokio::test]
    async fn update_reports_matched_and_modified() {
        let store = MemoryDocumentStore::new(Collection::Orders);
        let inserted = store
            .insert_one(doc(json!({"status": "pending"})))
            .await
            .unwrap();
        let id = Uuid::parse_str(&inserted.inserted_id).unwrap();

        let first = store
            .update_one(id, doc(json!({"status": "shipped"})))
            .await
            .unwrap();
        assert_eq!((first.matched_count, first.modified_count), (1, 1));

        let again = store
            .update_one(id, doc(json!({"status": "shipped"})))
            .await
            .unwrap();
        assert_eq!((again.matched_count, again.modified_count), (1, 0));

        let missing = store
            .update_one(Uuid::new_v4(), doc(json!({"status": "shipped"})))
            .await
            .unwrap();
        assert_eq!(missing.matched_count, 0);
    }

    #[tokio::test]
    async fn client_id_is_ignored_on_insert() {
        let store = MemoryDocumentStore::new(Collection::Cars);
        let inserted = store
            .insert_one(doc(json!({"_id": "forged", "name": "Civic"})))
            .await
            .unwrap();
        assert_ne!(inserted.inserted_id, "forged");
        let id = Uuid::parse_str(&inserted.inserted_id).unwrap();
        let found = store.find_one(id).await.unwrap().unwrap();
        assert_eq!(found[ID_FIELD], inserted.inserted_id.as_str());
    }

    #[tokio::test]
    async fn delete_counts_removed_rows() {
        let store = MemoryDocumentStore::new(Collection::Cars);
        let inserted = store.insert_one(doc(json!({"name": "Civic"}))).await.unwrap();
        let id = Uuid::parse_str(&inserted.inserted_id).unwrap();
        assert_eq!(store.delete_one(id).await.unwrap().deleted_count, 1);
        assert_eq!(store.delete_one(id).await.unwrap().deleted_count, 0);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let users = MemoryUserDirectory::new();
        users.insert("a@example.com", Document::new()).await.unwrap();
        let err = users
            .insert("a@example.com", Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Conflict));
    }

    #[tokio::test]
    async fn set_role_respects_upsert_flag() {
        let users = MemoryUserDirectory::new();

        let skipped = users.set_role("bob@example.com", "admin", false).await.unwrap();
        assert_eq!(skipped.matched_count, 0);
        assert!(users.find_by_email("bob@example.com").await.unwrap().is_none());

        let created = users.set_role("bob@example.com", "admin", true).await.unwrap();
        assert_eq!(created.upserted_count, 1);
        let bob = users.find_by_email("bob@example.com").await.unwrap().unwrap();
        assert!(bob.is_admin());
        assert!(bob.profile.is_empty());
    }

    #[tokio::test]
    async fn upsert_profile_keeps_role() {
        let users = MemoryUserDirectory::new();
        users.put("alice@example.com", Some("admin")).await;
        users
            .upsert_profile(
                "alice@example.com",
                doc(json!({"displayName": "Alice", "role": "user"})),
            )
            .await
            .unwrap();
        let alice = users.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert!(alice.is_admin());
        assert_eq!(alice.profile["displayName"], "Alice");
    }

    #[tokio::test]
    async fn subset_array_and_object_patches_replace_fields() {
        let store = MemoryDocumentStore::new(Collection::Cars);
        let inserted = store
            .insert_one(doc(json!({"colors": ["red", "blue"], "specs": {"hp": 150, "doors": 4}})))
            .await
            .unwrap();
        let id = Uuid::parse_str(&inserted.inserted_id).unwrap();

        let outcome = store
            .update_one(id, doc(json!({"colors": ["red"], "specs": {"hp": 150}})))
            .await
            .unwrap();
        assert_eq!((outcome.matched_count, outcome.modified_count), (1, 1));

        let car = store.find_one(id).await.unwrap().unwrap();
        assert_eq!(car["colors"], json!(["red"]));
        assert_eq!(car["specs"], json!({"hp": 150}));
    }
}
