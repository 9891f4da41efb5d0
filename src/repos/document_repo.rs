/*
 * Responsibility
 * - cars / reviews / orders コレクション向けのドキュメント操作
 * - DocumentStore trait を境界にして Postgres (JSONB) / in-memory を差し替え可能にする
 * - `_id` はサーバ側で採番し、クライアント入力の `_id` は無視する
 */
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use crate::repos::error::RepoError;
use crate::repos::outcome::{
    DeleteOutcome, Document, ID_FIELD, InsertOutcome, UpdateOutcome, strip_id,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Cars,
    Reviews,
    Orders,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cars => "cars",
            Self::Reviews => "reviews",
            Self::Orders => "orders",
        }
    }
}

/// One collection of schemaless JSON documents.
///
/// `filter` is top-level field equality; an empty filter matches everything.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn collection(&self) -> Collection;

    async fn find(&self, filter: &Document) -> Result<Vec<Document>, RepoError>;

    async fn find_one(&self, id: Uuid) -> Result<Option<Document>, RepoError>;

    async fn insert_one(&self, doc: Document) -> Result<InsertOutcome, RepoError>;

    /// Shallow merge of `patch` into the stored document (`$set` semantics).
    async fn update_one(&self, id: Uuid, patch: Document) -> Result<UpdateOutcome, RepoError>;

    async fn delete_one(&self, id: Uuid) -> Result<DeleteOutcome, RepoError>;
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    doc: Json<Document>,
}

impl DocumentRow {
    fn into_document(self) -> Document {
        let mut doc = self.doc.0;
        doc.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        doc
    }
}

#[derive(Clone, Debug)]
pub struct PgDocumentStore {
    db: PgPool,
    collection: Collection,
}

impl PgDocumentStore {
    pub fn new(db: PgPool, collection: Collection) -> Self {
        Self { db, collection }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn collection(&self) -> Collection {
        self.collection
    }

    async fn find(&self, filter: &Document) -> Result<Vec<Document>, RepoError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, doc
            FROM documents
            WHERE collection = $1 AND doc @> $2
            ORDER BY "createdAt" ASC
            "#,
        )
        .bind(self.collection.as_str())
        .bind(Value::Object(filter.clone()))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(DocumentRow::into_document).collect())
    }

    async fn find_one(&self, id: Uuid) -> Result<Option<Document>, RepoError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, doc
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(self.collection.as_str())
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(DocumentRow::into_document))
    }

    async fn insert_one(&self, doc: Document) -> Result<InsertOutcome, RepoError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, doc)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(self.collection.as_str())
        .bind(id)
        .bind(Value::Object(strip_id(doc)))
        .execute(&self.db)
        .await?;

        Ok(InsertOutcome::new(id.to_string()))
    }

    async fn update_one(&self, id: Uuid, patch: Document) -> Result<UpdateOutcome, RepoError> {
        // matched = row exists, modified = the merged document differs from the stored one
        let (matched, modified): (i64, i64) = sqlx::query_as(
            r#"
            WITH target AS (
                SELECT id, doc
                FROM documents
                WHERE collection = $1 AND id = $2
                FOR UPDATE
            ),
            changed AS (
                UPDATE documents d
                SET doc = d.doc || $3, "updatedAt" = now()
                FROM target t
                WHERE d.collection = $1 AND d.id = t.id AND (t.doc || $3) IS DISTINCT FROM t.doc
                RETURNING d.id
            )
            SELECT
                (SELECT COUNT(*) FROM target) AS matched,
                (SELECT COUNT(*) FROM changed) AS modified
            "#,
        )
        .bind(self.collection.as_str())
        .bind(id)
        .bind(Value::Object(strip_id(patch)))
        .fetch_one(&self.db)
        .await?;

        if matched == 0 {
            return Ok(UpdateOutcome::unmatched());
        }
        Ok(UpdateOutcome::matched(modified > 0))
    }

    async fn delete_one(&self, id: Uuid) -> Result<DeleteOutcome, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(self.collection.as_str())
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(DeleteOutcome::new(result.rows_affected()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::repos::test_pool;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    async fn store(collection: Collection) -> Option<PgDocumentStore> {
        test_pool()
            .await
            .map(|db| PgDocumentStore::new(db, collection))
    }

    #[tokio::test]
    async fn pg_subset_patches_are_applied() {
        let Some(store) = store(Collection::Cars).await else {
            return;
        };
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

        let again = store
            .update_one(id, doc(json!({"colors": ["red"]})))
            .await
            .unwrap();
        assert_eq!((again.matched_count, again.modified_count), (1, 0));

        let missing = store
            .update_one(Uuid::new_v4(), doc(json!({"colors": ["red"]})))
            .await
            .unwrap();
        assert_eq!(missing.matched_count, 0);
    }

    #[tokio::test]
    async fn pg_find_filters_by_field_and_collection() {
        let Some(orders) = store(Collection::Orders).await else {
            return;
        };
        let email = format!("{}@example.com", Uuid::new_v4());
        orders
            .insert_one(doc(json!({"email": email, "car": "Civic"})))
            .await
            .unwrap();
        orders
            .insert_one(doc(json!({"email": email, "car": "Polo", "_id": "forged"})))
            .await
            .unwrap();

        let mine = orders.find(&doc(json!({"email": email}))).await.unwrap();
        let cars: Vec<&str> = mine.iter().map(|d| d["car"].as_str().unwrap()).collect();
        assert_eq!(cars, ["Civic", "Polo"]);
        assert!(mine.iter().all(|d| d[ID_FIELD] != "forged"));

        let Some(reviews) = store(Collection::Reviews).await else {
            return;
        };
        assert!(reviews.find(&doc(json!({"email": email}))).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pg_delete_counts_removed_rows() {
        let Some(store) = store(Collection::Cars).await else {
            return;
        };
        let inserted = store.insert_one(doc(json!({"name": "Civic"}))).await.unwrap();
        let id = Uuid::parse_str(&inserted.inserted_id).unwrap();
        assert_eq!(store.delete_one(id).await.unwrap().deleted_count, 1);
        assert_eq!(store.delete_one(id).await.unwrap().deleted_count, 0);
        assert!(store.find_one(id).await.unwrap().is_none());
    }
}
