/*
 * Responsibility
 * - users テーブル向け SQLx 操作 (email を主キーとする User Directory)
 * - UserDirectory trait を境界にして AccessGate / handler から backend を隠す
 * - DB エラーは RepoError に変換して返す
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool, types::Json};

use crate::repos::error::RepoError;
use crate::repos::outcome::{Document, InsertOutcome, UpdateOutcome};

pub const ADMIN_ROLE: &str = "admin";

/// A stored user. `profile` holds whatever the client registered with;
/// only `role` is interpreted by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub profile: Document,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// Removes keys the directory owns so a profile can't shadow them.
pub fn sanitize_profile(mut profile: Document) -> Document {
    for key in ["email", "role", "createdAt", "updatedAt", "_id"] {
        profile.remove(key);
    }
    profile
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list(&self) -> Result<Vec<UserRecord>, RepoError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    /// Fails with `RepoError::Conflict` when the email is already registered.
    async fn insert(&self, email: &str, profile: Document) -> Result<InsertOutcome, RepoError>;

    /// Merges `profile` into the record, creating it when missing. Role is untouched.
    async fn upsert_profile(
        &self,
        email: &str,
        profile: Document,
    ) -> Result<UpdateOutcome, RepoError>;

    /// Sets `role`. With `upsert`, a missing record is created with an empty profile.
    async fn set_role(
        &self,
        email: &str,
        role: &str,
        upsert: bool,
    ) -> Result<UpdateOutcome, RepoError>;
}

#[derive(Debug, FromRow)]
struct UserRow {
    email: String,
    role: Option<String>,
    profile: Json<Document>,
    #[sqlx(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[sqlx(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            email: row.email,
            role: row.role,
            profile: row.profile.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// (existed before, row written) -> acknowledgement
fn outcome(email: &str, existed: bool, written: bool) -> UpdateOutcome {
    match (existed, written) {
        (false, true) => UpdateOutcome::upserted(email),
        (true, modified) => UpdateOutcome::matched(modified),
        // lost an insert race: the row exists now, and it already held the value
        (false, false) => UpdateOutcome::matched(false),
    }
}

#[derive(Clone, Debug)]
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn list(&self) -> Result<Vec<UserRecord>, RepoError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT email, role, profile, "createdAt", "updatedAt"
            FROM users
            ORDER BY "createdAt" ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT email, role, profile, "createdAt", "updatedAt"
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(UserRecord::from))
    }

    async fn insert(&self, email: &str, profile: Document) -> Result<InsertOutcome, RepoError> {
        sqlx::query(
            r#"
            INSERT INTO users (email, profile)
            VALUES ($1, $2)
            "#,
        )
        .bind(email)
        .bind(Value::Object(sanitize_profile(profile)))
        .execute(&self.db)
        .await?;

        Ok(InsertOutcome::new(email))
    }

    async fn upsert_profile(
        &self,
        email: &str,
        profile: Document,
    ) -> Result<UpdateOutcome, RepoError> {
        let (existed, written): (bool, bool) = sqlx::query_as(
            r#"
            WITH prev AS (
                SELECT email FROM users WHERE email = $1
            ),
            written AS (
                INSERT INTO users (email, profile)
                VALUES ($1, $2)
                ON CONFLICT (email) DO UPDATE
                SET profile = users.profile || EXCLUDED.profile, "updatedAt" = now()
                WHERE (users.profile || EXCLUDED.profile) IS DISTINCT FROM users.profile
                RETURNING email
            )
            SELECT
                EXISTS (SELECT 1 FROM prev) AS existed,
                EXISTS (SELECT 1 FROM written) AS written
            "#,
        )
        .bind(email)
        .bind(Value::Object(sanitize_profile(profile)))
        .fetch_one(&self.db)
        .await?;

        Ok(outcome(email, existed, written))
    }

    async fn set_role(
        &self,
        email: &str,
        role: &str,
        upsert: bool,
    ) -> Result<UpdateOutcome, RepoError> {
        let sql = if upsert {
            r#"
            WITH prev AS (
                SELECT email FROM users WHERE email = $1
            ),
            written AS (
                INSERT INTO users (email, role)
                VALUES ($1, $2)
                ON CONFLICT (email) DO UPDATE
                SET role = EXCLUDED.role, "updatedAt" = now()
                WHERE users.role IS DISTINCT FROM EXCLUDED.role
                RETURNING email
            )
            SELECT
                EXISTS (SELECT 1 FROM prev) AS existed,
                EXISTS (SELECT 1 FROM written) AS written
            "#
        } else {
            r#"
            WITH prev AS (
                SELECT email FROM users WHERE email = $1 FOR UPDATE
            ),
            written AS (
                UPDATE users
                SET role = $2, "updatedAt" = now()
                WHERE email = $1 AND role IS DISTINCT FROM $2::text
                RETURNING email
            )
            SELECT
                EXISTS (SELECT 1 FROM prev) AS existed,
                EXISTS (SELECT 1 FROM written) AS written
            "#
        };

        let (existed, written): (bool, bool) = sqlx::query_as(sql)
            .bind(email)
            .bind(role)
            .fetch_one(&self.db)
            .await?;

        if !upsert && !existed {
            return Ok(UpdateOutcome::unmatched());
        }
        Ok(outcome(email, existed, written))
    }
}
