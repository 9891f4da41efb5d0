pub mod document_repo;
pub mod error;
pub mod memory;
pub mod outcome;
pub mod user_repo;

/// Pool for the Postgres-backed tests. `None` (test skipped) when `DATABASE_URL` is unset.
#[cfg(test)]
pub(crate) async fn test_pool() -> Option<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty())?;
    let db = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect to DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("run migrations");
    Some(db)
}
