/*
 * Responsibility
 * - GET / (起動確認の文言) と GET /health (疎通用)
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn root() -> &'static str {
    "Car Selling Server is running"
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
