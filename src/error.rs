/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - RepoError / GateError を統一的に変換
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repos::error::RepoError;
use crate::services::access_gate::GateError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("not found: {resource}")]
    NotFound { resource: String },
    #[error("conflict: {resource}")]
    Conflict { resource: String },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{resource} not found."),
            ),
            AppError::Conflict { resource } => (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("{resource} already exists."),
            ),
            AppError::Forbidden(message) => (StatusCode::FORBIDDEN, "FORBIDDEN", message),
            AppError::NotAuthorized(message) => (StatusCode::FORBIDDEN, "NOT_AUTHORIZED", message),
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "service temporarily unavailable".into(),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "internal server error".into(),
            ),
        };

        (status, Json(ErrorResponse { code, message })).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict => AppError::conflict("record"),
            RepoError::Unavailable(err) => {
                tracing::error!(error = ?err, "store unavailable");
                AppError::ServiceUnavailable
            }
            RepoError::Db(err) => {
                tracing::error!(error = ?err, "store query failed");
                AppError::Internal
            }
        }
    }
}

impl From<GateError> for AppError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Forbidden => AppError::Forbidden(GateError::Forbidden.to_string()),
            GateError::NotAuthorized => {
                AppError::NotAuthorized(GateError::NotAuthorized.to_string())
            }
            GateError::TargetNotFound(email) => AppError::not_found(format!("user {email}")),
            GateError::VerifierUnavailable(_) => AppError::ServiceUnavailable,
            GateError::Directory(err) => err.into(),
        }
    }
}
