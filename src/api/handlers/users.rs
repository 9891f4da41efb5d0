/*
 * Responsibility
 * - /users 系 handler
 * - PUT /users/admin だけが AccessGate を通る (認可付き、匿名なら body を読む前に 403)
 * - その他は UserDirectory への素通し
 */
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    api::{
        dto::users::{AdminStatusResponse, MakeAdminRequest, SaveUserRequest},
        extractors::Caller,
    },
    error::AppError,
    repos::{
        error::RepoError,
        outcome::{InsertOutcome, UpdateOutcome},
        user_repo::UserRecord,
    },
    state::AppState,
};

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserRecord>>, AppError> {
    let users = state.users.list().await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<SaveUserRequest>,
) -> Result<(StatusCode, Json<InsertOutcome>), AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_EMAIL", msg))?;

    let email = req.email.trim();
    let outcome = state
        .users
        .insert(email, req.profile)
        .await
        .map_err(|e| match e {
            RepoError::Conflict => AppError::conflict(format!("user {email}")),
            other => other.into(),
        })?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn upsert_user(
    State(state): State<AppState>,
    Json(req): Json<SaveUserRequest>,
) -> Result<Json<UpdateOutcome>, AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_EMAIL", msg))?;

    let outcome = state
        .users
        .upsert_profile(req.email.trim(), req.profile)
        .await?;
    Ok(Json(outcome))
}

pub async fn get_admin_status(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<AdminStatusResponse>, AppError> {
    let admin = state
        .users
        .find_by_email(&email)
        .await?
        .is_some_and(|user| user.is_admin());

    Ok(Json(AdminStatusResponse { admin }))
}

pub async fn make_admin(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Bytes,
) -> Result<Json<UpdateOutcome>, AppError> {
    // no identity -> 403 whatever the body holds
    state.gate.require_identity(&caller)?;

    let req: MakeAdminRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request("INVALID_BODY", e.to_string()))?;
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_EMAIL", msg))?;

    let outcome = state
        .gate
        .authorize_admin_mutation(&caller, req.email.trim())
        .await?;
    Ok(Json(outcome))
}
