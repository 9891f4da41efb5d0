/*
 * Responsibility
 * - /orders 系 CRUD handler
 * - GET /orders?email= で購入者ごとの注文に絞り込む
 * - 新規注文は status 未指定なら "pending"
 */
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    api::dto::orders::{OrderQuery, UpdateOrderStatusRequest, with_default_status},
    error::AppError,
    repos::outcome::{DeleteOutcome, Document, InsertOutcome, UpdateOutcome},
    state::AppState,
};

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let orders = state.orders.find(&query.filter()).await?;
    Ok(Json(orders))
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(order): Json<Document>,
) -> Result<(StatusCode, Json<InsertOutcome>), AppError> {
    let outcome = state.orders.insert_one(with_default_status(order)).await?;
    tracing::info!(id = %outcome.inserted_id, "order placed");
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<UpdateOutcome>, AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_STATUS", msg))?;

    let outcome = state.orders.update_one(order_id, req.into_patch()).await?;
    if outcome.matched_count == 0 {
        return Err(AppError::not_found("order"));
    }
    Ok(Json(outcome))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let outcome = state.orders.delete_one(order_id).await?;
    if outcome.deleted_count == 0 {
        return Err(AppError::not_found("order"));
    }
    Ok(Json(outcome))
}
