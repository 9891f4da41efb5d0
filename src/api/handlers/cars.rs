/*
 * Responsibility
 * - /cars 系 handler (DocumentStore への素通し)
 * - GET /cars/buying/{id} は見つからなくても 200 + null を返す
 */
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    repos::outcome::{DeleteOutcome, Document, InsertOutcome},
    state::AppState,
};

pub async fn list_cars(State(state): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    let cars = state.cars.find(&Document::new()).await?;
    Ok(Json(cars))
}

pub async fn get_car(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
) -> Result<Json<Option<Document>>, AppError> {
    let car = state.cars.find_one(car_id).await?;
    Ok(Json(car))
}

pub async fn create_car(
    State(state): State<AppState>,
    Json(car): Json<Document>,
) -> Result<(StatusCode, Json<InsertOutcome>), AppError> {
    let outcome = state.cars.insert_one(car).await?;
    tracing::info!(
        collection = state.cars.collection().as_str(),
        id = %outcome.inserted_id,
        "document inserted"
    );
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn delete_car(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let outcome = state.cars.delete_one(car_id).await?;
    if outcome.deleted_count == 0 {
        return Err(AppError::not_found("car"));
    }
    Ok(Json(outcome))
}
