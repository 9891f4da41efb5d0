use axum::{Json, extract::State, http::StatusCode};

use crate::{
    error::AppError,
    repos::outcome::{Document, InsertOutcome},
    state::AppState,
};

pub async fn list_reviews(
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, AppError> {
    let reviews = state.reviews.find(&Document::new()).await?;
    Ok(Json(reviews))
}

pub async fn create_review(
    State(state): State<AppState>,
    Json(review): Json<Document>,
) -> Result<(StatusCode, Json<InsertOutcome>), AppError> {
    let outcome = state.reviews.insert_one(review).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
