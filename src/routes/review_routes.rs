// src/routes/review_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{AppState, Review},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors/{doctor_id}/reviews", get(list_reviews))
        .route("/reviews", post(submit_review))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Vec<Review>>, ApiError> {
    state
        .doctors
        .find(doctor_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;
    Ok(Json(state.reviews.by_doctor(doctor_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewRequest {
    pub doctor: Uuid,
    pub reviewer_name: String,
    pub rating: i16,
    pub comment: String,
}

pub async fn submit_review(
    State(state): State<AppState>,
    Json(req): Json<SubmitReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    if req.reviewer_name.trim().is_empty() || req.comment.trim().is_empty() {
        return Err(ApiError::InvalidInput("All fields are required".into()));
    }
    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::InvalidInput(
            "rating must be between 1 and 5".into(),
        ));
    }
    state
        .doctors
        .find(req.doctor)
        .await?
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))?;

    let review = Review {
        id: Uuid::new_v4(),
        doctor_id: req.doctor,
        reviewer_name: req.reviewer_name.trim().to_string(),
        rating: req.rating,
        comment: req.comment.trim().to_string(),
        created_at: Utc::now(),
    };
    state.reviews.insert(&review).await?;

    Ok((StatusCode::CREATED, Json(review)))
}
