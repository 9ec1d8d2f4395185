use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::BookingError;
use crate::models::SeatSpec;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", post(publish_event))
        .route("/events/{event_id}/seats", get(get_seat_map))
}

// POST /api/events
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct PublishEventRequest {
    #[validate(length(min = 1, max = 128))]
    event_id: String,
    #[validate(length(equal = 3))]
    currency: String,
    #[validate(length(min = 1))]
    seats: Vec<SeatSpec>,
}

async fn publish_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PublishEventRequest>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()
        .map_err(|e| BookingError::invalid_request(e.to_string()))?;

    let seat_map = state
        .service
        .publish_event(&req.event_id, &req.currency, req.seats)
        .await?;
    Ok((StatusCode::CREATED, Json(seat_map)))
}

// GET /api/events/{event_id}/seats
async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, BookingError> {
    let seat_map = state.service.seat_map(&event_id).await?;
    Ok(Json(seat_map))
}
