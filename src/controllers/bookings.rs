use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::BookingError;
use crate::models::PaymentConfirmation;
use crate::services::NewBooking;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/{booking_id}", get(get_booking))
        .route("/bookings/{booking_id}/confirm", post(confirm_booking))
        .route("/bookings/{booking_id}/cancel", post(cancel_booking))
        .route("/bookings/{booking_id}/refund", post(refund_booking))
        .route("/bookings/{booking_id}/token", get(get_token))
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewBooking>,
) -> Result<impl IntoResponse, BookingError> {
    let booking = state.service.create_booking(req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings?buyerId=...
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingsQuery {
    buyer_id: String,
}

async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BookingsQuery>,
) -> Result<impl IntoResponse, BookingError> {
    if params.buyer_id.trim().is_empty() {
        return Err(BookingError::invalid_request("buyerId must not be empty"));
    }
    let bookings = state.service.list_bookings(&params.buyer_id).await?;
    Ok(Json(bookings))
}

// GET /api/bookings/{booking_id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.service.get_booking(&booking_id).await?))
}

// POST /api/bookings/{booking_id}/confirm - сигнал от платёжного слоя
async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
    Json(payment): Json<PaymentConfirmation>,
) -> Result<impl IntoResponse, BookingError> {
    let booking = state.service.confirm_booking(&booking_id, payment).await?;
    Ok(Json(booking))
}

// POST /api/bookings/{booking_id}/cancel
#[derive(Debug, Deserialize)]
struct CancelBookingRequest {
    reason: String,
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let booking = state.service.cancel_booking(&booking_id, &req.reason).await?;
    Ok(Json(booking))
}

// POST /api/bookings/{booking_id}/refund
async fn refund_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.service.refund_booking(&booking_id).await?))
}

// GET /api/bookings/{booking_id}/token
async fn get_token(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.service.issue_token(&booking_id).await?))
}
