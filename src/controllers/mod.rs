pub mod bookings;
pub mod checkin;
pub mod events;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::BookingError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(events::routes())
        .merge(bookings::routes())
        .merge(checkin::routes())
}

#[derive(Serialize)]
pub struct ApiError {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seats: Option<Vec<String>>,
}

impl BookingError {
    fn status_code(&self) -> StatusCode {
        match self {
            BookingError::SeatUnavailable { .. } | BookingError::InvalidTransition { .. } => StatusCode::CONFLICT,
            BookingError::InvalidToken => StatusCode::FORBIDDEN,
            BookingError::EventNotFound(_) | BookingError::BookingNotFound(_) => StatusCode::NOT_FOUND,
            BookingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            BookingError::DuplicateBookingId(_) | BookingError::Storage(_) | BookingError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Детали хранилища наружу не отдаём
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let seats = match self {
            BookingError::SeatUnavailable { seats, .. } => Some(seats),
            _ => None,
        };
        (status, Json(ApiError { success: false, message, seats })).into_response()
    }
}
