use axum::{
    extract::State,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::BookingError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tokens/validate", post(validate_token))
        .route("/checkin", post(check_in))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanRequest {
    token: String,
    /// Станция сканирования привязана к событию.
    event_id: Option<String>,
    staff_id: Option<String>,
}

// POST /api/tokens/validate - только проверка, статус брони не меняется
async fn validate_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let valid = state
        .service
        .validate_token(&req.token, req.event_id.as_deref())
        .await?;
    Ok(Json(json!({
        "valid": true,
        "payload": valid.payload,
        "status": valid.booking.status,
    })))
}

// POST /api/checkin
async fn check_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScanRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let staff_id = req
        .staff_id
        .as_deref()
        .ok_or_else(|| BookingError::invalid_request("staffId is required"))?;
    let booking = state
        .service
        .validate_and_check_in(&req.token, staff_id, req.event_id.as_deref())
        .await?;
    Ok(Json(booking))
}
