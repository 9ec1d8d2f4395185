use crate::models::BookingStatus;
use thiserror::Error;

/// Ошибки ядра бронирования.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Одно или несколько мест не `available` в момент захвата. Можно повторить с другими местами.
    #[error("seats unavailable for event {event_id}: [{}]", .seats.join(", "))]
    SeatUnavailable { event_id: String, seats: Vec<String> },

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    // Причина намеренно не раскрывается: сканер не должен узнать, существует ли бронь
    #[error("invalid token")]
    InvalidToken,

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("booking not found: {0}")]
    BookingNotFound(String),

    #[error("duplicate booking id: {0}")]
    DuplicateBookingId(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BookingError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        BookingError::InvalidRequest(message.into())
    }
}

impl From<serde_json::Error> for BookingError {
    fn from(e: serde_json::Error) -> Self {
        BookingError::Internal(format!("serialization: {e}"))
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
