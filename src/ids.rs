use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::store::BookingStore;

const MAX_ATTEMPTS: usize = 8;
const SUFFIX_LEN: usize = 6;

/// Человекочитаемые id броней: `BK-20261019143005-7F3A9C`.
#[derive(Debug, Clone)]
pub struct BookingIdGenerator {
    prefix: String,
}

impl BookingIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn candidate(&self, now: DateTime<Utc>) -> String {
        let random = Uuid::new_v4().simple().to_string().to_uppercase();
        format!(
            "{}-{}-{}",
            self.prefix,
            now.format("%Y%m%d%H%M%S"),
            &random[..SUFFIX_LEN]
        )
    }

    /// Id, которого ещё нет в хранилище. Окончательную уникальность
    /// гарантирует `insert` (дубликат -> `DuplicateBookingId`).
    pub async fn next(&self, store: &dyn BookingStore, now: DateTime<Utc>) -> BookingResult<String> {
        for _ in 0..MAX_ATTEMPTS {
            let id = self.candidate(now);
            if !store.exists(&id).await? {
                return Ok(id);
            }
            tracing::debug!("booking id collision on {}, retrying", id);
        }
        Err(BookingError::Internal(format!(
            "could not allocate a unique booking id after {MAX_ATTEMPTS} attempts"
        )))
    }
}
