use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use crate::error::{BookingError, BookingResult};
use crate::models::{Booking, BookingStatus};
use crate::store::{BookingStore, BookingUpdate};

/// In-process хранилище: отдельный mutex на каждую бронь.
#[derive(Default)]
pub struct MemoryBookingStore {
    bookings: RwLock<HashMap<String, Arc<Mutex<Booking>>>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, booking_id: &str) -> BookingResult<Option<Arc<Mutex<Booking>>>> {
        let map = self
            .bookings
            .read()
            .map_err(|_| BookingError::Internal("booking map lock poisoned".into()))?;
        Ok(map.get(booking_id).cloned())
    }

    fn entries(&self) -> BookingResult<Vec<Arc<Mutex<Booking>>>> {
        let map = self
            .bookings
            .read()
            .map_err(|_| BookingError::Internal("booking map lock poisoned".into()))?;
        Ok(map.values().cloned().collect())
    }

    async fn collect<F>(&self, keep: F) -> BookingResult<Vec<Booking>>
    where
        F: Fn(&Booking) -> bool,
    {
        let mut found = Vec::new();
        for entry in self.entries()? {
            let booking = entry.lock().await;
            if keep(&booking) {
                found.push(booking.clone());
            }
        }
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn insert(&self, booking: &Booking) -> BookingResult<()> {
        let mut map = self
            .bookings
            .write()
            .map_err(|_| BookingError::Internal("booking map lock poisoned".into()))?;
        if map.contains_key(&booking.booking_id) {
            return Err(BookingError::DuplicateBookingId(booking.booking_id.clone()));
        }
        map.insert(booking.booking_id.clone(), Arc::new(Mutex::new(booking.clone())));
        Ok(())
    }

    async fn get(&self, booking_id: &str) -> BookingResult<Option<Booking>> {
        match self.entry(booking_id)? {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn exists(&self, booking_id: &str) -> BookingResult<bool> {
        Ok(self.entry(booking_id)?.is_some())
    }

    async fn update(&self, booking_id: &str, apply: BookingUpdate<'_>) -> BookingResult<Booking> {
        let entry = self
            .entry(booking_id)?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))?;

        let mut stored = entry.lock().await;
        let mut draft = stored.clone();
        apply(&mut draft)?;
        draft.version = stored.version + 1;
        *stored = draft.clone();
        Ok(draft)
    }

    async fn list_by_buyer(&self, buyer_id: &str) -> BookingResult<Vec<Booking>> {
        self.collect(|b| b.buyer_id == buyer_id).await
    }

    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> BookingResult<Vec<Booking>> {
        self.collect(|b| b.status == BookingStatus::Pending && b.created_at < cutoff)
            .await
    }

    async fn list_unsettled(&self, cutoff: DateTime<Utc>) -> BookingResult<Vec<Booking>> {
        self.collect(|b| !b.pending_effects.is_empty() && b.updated_at < cutoff)
            .await
    }
}
