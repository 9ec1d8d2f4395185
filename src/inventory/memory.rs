use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use crate::error::{BookingError, BookingResult};
use crate::inventory::SeatInventory;
use crate::models::{ClaimedSeats, EventSeating, InventoryCounters, ReleasedSeats, SeatMap};

/// Инвентарь в памяти процесса: все операции над событием идут под его mutex.
#[derive(Default)]
pub struct MemorySeatInventory {
    events: RwLock<HashMap<String, Arc<Mutex<EventSeating>>>>,
}

impl MemorySeatInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn event(&self, event_id: &str) -> BookingResult<Arc<Mutex<EventSeating>>> {
        let events = self
            .events
            .read()
            .map_err(|_| BookingError::Internal("inventory lock poisoned".into()))?;
        events
            .get(event_id)
            .cloned()
            .ok_or_else(|| BookingError::EventNotFound(event_id.to_string()))
    }
}

#[async_trait]
impl SeatInventory for MemorySeatInventory {
    async fn publish_event(&self, seating: EventSeating) -> BookingResult<InventoryCounters> {
        let mut events = self
            .events
            .write()
            .map_err(|_| BookingError::Internal("inventory lock poisoned".into()))?;
        if events.contains_key(seating.event_id()) {
            return Err(BookingError::invalid_request(format!(
                "event {} is already published",
                seating.event_id()
            )));
        }
        let counters = seating.counters();
        events.insert(seating.event_id().to_string(), Arc::new(Mutex::new(seating)));
        Ok(counters)
    }

    async fn claim_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        claimant_id: &str,
    ) -> BookingResult<ClaimedSeats> {
        let event = self.event(event_id)?;
        let mut seating = event.lock().await;
        let seats = seating.claim(seat_numbers, claimant_id)?;
        Ok(ClaimedSeats {
            event_id: event_id.to_string(),
            currency: seating.currency().to_string(),
            seats,
            counters: seating.counters(),
        })
    }

    async fn commit_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        holder_id: &str,
    ) -> BookingResult<(Vec<String>, InventoryCounters)> {
        let event = self.event(event_id)?;
        let mut seating = event.lock().await;
        let committed = seating.commit(seat_numbers, holder_id);
        Ok((committed, seating.counters()))
    }

    async fn release_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        holder_id: Option<&str>,
    ) -> BookingResult<ReleasedSeats> {
        let event = self.event(event_id)?;
        let mut seating = event.lock().await;
        let released = seating.release(seat_numbers, holder_id);
        Ok(ReleasedSeats {
            event_id: event_id.to_string(),
            released,
            counters: seating.counters(),
        })
    }

    async fn seat_map(&self, event_id: &str) -> BookingResult<SeatMap> {
        let event = self.event(event_id)?;
        let seating = event.lock().await;
        Ok(seating.snapshot())
    }
}
