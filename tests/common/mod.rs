#![allow(dead_code)]

use async_trait::async_trait;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use booking_engine::config::{BookingConfig, TokenConfig};
use booking_engine::inventory::{MemorySeatInventory, SeatInventory};
use booking_engine::models::{
    AttendeeInfo, Booking, ClaimedSeats, EventSeating, InventoryCounters, PaymentConfirmation,
    ReleasedSeats, SeatMap, SeatSpec,
};
use booking_engine::{BookingError, BookingResult};
use booking_engine::notifier::{Notice, Notifier};
use booking_engine::services::{BookingService, NewBooking};
use booking_engine::store::{BookingStore, MemoryBookingStore};
use booking_engine::token::TokenIssuer;

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn taken(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Инвентарь в памяти, у которого commit/release падают заданное число раз.
#[derive(Default)]
pub struct FlakyInventory {
    pub inner: MemorySeatInventory,
    pub commit_failures: AtomicUsize,
    pub release_failures: AtomicUsize,
}

impl FlakyInventory {
    fn trip(counter: &AtomicUsize) -> BookingResult<()> {
        let tripped = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(BookingError::Internal("inventory unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SeatInventory for FlakyInventory {
    async fn publish_event(&self, seating: EventSeating) -> BookingResult<InventoryCounters> {
        self.inner.publish_event(seating).await
    }

    async fn claim_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        claimant_id: &str,
    ) -> BookingResult<ClaimedSeats> {
        self.inner.claim_seats(event_id, seat_numbers, claimant_id).await
    }

    async fn commit_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        holder_id: &str,
    ) -> BookingResult<(Vec<String>, InventoryCounters)> {
        Self::trip(&self.commit_failures)?;
        self.inner.commit_seats(event_id, seat_numbers, holder_id).await
    }

    async fn release_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        holder_id: Option<&str>,
    ) -> BookingResult<ReleasedSeats> {
        Self::trip(&self.release_failures)?;
        self.inner.release_seats(event_id, seat_numbers, holder_id).await
    }

    async fn seat_map(&self, event_id: &str) -> BookingResult<SeatMap> {
        self.inner.seat_map(event_id).await
    }
}

pub struct Harness {
    pub service: Arc<BookingService>,
    pub inventory: Arc<dyn SeatInventory>,
    pub bookings: Arc<dyn BookingStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn token_config() -> TokenConfig {
    TokenConfig {
        secret: "test-secret".to_string(),
        issuer: "booking-engine".to_string(),
    }
}

pub fn harness() -> Harness {
    harness_with_store(Arc::new(MemoryBookingStore::new()))
}

pub fn harness_with_store(bookings: Arc<dyn BookingStore>) -> Harness {
    harness_with(Arc::new(MemorySeatInventory::new()), bookings)
}

pub fn harness_with(inventory: Arc<dyn SeatInventory>, bookings: Arc<dyn BookingStore>) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = BookingService::new(
        inventory.clone(),
        bookings.clone(),
        notifier.clone(),
        TokenIssuer::new(&token_config()),
        BookingConfig::default(),
    );
    Harness {
        service: Arc::new(service),
        inventory,
        bookings,
        notifier,
    }
}

pub fn row(prefix: &str, count: usize, price: f64) -> Vec<SeatSpec> {
    (1..=count)
        .map(|i| SeatSpec::new(format!("{prefix}{i}"), prefix, "Parterre", price))
        .collect()
}

pub fn attendee() -> AttendeeInfo {
    AttendeeInfo {
        name: Name().fake(),
        email: SafeEmail().fake(),
        phone: None,
    }
}

pub fn request(event_id: &str, buyer_id: &str, seats: &[&str]) -> NewBooking {
    NewBooking {
        event_id: event_id.to_string(),
        buyer_id: buyer_id.to_string(),
        seat_numbers: seats.iter().map(|s| s.to_string()).collect(),
        attendee_info: attendee(),
    }
}

pub fn payment(tx: &str) -> PaymentConfirmation {
    PaymentConfirmation {
        method: "card".to_string(),
        transaction_id: tx.to_string(),
    }
}

/// Все брони события, которые держат места.
pub async fn held_by_bookings(store: &dyn BookingStore, buyers: &[&str], event_id: &str) -> usize {
    let mut held = 0;
    for buyer in buyers {
        let bookings: Vec<Booking> = store.list_by_buyer(buyer).await.unwrap();
        held += bookings
            .iter()
            .filter(|b| b.event_id == event_id && b.status.holds_seats())
            .map(|b| b.seats.len())
            .sum::<usize>();
    }
    held
}
