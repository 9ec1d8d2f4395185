//! Хранилище броней - единственный писатель поля `status`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BookingResult;
use crate::models::Booking;

pub use memory::MemoryBookingStore;
pub use postgres::PgBookingStore;

/// Мутация брони под её блокировкой. Ошибка - ничего не сохраняется.
pub type BookingUpdate<'a> = Box<dyn FnOnce(&mut Booking) -> BookingResult<()> + Send + 'a>;

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// `DuplicateBookingId`, если id уже занят.
    async fn insert(&self, booking: &Booking) -> BookingResult<()>;

    async fn get(&self, booking_id: &str) -> BookingResult<Option<Booking>>;

    async fn exists(&self, booking_id: &str) -> BookingResult<bool>;

    /// Переходы одной брони сериализуются: `apply` выполняется под блокировкой
    /// этой брони, и результат сохраняется с увеличенной `version`.
    /// `BookingNotFound`, если брони нет.
    async fn update(&self, booking_id: &str, apply: BookingUpdate<'_>) -> BookingResult<Booking>;

    async fn list_by_buyer(&self, buyer_id: &str) -> BookingResult<Vec<Booking>>;

    /// Pending-брони, созданные раньше `cutoff` (кандидаты на истечение).
    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> BookingResult<Vec<Booking>>;

    /// Брони с непустой очередью `pending_effects`, последний переход которых
    /// случился раньше `cutoff`.
    async fn list_unsettled(&self, cutoff: DateTime<Utc>) -> BookingResult<Vec<Booking>>;
}
