//! Инвентарь мест - единственный писатель статусов мест.
//!
//! `claim_seats` - критическая секция на уровне события: проверка и запись статуса
//! выполняются атомарно (mutex события в памяти, блокировка строки события +
//! условный `UPDATE ... WHERE status = 'available'` в Postgres).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::BookingResult;
use crate::models::{ClaimedSeats, EventSeating, InventoryCounters, ReleasedSeats, SeatMap};

pub use memory::MemorySeatInventory;
pub use postgres::PgSeatInventory;

#[async_trait]
pub trait SeatInventory: Send + Sync {
    /// Массовое создание мест при публикации события.
    async fn publish_event(&self, seating: EventSeating) -> BookingResult<InventoryCounters>;

    /// Все запрошенные места `available -> reserved` или ни одного.
    /// `SeatUnavailable` перечисляет занятые места, `EventNotFound` - нет события.
    async fn claim_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        claimant_id: &str,
    ) -> BookingResult<ClaimedSeats>;

    /// `reserved -> booked` для мест, удерживаемых `holder_id`.
    async fn commit_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        holder_id: &str,
    ) -> BookingResult<(Vec<String>, InventoryCounters)>;

    /// Идемпотентное освобождение. С `holder_id` трогает только места этого держателя.
    async fn release_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        holder_id: Option<&str>,
    ) -> BookingResult<ReleasedSeats>;

    async fn seat_map(&self, event_id: &str) -> BookingResult<SeatMap>;
}
