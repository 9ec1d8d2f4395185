use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::SeatLine;

/// Статус физического места. `reserved` - удержание под pending-бронь, `booked` - продано.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Reserved,
    Booked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Reserved => "reserved",
            SeatStatus::Booked => "booked",
        }
    }

    pub fn is_held(&self) -> bool {
        !matches!(self, SeatStatus::Available)
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SeatStatus::Available),
            "reserved" => Ok(SeatStatus::Reserved),
            "booked" => Ok(SeatStatus::Booked),
            other => Err(format!("unknown seat status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRecord {
    pub seat_number: String,
    pub row: String,
    pub section: String,
    pub price: f64,
    pub status: SeatStatus,
    /// Id брони, удерживающей место.
    pub holder: Option<String>,
}

/// Описание места при публикации события.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatSpec {
    pub seat_number: String,
    pub row: String,
    pub section: String,
    pub price: f64,
}

impl SeatSpec {
    pub fn new(seat_number: impl Into<String>, row: impl Into<String>, section: impl Into<String>, price: f64) -> Self {
        Self {
            seat_number: seat_number.into(),
            row: row.into(),
            section: section.into(),
            price,
        }
    }
}

impl From<SeatSpec> for SeatRecord {
    fn from(spec: SeatSpec) -> Self {
        SeatRecord {
            seat_number: spec.seat_number,
            row: spec.row,
            section: spec.section,
            price: spec.price,
            status: SeatStatus::Available,
            holder: None,
        }
    }
}

/// Агрегированные счётчики. Всегда пересчитываются из статусов мест.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryCounters {
    pub total_seats: u32,
    pub available_seats: u32,
    pub reserved_seats: u32,
    pub booked_seats: u32,
}

impl InventoryCounters {
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a SeatStatus>) -> Self {
        let mut counters = InventoryCounters::default();
        for status in statuses {
            counters.total_seats += 1;
            match status {
                SeatStatus::Available => counters.available_seats += 1,
                SeatStatus::Reserved => counters.reserved_seats += 1,
                SeatStatus::Booked => counters.booked_seats += 1,
            }
        }
        counters
    }

    pub fn is_consistent(&self) -> bool {
        self.total_seats == self.available_seats + self.reserved_seats + self.booked_seats
    }
}

/// Результат успешного захвата мест (с ценами).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedSeats {
    pub event_id: String,
    pub currency: String,
    pub seats: Vec<SeatLine>,
    pub counters: InventoryCounters,
}

impl ClaimedSeats {
    pub fn seat_numbers(&self) -> Vec<String> {
        self.seats.iter().map(|s| s.seat_number.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasedSeats {
    pub event_id: String,
    /// Только те места, которые реально были освобождены этим вызовом.
    pub released: Vec<String>,
    pub counters: InventoryCounters,
}
