use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::models::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Refunded,
    CheckedIn,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Refunded,
        BookingStatus::CheckedIn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Refunded => "refunded",
            BookingStatus::CheckedIn => "checked-in",
        }
    }

    /// Бронь в этом статусе держит свои места.
    pub fn holds_seats(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::CheckedIn
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown booking status '{s}'"))
    }
}

/// Место в брони с ценой на момент захвата.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatLine {
    pub seat_number: String,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub method: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_date: Option<DateTime<Utc>>,
}

/// Внешний сигнал об успешной оплате.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    #[validate(length(min = 1, max = 64))]
    pub method: String,
    #[validate(length(min = 1, max = 128))]
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInInfo {
    pub is_checked_in: bool,
    pub check_in_time: Option<DateTime<Utc>>,
    pub checked_in_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundDetails {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
    /// Отменена оплаченная бронь - можно оформить возврат.
    pub refund_eligible: bool,
    pub refunded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeInfo {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3, max = 32))]
    pub phone: Option<String>,
}

/// Побочный эффект перехода. Ставится в очередь брони вместе со статусом
/// и снимается только после успешного исполнения.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// `reserved -> booked` для мест брони.
    CommitSeats,
    IssueToken,
    /// Вернуть места брони в инвентарь.
    ReleaseSeats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: String,
    pub buyer_id: String,
    pub event_id: String,
    pub seats: Vec<SeatLine>,
    pub total_amount: f64,
    pub currency: String,
    pub status: BookingStatus,
    pub payment_info: PaymentInfo,
    pub check_in_info: CheckInInfo,
    pub refund_details: Option<RefundDetails>,
    pub token: Option<Token>,
    pub attendee_info: AttendeeInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Эффекты сохранённых переходов, ещё не доведённые до инвентаря.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_effects: Vec<SideEffect>,
    /// Растёт на каждом сохранённом переходе.
    pub version: i64,
}

impl Booking {
    pub fn new_pending(
        booking_id: String,
        buyer_id: String,
        event_id: String,
        currency: String,
        seats: Vec<SeatLine>,
        attendee_info: AttendeeInfo,
        now: DateTime<Utc>,
    ) -> Self {
        let total_amount = seats.iter().map(|s| s.price).sum();
        Self {
            booking_id,
            buyer_id,
            event_id,
            seats,
            total_amount,
            currency,
            status: BookingStatus::Pending,
            payment_info: PaymentInfo::default(),
            check_in_info: CheckInInfo::default(),
            refund_details: None,
            token: None,
            attendee_info,
            created_at: now,
            updated_at: now,
            pending_effects: Vec::new(),
            version: 0,
        }
    }

    pub fn seat_numbers(&self) -> Vec<String> {
        self.seats.iter().map(|s| s.seat_number.clone()).collect()
    }
}
