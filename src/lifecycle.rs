//! Машина состояний брони.
//!
//! ```text
//! pending   --payment-->  confirmed   --check-in-->  checked-in
//!    \                      |
//!     `--cancel/expire-->  cancelled  --refund-->  refunded
//! ```
//!
//! `apply` чистая: сначала проверяет переход, потом мутирует. Побочные эффекты
//! (места, токен) возвращаются как данные и одновременно ставятся в очередь
//! `pending_effects`, которая сохраняется вместе со статусом. Сервис исполняет
//! их после фиксации и снимает из очереди; после сбоя их дозавершает очистка.

use chrono::{DateTime, Utc};

use crate::error::{BookingError, BookingResult};
use crate::models::{
    Booking, BookingStatus, PaymentConfirmation, PaymentStatus, RefundDetails,
};

pub use crate::models::SideEffect;

pub const HOLD_EXPIRED_REASON: &str = "hold window expired";

#[derive(Debug, Clone, PartialEq)]
pub enum BookingEvent {
    PaymentConfirmed(PaymentConfirmation),
    Cancel { reason: String },
    CheckIn { staff_id: String },
    /// Истёк hold window. В отличие от `Cancel`, допустимо только из `pending`,
    /// поэтому проигрывает гонку с поздним подтверждением оплаты.
    Expire,
    Refund,
}

impl BookingEvent {
    pub fn target(&self) -> BookingStatus {
        match self {
            BookingEvent::PaymentConfirmed(_) => BookingStatus::Confirmed,
            BookingEvent::Cancel { .. } | BookingEvent::Expire => BookingStatus::Cancelled,
            BookingEvent::CheckIn { .. } => BookingStatus::CheckedIn,
            BookingEvent::Refund => BookingStatus::Refunded,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub effects: Vec<SideEffect>,
}

/// Применяет событие к брони. При ошибке бронь не меняется.
pub fn apply(
    booking: &mut Booking,
    event: &BookingEvent,
    now: DateTime<Utc>,
) -> BookingResult<Transition> {
    let from = booking.status;
    let to = event.target();

    let effects = match (from, event) {
        (BookingStatus::Pending, BookingEvent::PaymentConfirmed(payment)) => {
            booking.payment_info.method = Some(payment.method.clone());
            booking.payment_info.transaction_id = Some(payment.transaction_id.clone());
            booking.payment_info.payment_status = PaymentStatus::Completed;
            booking.payment_info.payment_date = Some(now);
            vec![SideEffect::CommitSeats, SideEffect::IssueToken]
        }
        (BookingStatus::Pending | BookingStatus::Confirmed, BookingEvent::Cancel { reason }) => {
            booking.refund_details = Some(RefundDetails {
                reason: reason.clone(),
                cancelled_at: now,
                refund_eligible: booking.payment_info.payment_status == PaymentStatus::Completed,
                refunded_at: None,
            });
            vec![SideEffect::ReleaseSeats]
        }
        (BookingStatus::Pending, BookingEvent::Expire) => {
            booking.refund_details = Some(RefundDetails {
                reason: HOLD_EXPIRED_REASON.to_string(),
                cancelled_at: now,
                refund_eligible: false,
                refunded_at: None,
            });
            vec![SideEffect::ReleaseSeats]
        }
        (BookingStatus::Confirmed, BookingEvent::CheckIn { staff_id }) => {
            booking.check_in_info.is_checked_in = true;
            booking.check_in_info.check_in_time = Some(now);
            booking.check_in_info.checked_in_by = Some(staff_id.clone());
            Vec::new()
        }
        (BookingStatus::Cancelled, BookingEvent::Refund) if is_refund_eligible(booking) => {
            if let Some(details) = booking.refund_details.as_mut() {
                details.refunded_at = Some(now);
            }
            booking.payment_info.payment_status = PaymentStatus::Refunded;
            Vec::new()
        }
        _ => return Err(BookingError::InvalidTransition { from, to }),
    };

    for effect in &effects {
        if !booking.pending_effects.contains(effect) {
            booking.pending_effects.push(*effect);
        }
    }
    booking.status = to;
    booking.updated_at = now;
    Ok(Transition { from, to, effects })
}

/// Какие из поставленных в очередь эффектов ещё имеют смысл при текущем статусе.
/// Отменённой брони нужно только освобождение мест, живой - фиксация и токен.
pub fn outstanding_effects(booking: &Booking) -> Vec<SideEffect> {
    booking
        .pending_effects
        .iter()
        .copied()
        .filter(|effect| match effect {
            SideEffect::ReleaseSeats => !booking.status.holds_seats(),
            SideEffect::CommitSeats => booking.status.holds_seats(),
            SideEffect::IssueToken => booking.status == BookingStatus::Confirmed,
        })
        .collect()
}

fn is_refund_eligible(booking: &Booking) -> bool {
    booking
        .refund_details
        .as_ref()
        .map(|d| d.refund_eligible && d.refunded_at.is_none())
        .unwrap_or(false)
}
