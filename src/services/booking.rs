//! booking.rs
//!
//! Сервис жизненного цикла брони. Связывает инвентарь мест, хранилище броней,
//! машину состояний и выдачу токенов.
//!
//! Порядок всегда один: взять блокировку, изменить статус и поставить эффекты
//! в очередь брони, отпустить, и только потом исполнить побочные эффекты
//! (места, токен, уведомления) и снять их из очереди. Внешние вызовы под
//! блокировкой не выполняются. Если эффект упал, он остаётся в очереди и его
//! дозавершает `settle_booking` из фоновой очистки.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use validator::Validate;

use crate::config::BookingConfig;
use crate::error::{BookingError, BookingResult};
use crate::ids::BookingIdGenerator;
use crate::inventory::SeatInventory;
use crate::lifecycle::{self, BookingEvent, SideEffect, Transition};
use crate::models::event::check_seat_request;
use crate::models::{
    AttendeeInfo, Booking, BookingStatus, EventSeating, PaymentConfirmation, SeatMap, SeatSpec,
    SeatStatus, Token,
};
use crate::notifier::{Notice, Notifier};
use crate::store::BookingStore;
use crate::token::{TokenIssuer, ValidToken};

/// Запрос на создание брони (уже прошедший аутентификацию).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    #[validate(length(min = 1, max = 128))]
    pub event_id: String,
    #[validate(length(min = 1, max = 128))]
    pub buyer_id: String,
    #[validate(length(min = 1))]
    pub seat_numbers: Vec<String>,
    #[validate(nested)]
    pub attendee_info: AttendeeInfo,
}

pub(crate) fn validated<T: Validate>(value: &T) -> BookingResult<()> {
    value
        .validate()
        .map_err(|e| BookingError::invalid_request(e.to_string()))
}

pub struct BookingService {
    inventory: Arc<dyn SeatInventory>,
    bookings: Arc<dyn BookingStore>,
    notifier: Arc<dyn Notifier>,
    tokens: TokenIssuer,
    ids: BookingIdGenerator,
    config: BookingConfig,
}

impl BookingService {
    pub fn new(
        inventory: Arc<dyn SeatInventory>,
        bookings: Arc<dyn BookingStore>,
        notifier: Arc<dyn Notifier>,
        tokens: TokenIssuer,
        config: BookingConfig,
    ) -> Self {
        Self {
            ids: BookingIdGenerator::new(config.id_prefix.clone()),
            inventory,
            bookings,
            notifier,
            tokens,
            config,
        }
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    pub fn bookings(&self) -> &dyn BookingStore {
        self.bookings.as_ref()
    }

    // --- Инвентарь ---

    pub async fn publish_event(
        &self,
        event_id: &str,
        currency: &str,
        seats: Vec<SeatSpec>,
    ) -> BookingResult<SeatMap> {
        let seating = EventSeating::publish(event_id, currency, seats)?;
        let counters = self.inventory.publish_event(seating).await?;
        info!("Published event {} with {} seats", event_id, counters.total_seats);
        self.inventory.seat_map(event_id).await
    }

    pub async fn seat_map(&self, event_id: &str) -> BookingResult<SeatMap> {
        self.inventory.seat_map(event_id).await
    }

    // --- Брони ---

    /// CreateBooking: захват мест + pending-бронь как одна логическая операция.
    /// Если бронь не сохранилась, захват откатывается.
    pub async fn create_booking(&self, request: NewBooking) -> BookingResult<Booking> {
        validated(&request)?;
        check_seat_request(&request.seat_numbers)?;
        if request.seat_numbers.len() > self.config.max_seats_per_booking {
            return Err(BookingError::invalid_request(format!(
                "at most {} seats per booking",
                self.config.max_seats_per_booking
            )));
        }

        let now = Utc::now();
        let booking_id = self.ids.next(self.bookings.as_ref(), now).await?;

        let claimed = self
            .inventory
            .claim_seats(&request.event_id, &request.seat_numbers, &booking_id)
            .await
            .inspect_err(|e| {
                if let BookingError::SeatUnavailable { seats, .. } = e {
                    warn!(
                        "Seat claim for buyer {} on event {} lost: {:?} taken",
                        request.buyer_id, request.event_id, seats
                    );
                }
            })?;

        let booking = Booking::new_pending(
            booking_id,
            request.buyer_id,
            request.event_id,
            claimed.currency.clone(),
            claimed.seats.clone(),
            request.attendee_info,
            now,
        );

        if let Err(e) = self.bookings.insert(&booking).await {
            error!("Failed to persist booking {}: {}, rolling back seat claim", booking.booking_id, e);
            let seats = claimed.seat_numbers();
            if let Err(release_err) = self
                .inventory
                .release_seats(&booking.event_id, &seats, Some(&booking.booking_id))
                .await
            {
                error!(
                    "Rollback of seats {:?} for booking {} failed: {}",
                    seats, booking.booking_id, release_err
                );
            }
            return Err(e);
        }

        info!(
            "Booking {} created for buyer {}: {} seat(s) on event {}",
            booking.booking_id,
            booking.buyer_id,
            booking.seats.len(),
            booking.event_id
        );
        self.notifier
            .publish(Notice::SeatsChanged {
                event_id: booking.event_id.clone(),
                booking_id: booking.booking_id.clone(),
                seats: claimed.seat_numbers(),
                status: SeatStatus::Reserved,
                counters: claimed.counters,
            })
            .await;
        self.notifier
            .publish(Notice::BookingTransitioned {
                event_id: booking.event_id.clone(),
                booking_id: booking.booking_id.clone(),
                from: None,
                to: BookingStatus::Pending,
            })
            .await;

        Ok(booking)
    }

    /// ConfirmBooking: сигнал об оплате. Места `reserved -> booked`, выдаётся токен.
    pub async fn confirm_booking(
        &self,
        booking_id: &str,
        payment: PaymentConfirmation,
    ) -> BookingResult<Booking> {
        validated(&payment)?;
        self.drive(booking_id, BookingEvent::PaymentConfirmed(payment)).await
    }

    /// CancelBooking: места возвращаются в инвентарь.
    pub async fn cancel_booking(&self, booking_id: &str, reason: &str) -> BookingResult<Booking> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(BookingError::invalid_request("cancellation reason must not be empty"));
        }
        self.drive(booking_id, BookingEvent::Cancel { reason: reason.to_string() })
            .await
    }

    /// Истечение hold window. Проигрывает гонку с подтверждением как `InvalidTransition`.
    pub async fn expire_booking(&self, booking_id: &str) -> BookingResult<Booking> {
        self.drive(booking_id, BookingEvent::Expire).await
    }

    /// Возврат по отменённой оплаченной брони.
    pub async fn refund_booking(&self, booking_id: &str) -> BookingResult<Booking> {
        self.drive(booking_id, BookingEvent::Refund).await
    }

    pub async fn get_booking(&self, booking_id: &str) -> BookingResult<Booking> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(booking_id.to_string()))
    }

    pub async fn list_bookings(&self, buyer_id: &str) -> BookingResult<Vec<Booking>> {
        self.bookings.list_by_buyer(buyer_id).await
    }

    // --- Токены ---

    /// Идемпотентная выдача токена подтверждённой брони.
    pub async fn issue_token(&self, booking_id: &str) -> BookingResult<Token> {
        let booking = self.get_booking(booking_id).await?;
        if let Some(token) = booking.token {
            return Ok(token);
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::invalid_request(format!(
                "booking {} is {}, token not issued",
                booking.booking_id, booking.status
            )));
        }
        let booking = self
            .run_effects(booking, &[SideEffect::IssueToken], vec![SideEffect::IssueToken])
            .await?;
        booking.token.ok_or_else(|| {
            BookingError::invalid_request(format!(
                "booking {} is {}, token not issued",
                booking.booking_id, booking.status
            ))
        })
    }

    /// Проверка без изменения состояния брони.
    pub async fn validate_token(
        &self,
        presented: &str,
        expected_event_id: Option<&str>,
    ) -> BookingResult<ValidToken> {
        self.tokens
            .validate(presented, expected_event_id, self.bookings.as_ref())
            .await
    }

    /// ValidateAndCheckIn: токен должен быть валиден, потом отдельный переход `checked-in`.
    pub async fn validate_and_check_in(
        &self,
        presented: &str,
        staff_id: &str,
        expected_event_id: Option<&str>,
    ) -> BookingResult<Booking> {
        if staff_id.trim().is_empty() {
            return Err(BookingError::invalid_request("staff id must not be empty"));
        }
        let valid = self.validate_token(presented, expected_event_id).await?;
        self.drive(
            &valid.booking.booking_id,
            BookingEvent::CheckIn { staff_id: staff_id.to_string() },
        )
        .await
    }

    /// Дозавершает эффекты, оставшиеся в очереди брони после сбоя. Идемпотентно:
    /// места фиксируются и освобождаются только для этой брони.
    pub async fn settle_booking(&self, booking_id: &str) -> BookingResult<Booking> {
        let booking = self.get_booking(booking_id).await?;
        if booking.pending_effects.is_empty() {
            return Ok(booking);
        }
        let queued = booking.pending_effects.clone();
        let outstanding = lifecycle::outstanding_effects(&booking);
        info!(
            "Booking {} ({}): settling {:?} of queued {:?}",
            booking_id, booking.status, outstanding, queued
        );
        self.run_effects(booking, &outstanding, queued).await
    }

    // --- Внутреннее ---

    /// Переход под блокировкой брони, затем побочные эффекты.
    async fn drive(&self, booking_id: &str, event: BookingEvent) -> BookingResult<Booking> {
        let (booking, transition) = self.transition(booking_id, event).await?;
        if transition.effects.is_empty() {
            return Ok(booking);
        }
        self.run_effects(booking, &transition.effects, transition.effects.clone())
            .await
            .inspect_err(|e| {
                error!(
                    "Booking {}: {} -> {} saved, side effects {:?} left queued: {}",
                    booking_id, transition.from, transition.to, transition.effects, e
                );
            })
    }

    async fn transition(
        &self,
        booking_id: &str,
        event: BookingEvent,
    ) -> BookingResult<(Booking, Transition)> {
        let now = Utc::now();
        let mut applied = None;
        let booking = self
            .bookings
            .update(
                booking_id,
                Box::new(|booking: &mut Booking| -> BookingResult<()> {
                    applied = Some(lifecycle::apply(booking, &event, now)?);
                    Ok(())
                }),
            )
            .await
            .inspect_err(|e| {
                if let BookingError::InvalidTransition { from, to } = e {
                    warn!("Booking {}: rejected transition {} -> {}", booking_id, from, to);
                }
            })?;

        let transition = applied
            .ok_or_else(|| BookingError::Internal(format!("transition of {booking_id} was not applied")))?;
        info!("Booking {}: {} -> {}", booking_id, transition.from, transition.to);

        self.notifier
            .publish(Notice::BookingTransitioned {
                event_id: booking.event_id.clone(),
                booking_id: booking.booking_id.clone(),
                from: Some(transition.from),
                to: transition.to,
            })
            .await;
        Ok((booking, transition))
    }

    /// Исполняет `run`, затем одной записью под блокировкой брони сохраняет
    /// токен и снимает `settles` из очереди. Если шаг упал, очередь не трогается.
    async fn run_effects(
        &self,
        booking: Booking,
        run: &[SideEffect],
        settles: Vec<SideEffect>,
    ) -> BookingResult<Booking> {
        let seats = booking.seat_numbers();

        if run.contains(&SideEffect::CommitSeats) {
            let (committed, counters) = self
                .inventory
                .commit_seats(&booking.event_id, &seats, &booking.booking_id)
                .await?;
            if committed.len() != seats.len() {
                warn!(
                    "Booking {}: only {} of {} seats committed",
                    booking.booking_id,
                    committed.len(),
                    seats.len()
                );
            }
            self.notifier
                .publish(Notice::SeatsChanged {
                    event_id: booking.event_id.clone(),
                    booking_id: booking.booking_id.clone(),
                    seats: committed,
                    status: SeatStatus::Booked,
                    counters,
                })
                .await;
        }

        if run.contains(&SideEffect::ReleaseSeats) {
            // Освобождаем только места этой брони: повтор или гонка ничего не сломают
            let released = self
                .inventory
                .release_seats(&booking.event_id, &seats, Some(&booking.booking_id))
                .await?;
            info!(
                "Booking {}: released {} seat(s) on event {}",
                booking.booking_id,
                released.released.len(),
                booking.event_id
            );
            self.notifier
                .publish(Notice::SeatsChanged {
                    event_id: booking.event_id.clone(),
                    booking_id: booking.booking_id.clone(),
                    seats: released.released,
                    status: SeatStatus::Available,
                    counters: released.counters,
                })
                .await;
        }

        // Рендер вне блокировки; сохраняется, только если бронь всё ещё `confirmed`
        let token = if run.contains(&SideEffect::IssueToken) && booking.token.is_none() {
            Some(self.tokens.issue(&booking)?)
        } else {
            None
        };
        let issuing = token.is_some();

        let booking_id = booking.booking_id.clone();
        let updated = self
            .bookings
            .update(
                &booking_id,
                Box::new(move |stored: &mut Booking| -> BookingResult<()> {
                    if let Some(token) = token {
                        if stored.token.is_none() && stored.status == BookingStatus::Confirmed {
                            stored.token = Some(token);
                        }
                    }
                    stored.pending_effects.retain(|effect| !settles.contains(effect));
                    Ok(())
                }),
            )
            .await?;
        if issuing && updated.token.is_some() {
            info!("Booking {}: check-in token issued", booking_id);
        }
        Ok(updated)
    }
}
