use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::BookingError;
use crate::services::booking::BookingService;

/// Итог одного прохода очистки.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryReport {
    pub found: usize,
    pub expired: usize,
    /// Бронь успела сменить статус (оплата пришла раньше) - не ошибка.
    pub skipped: usize,
    /// Брони, чьи недоведённые эффекты (места, токен) дозавершены.
    pub settled: usize,
    pub failed: usize,
}

/// Фоновая очистка: дозавершение упавших эффектов и истечение
/// pending-броней старше hold window.
pub struct ExpiryService {
    service: Arc<BookingService>,
}

impl ExpiryService {
    pub fn new(service: Arc<BookingService>) -> Self {
        Self { service }
    }

    /// Один проход: сначала брони с недоведёнными эффектами, потом все
    /// pending-брони, созданные раньше `now - hold_window`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> ExpiryReport {
        let mut report = ExpiryReport::default();
        self.settle(now, &mut report).await;

        let cutoff = now - self.service.config().hold_window();
        let stale = match self.service.bookings().list_pending_before(cutoff).await {
            Ok(stale) => stale,
            Err(e) => {
                error!("⏳ Failed to load stale bookings: {}", e);
                return report;
            }
        };

        report.found = stale.len();
        if stale.is_empty() {
            return report;
        }
        info!("⏳ Found {} stale pending bookings", stale.len());

        for booking in stale {
            match self.service.expire_booking(&booking.booking_id).await {
                Ok(_) => report.expired += 1,
                // Проигрыш гонке с подтверждением или ручной отменой
                Err(BookingError::InvalidTransition { from, .. }) => {
                    warn!("⏳ Booking {} is already {}, not expiring", booking.booking_id, from);
                    report.skipped += 1;
                }
                Err(e) => {
                    error!("⏳ Failed to expire booking {}: {}", booking.booking_id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "⏳ Expiry pass done: {} expired, {} skipped, {} settled, {} failed",
            report.expired, report.skipped, report.settled, report.failed
        );
        report
    }

    async fn settle(&self, now: DateTime<Utc>, report: &mut ExpiryReport) {
        let cutoff = now - self.service.config().settle_grace();
        let unsettled = match self.service.bookings().list_unsettled(cutoff).await {
            Ok(unsettled) => unsettled,
            Err(e) => {
                error!("🔧 Failed to load unsettled bookings: {}", e);
                return;
            }
        };
        if unsettled.is_empty() {
            return;
        }
        info!("🔧 Found {} bookings with unfinished side effects", unsettled.len());

        for booking in unsettled {
            match self.service.settle_booking(&booking.booking_id).await {
                Ok(_) => report.settled += 1,
                Err(e) => {
                    error!("🔧 Failed to settle booking {}: {}", booking.booking_id, e);
                    report.failed += 1;
                }
            }
        }
    }

    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                self.run_once(Utc::now()).await;
                tokio::time::sleep(interval).await;
            }
        })
    }
}
