//! Уведомления о зафиксированных изменениях (карта мест, статусы броней).
//!
//! Ядро вызывает `Notifier` после фиксации, вне блокировок. Ошибки доставки
//! логируются и не влияют на результат операции.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{BookingStatus, InventoryCounters, SeatStatus};
use crate::redis_client::RedisClient;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    SeatsChanged {
        event_id: String,
        booking_id: String,
        seats: Vec<String>,
        status: SeatStatus,
        counters: InventoryCounters,
    },
    BookingTransitioned {
        event_id: String,
        booking_id: String,
        from: Option<BookingStatus>,
        to: BookingStatus,
    },
}

impl Notice {
    pub fn event_id(&self) -> &str {
        match self {
            Notice::SeatsChanged { event_id, .. } | Notice::BookingTransitioned { event_id, .. } => event_id,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, notice: Notice);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn publish(&self, notice: Notice) {
        debug!(event_id = notice.event_id(), "notice dropped (no notifier configured)");
    }
}

/// Публикует JSON в Redis-канал `<prefix>:<event_id>`.
pub struct RedisNotifier {
    redis: RedisClient,
    channel_prefix: String,
}

impl RedisNotifier {
    pub fn new(redis: RedisClient, channel_prefix: impl Into<String>) -> Self {
        Self {
            redis,
            channel_prefix: channel_prefix.into(),
        }
    }

    pub fn channel(&self, event_id: &str) -> String {
        format!("{}:{}", self.channel_prefix, event_id)
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn publish(&self, notice: Notice) {
        let channel = self.channel(notice.event_id());
        let payload = match serde_json::to_string(&notice) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize notice for {}: {}", channel, e);
                return;
            }
        };
        match self.redis.publish(&channel, &payload).await {
            Ok(receivers) => debug!("Published notice to {} ({} receivers)", channel, receivers),
            Err(e) => warn!("Failed to publish notice to {}: {}", channel, e),
        }
    }
}
