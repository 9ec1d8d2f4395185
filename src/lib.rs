pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod ids;
pub mod inventory;
pub mod lifecycle;
pub mod models;
pub mod notifier;
pub mod redis_client;
pub mod services;
pub mod store;
pub mod token;

use std::sync::Arc;
use tracing::{info, warn};

pub use error::{BookingError, BookingResult};

use crate::inventory::MemorySeatInventory;
use crate::notifier::{NoopNotifier, Notifier, RedisNotifier};
use crate::services::BookingService;
use crate::store::MemoryBookingStore;
use crate::token::TokenIssuer;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
    pub config: config::Config,
}

impl AppState {
    /// Postgres + (опционально) Redis для уведомлений.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database).await?;
        info!("Database connected");
        db.run_migrations().await?;

        let notifier: Arc<dyn Notifier> = match &config.redis.url {
            Some(url) => {
                let redis = redis_client::RedisClient::new(url).await?;
                info!("Redis connected, publishing to {}:*", config.redis.channel_prefix);
                Arc::new(RedisNotifier::new(redis, config.redis.channel_prefix.clone()))
            }
            None => {
                warn!("REDIS_URL not set, booking notices are not published");
                Arc::new(NoopNotifier)
            }
        };

        let service = BookingService::new(
            db.seat_inventory(),
            db.booking_store(),
            notifier,
            TokenIssuer::new(&config.token),
            config.booking.clone(),
        );
        Ok(Arc::new(Self {
            service: Arc::new(service),
            config,
        }))
    }

    /// Всё в памяти процесса: для тестов и локального запуска без БД.
    pub fn in_memory(config: config::Config) -> Arc<Self> {
        let service = BookingService::new(
            Arc::new(MemorySeatInventory::new()),
            Arc::new(MemoryBookingStore::new()),
            Arc::new(NoopNotifier),
            TokenIssuer::new(&config.token),
            config.booking.clone(),
        );
        Arc::new(Self {
            service: Arc::new(service),
            config,
        })
    }
}
