use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::inventory::{PgSeatInventory, SeatInventory};
use crate::store::{BookingStore, PgBookingStore};

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.url)
            .await?;

        Ok(Database { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running booking engine migrations...");
        sqlx::migrate!("./src/migrations").run(&self.pool).await?;
        info!("Migrations completed");
        Ok(())
    }

    // Оба бэкенда делят один пул соединений
    pub fn seat_inventory(&self) -> Arc<dyn SeatInventory> {
        Arc::new(PgSeatInventory::new(self.pool.clone()))
    }

    pub fn booking_store(&self) -> Arc<dyn BookingStore> {
        Arc::new(PgBookingStore::new(self.pool.clone()))
    }
}
