use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub booking: BookingConfig,
    pub token: TokenConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки Redis (канал уведомлений). Без URL используется NoopNotifier
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub channel_prefix: String,
}

// Параметры жизненного цикла брони
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// Сколько pending-бронь держит места до автоматического истечения.
    pub hold_window_seconds: u64,
    /// Период фоновой очистки просроченных броней.
    pub sweep_interval_seconds: u64,
    pub id_prefix: String,
    pub max_seats_per_booking: usize,
}

impl BookingConfig {
    pub fn hold_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_window_seconds as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Сколько ждать, прежде чем дозавершать эффекты чужого перехода:
    /// за это время обычный запрос успевает сделать это сам.
    pub fn settle_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.sweep_interval_seconds as i64)
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            hold_window_seconds: 900,
            sweep_interval_seconds: 60,
            id_prefix: "BK".to_string(),
            max_seats_per_booking: 10,
        }
    }
}

// Ключ подписи check-in токенов
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T>(name: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_or(name, default)
        .parse()
        .with_context(|| format!("{name} must be a valid number"))
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{name} must be set"))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parsed_or("PORT", "8000")?,
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "booking_engine=debug,tower_http=debug"),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                pool_size: parsed_or("DB_POOL_SIZE", "20")?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
                channel_prefix: var_or("REDIS_CHANNEL_PREFIX", "booking-events"),
            },
            booking: BookingConfig {
                hold_window_seconds: parsed_or("BOOKING_HOLD_WINDOW_SECONDS", "900")?,
                sweep_interval_seconds: parsed_or("BOOKING_SWEEP_INTERVAL_SECONDS", "60")?,
                id_prefix: var_or("BOOKING_ID_PREFIX", "BK"),
                max_seats_per_booking: parsed_or("BOOKING_MAX_SEATS", "10")?,
            },
            token: TokenConfig {
                secret: required("TOKEN_SECRET")?,
                issuer: var_or("TOKEN_ISSUER", "booking-engine"),
            },
        })
    }
}
