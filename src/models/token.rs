use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Авторитетное содержимое check-in токена.
///
/// `seat_numbers` и `total_amount` носят справочный характер и при сканировании
/// не сверяются с текущим состоянием брони.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub booking_id: String,
    pub event_id: String,
    pub buyer_id: String,
    pub seat_numbers: Vec<String>,
    pub booking_date: DateTime<Utc>,
    pub total_amount: f64,
}

/// Выданный токен: payload + подписанная компактная форма для QR-кода.
/// `rendered` всегда можно перегенерировать из `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub payload: TokenPayload,
    pub rendered: String,
}
