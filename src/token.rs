//! Выдача и проверка check-in токенов.
//!
//! Payload подписывается HS256 (`jsonwebtoken`), компактная строка - это то,
//! что кодируется в QR. Подделанный или изменённый токен не пройдёт подпись.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::warn;

use crate::config::TokenConfig;
use crate::error::{BookingError, BookingResult};
use crate::models::{Booking, BookingStatus, Token, TokenPayload};
use crate::store::BookingStore;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    #[serde(flatten)]
    payload: TokenPayload,
}

/// Результат успешной проверки: токен и бронь, на которую он ссылается.
#[derive(Debug, Clone)]
pub struct ValidToken {
    pub payload: TokenPayload,
    pub booking: Booking,
}

#[derive(Clone)]
pub struct TokenIssuer {
    issuer: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
        }
    }

    pub fn payload_for(booking: &Booking) -> TokenPayload {
        TokenPayload {
            booking_id: booking.booking_id.clone(),
            event_id: booking.event_id.clone(),
            buyer_id: booking.buyer_id.clone(),
            seat_numbers: booking.seat_numbers(),
            booking_date: booking.created_at,
            total_amount: booking.total_amount,
        }
    }

    /// Идемпотентно: если токен уже есть, он возвращается без изменений.
    pub fn issue(&self, booking: &Booking) -> BookingResult<Token> {
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::invalid_request(format!(
                "token can only be issued for a confirmed booking, {} is {}",
                booking.booking_id, booking.status
            )));
        }
        if let Some(existing) = &booking.token {
            return Ok(existing.clone());
        }

        let payload = Self::payload_for(booking);
        let rendered = self.render(&payload)?;
        Ok(Token { payload, rendered })
    }

    /// Подписанная компактная форма payload.
    pub fn render(&self, payload: &TokenPayload) -> BookingResult<String> {
        let claims = Claims {
            iss: self.issuer.clone(),
            payload: payload.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| BookingError::Internal(format!("token signing failed: {e}")))
    }

    /// Разбор и проверка подписи. Не обращается к хранилищу.
    pub fn decode(&self, presented: &str) -> BookingResult<TokenPayload> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::from(["iss".to_string()]);
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(presented.trim(), &self.decoding, &validation)
            .map(|data| data.claims.payload)
            .map_err(|e| {
                warn!(token = %fingerprint(presented), "token rejected: {}", e);
                BookingError::InvalidToken
            })
    }

    /// Токен валиден, если подпись верна, бронь существует и событие совпадает
    /// (и с payload, и с `expected_event_id` сканера, если он задан).
    /// Состояние брони не меняется.
    pub async fn validate(
        &self,
        presented: &str,
        expected_event_id: Option<&str>,
        store: &dyn BookingStore,
    ) -> BookingResult<ValidToken> {
        let payload = self.decode(presented)?;
        let reject = |reason: &str| {
            warn!(
                token = %fingerprint(presented),
                event_id = %payload.event_id,
                "token rejected: {}", reason
            );
            BookingError::InvalidToken
        };

        if let Some(expected) = expected_event_id {
            if payload.event_id != expected {
                return Err(reject("scanned at another event"));
            }
        }

        let booking = match store.get(&payload.booking_id).await? {
            Some(booking) => booking,
            None => return Err(reject("unknown booking")),
        };
        if booking.event_id != payload.event_id {
            return Err(reject("event mismatch"));
        }

        Ok(ValidToken { payload, booking })
    }
}

/// Короткий отпечаток токена для логов (сам токен не логируется).
pub fn fingerprint(presented: &str) -> String {
    let digest = Sha256::digest(presented.trim().as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendeeInfo, SeatLine};
    use chrono::Utc;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(&TokenConfig {
            secret: secret.to_string(),
            issuer: "booking-engine".to_string(),
        })
    }

    fn confirmed() -> Booking {
        let mut b = Booking::new_pending(
            "BK-1".into(),
            "U1".into(),
            "E".into(),
            "USD".into(),
            vec![SeatLine { seat_number: "A1".into(), price: 25.5 }],
            AttendeeInfo { name: "Ann".into(), email: "ann@example.com".into(), phone: None },
            Utc::now(),
        );
        b.status = BookingStatus::Confirmed;
        b
    }

    #[test]
    fn issue_requires_confirmed_booking() {
        let mut b = confirmed();
        b.status = BookingStatus::Pending;
        assert!(matches!(issuer("s").issue(&b), Err(BookingError::InvalidRequest(_))));
    }

    #[test]
    fn issue_is_idempotent() {
        let tokens = issuer("s");
        let mut b = confirmed();
        let first = tokens.issue(&b).unwrap();
        b.token = Some(first.clone());
        assert_eq!(tokens.issue(&b).unwrap(), first);
    }

    #[test]
    fn payload_survives_signing() {
        let tokens = issuer("s");
        let token = tokens.issue(&confirmed()).unwrap();
        let decoded = tokens.decode(&token.rendered).unwrap();
        assert_eq!(decoded, token.payload);
        assert_eq!(decoded.seat_numbers, vec!["A1".to_string()]);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = issuer("one").issue(&confirmed()).unwrap();
        assert!(matches!(issuer("two").decode(&token.rendered), Err(BookingError::InvalidToken)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(issuer("s").decode("not a token"), Err(BookingError::InvalidToken)));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        assert_eq!(fingerprint("abc"), fingerprint(" abc "));
        assert_eq!(fingerprint("abc").len(), 16);
    }
}
