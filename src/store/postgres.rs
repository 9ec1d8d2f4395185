use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::error::{BookingError, BookingResult};
use crate::models::{
    AttendeeInfo, Booking, BookingStatus, CheckInInfo, PaymentInfo, RefundDetails, SeatLine,
    SideEffect, Token,
};
use crate::store::{BookingStore, BookingUpdate};

const BOOKING_COLUMNS: &str = "id, buyer_id, event_id, status, seats, total_amount, currency, \
     payment_info, check_in_info, refund_details, token, attendee_info, created_at, updated_at, \
     pending_effects, version";

// Строка таблицы bookings. JSONB-колонки типизированы через sqlx::types::Json
#[derive(Debug, FromRow)]
struct BookingRow {
    id: String,
    buyer_id: String,
    event_id: String,
    status: String,
    seats: Json<Vec<SeatLine>>,
    total_amount: f64,
    currency: String,
    payment_info: Json<PaymentInfo>,
    check_in_info: Json<CheckInInfo>,
    refund_details: Option<Json<RefundDetails>>,
    token: Option<Json<Token>>,
    attendee_info: Json<AttendeeInfo>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    pending_effects: Json<Vec<SideEffect>>,
    version: i64,
}

impl TryFrom<BookingRow> for Booking {
    type Error = BookingError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status: BookingStatus = row.status.parse().map_err(BookingError::Internal)?;
        Ok(Booking {
            booking_id: row.id,
            buyer_id: row.buyer_id,
            event_id: row.event_id,
            seats: row.seats.0,
            total_amount: row.total_amount,
            currency: row.currency,
            status,
            payment_info: row.payment_info.0,
            check_in_info: row.check_in_info.0,
            refund_details: row.refund_details.map(|j| j.0),
            token: row.token.map(|j| j.0),
            attendee_info: row.attendee_info.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
            pending_effects: row.pending_effects.0,
            version: row.version,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> BookingResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert(&self, booking: &Booking) -> BookingResult<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO bookings (id, buyer_id, event_id, status, seats, total_amount, currency,
                                  payment_info, check_in_info, refund_details, token, attendee_info,
                                  created_at, updated_at, pending_effects, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&booking.booking_id)
        .bind(&booking.buyer_id)
        .bind(&booking.event_id)
        .bind(booking.status.as_str())
        .bind(Json(&booking.seats))
        .bind(booking.total_amount)
        .bind(&booking.currency)
        .bind(Json(&booking.payment_info))
        .bind(Json(&booking.check_in_info))
        .bind(booking.refund_details.as_ref().map(Json))
        .bind(booking.token.as_ref().map(Json))
        .bind(Json(&booking.attendee_info))
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .bind(Json(&booking.pending_effects))
        .bind(booking.version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(BookingError::DuplicateBookingId(booking.booking_id.clone()));
        }
        Ok(())
    }

    async fn get(&self, booking_id: &str) -> BookingResult<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn exists(&self, booking_id: &str) -> BookingResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM bookings WHERE id = $1)")
            .bind(booking_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn update(&self, booking_id: &str, apply: BookingUpdate<'_>) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;

        // Блокируем строку брони до конца транзакции - переходы сериализуются
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut booking = match row {
            Some(row) => Booking::try_from(row)?,
            None => {
                tx.rollback().await?;
                return Err(BookingError::BookingNotFound(booking_id.to_string()));
            }
        };

        if let Err(e) = apply(&mut booking) {
            tx.rollback().await?;
            return Err(e);
        }

        let version: i64 = sqlx::query_scalar(
            r#"
            UPDATE bookings
            SET status = $2, payment_info = $3, check_in_info = $4, refund_details = $5,
                token = $6, updated_at = $7, pending_effects = $8, version = version + 1
            WHERE id = $1 AND version = $9
            RETURNING version
            "#,
        )
        .bind(booking_id)
        .bind(booking.status.as_str())
        .bind(Json(&booking.payment_info))
        .bind(Json(&booking.check_in_info))
        .bind(booking.refund_details.as_ref().map(Json))
        .bind(booking.token.as_ref().map(Json))
        .bind(booking.updated_at)
        .bind(Json(&booking.pending_effects))
        .bind(booking.version)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        booking.version = version;
        Ok(booking)
    }

    async fn list_by_buyer(&self, buyer_id: &str) -> BookingResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE buyer_id = $1 ORDER BY created_at"
        ))
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }

    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> BookingResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE status = 'pending' AND created_at < $1 ORDER BY created_at"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }

    async fn list_unsettled(&self, cutoff: DateTime<Utc>) -> BookingResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE pending_effects <> '[]'::jsonb AND updated_at < $1 ORDER BY updated_at"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        into_bookings(rows)
    }
}
