use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;

use crate::error::{BookingError, BookingResult};
use crate::inventory::SeatInventory;
use crate::models::event::check_seat_request;
use crate::models::{
    ClaimedSeats, EventSeating, InventoryCounters, ReleasedSeats, SeatLine, SeatMap, SeatRecord,
    SeatStatus,
};

/// Инвентарь в Postgres. Все операции над событием начинаются с
/// `SELECT ... FOR UPDATE` по строке события, счётчики пересчитываются
/// из таблицы seats в той же транзакции.
#[derive(Clone)]
pub struct PgSeatInventory {
    pool: PgPool,
}

impl PgSeatInventory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Блокировка события. Возвращает валюту
async fn lock_event(tx: &mut Transaction<'_, Postgres>, event_id: &str) -> BookingResult<String> {
    sqlx::query_scalar::<_, String>("SELECT currency FROM events WHERE id = $1 FOR UPDATE")
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| BookingError::EventNotFound(event_id.to_string()))
}

// Пересчёт счётчиков из авторитетных статусов мест
async fn recount(tx: &mut Transaction<'_, Postgres>, event_id: &str) -> BookingResult<InventoryCounters> {
    let (total, available, reserved, booked): (i32, i32, i32, i32) = sqlx::query_as(
        r#"
        UPDATE events e
        SET total_seats = c.total,
            available_seats = c.available,
            reserved_seats = c.reserved,
            booked_seats = c.booked,
            updated_at = NOW()
        FROM (
            SELECT COUNT(*)::INT AS total,
                   COUNT(*) FILTER (WHERE status = 'available')::INT AS available,
                   COUNT(*) FILTER (WHERE status = 'reserved')::INT AS reserved,
                   COUNT(*) FILTER (WHERE status = 'booked')::INT AS booked
            FROM seats
            WHERE event_id = $1
        ) c
        WHERE e.id = $1
        RETURNING e.total_seats, e.available_seats, e.reserved_seats, e.booked_seats
        "#,
    )
    .bind(event_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(InventoryCounters {
        total_seats: total as u32,
        available_seats: available as u32,
        reserved_seats: reserved as u32,
        booked_seats: booked as u32,
    })
}

#[async_trait]
impl SeatInventory for PgSeatInventory {
    async fn publish_event(&self, seating: EventSeating) -> BookingResult<InventoryCounters> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query(
            "INSERT INTO events (id, currency) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
        )
        .bind(seating.event_id())
        .bind(seating.currency())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if created == 0 {
            tx.rollback().await?;
            return Err(BookingError::invalid_request(format!(
                "event {} is already published",
                seating.event_id()
            )));
        }

        let seats = seating.seats();
        let numbers: Vec<String> = seats.iter().map(|s| s.seat_number.clone()).collect();
        let rows: Vec<String> = seats.iter().map(|s| s.row.clone()).collect();
        let sections: Vec<String> = seats.iter().map(|s| s.section.clone()).collect();
        let prices: Vec<f64> = seats.iter().map(|s| s.price).collect();
        let positions: Vec<i32> = (0..seats.len() as i32).collect();

        sqlx::query(
            r#"
            INSERT INTO seats (event_id, seat_number, row_label, section, price, position)
            SELECT $1, * FROM UNNEST($2::TEXT[], $3::TEXT[], $4::TEXT[], $5::FLOAT8[], $6::INT4[])
            "#,
        )
        .bind(seating.event_id())
        .bind(&numbers)
        .bind(&rows)
        .bind(&sections)
        .bind(&prices)
        .bind(&positions)
        .execute(&mut *tx)
        .await?;

        let counters = recount(&mut tx, seating.event_id()).await?;
        tx.commit().await?;
        Ok(counters)
    }

    async fn claim_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        claimant_id: &str,
    ) -> BookingResult<ClaimedSeats> {
        check_seat_request(seat_numbers)?;

        let mut tx = self.pool.begin().await?;
        let currency = lock_event(&mut tx, event_id).await?;

        let found: Vec<(String, String, f64)> = sqlx::query_as(
            "SELECT seat_number, status, price FROM seats WHERE event_id = $1 AND seat_number = ANY($2)",
        )
        .bind(event_id)
        .bind(seat_numbers)
        .fetch_all(&mut *tx)
        .await?;

        // Занятые и несуществующие места - всё это недоступно
        let taken: Vec<String> = seat_numbers
            .iter()
            .filter(|n| {
                !found
                    .iter()
                    .any(|(number, status, _)| number == *n && status == SeatStatus::Available.as_str())
            })
            .cloned()
            .collect();
        if !taken.is_empty() {
            tx.rollback().await?;
            return Err(BookingError::SeatUnavailable {
                event_id: event_id.to_string(),
                seats: taken,
            });
        }

        let updated = sqlx::query(
            r#"
            UPDATE seats
            SET status = 'reserved', holder = $3, updated_at = NOW()
            WHERE event_id = $1 AND seat_number = ANY($2) AND status = 'available'
            "#,
        )
        .bind(event_id)
        .bind(seat_numbers)
        .bind(claimant_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated != seat_numbers.len() as u64 {
            warn!("claim on event {} updated {} of {} seats, rolling back", event_id, updated, seat_numbers.len());
            tx.rollback().await?;
            return Err(BookingError::SeatUnavailable {
                event_id: event_id.to_string(),
                seats: seat_numbers.to_vec(),
            });
        }

        let counters = recount(&mut tx, event_id).await?;
        tx.commit().await?;

        // Порядок мест - как в запросе
        let seats = seat_numbers
            .iter()
            .filter_map(|n| {
                found
                    .iter()
                    .find(|(number, _, _)| number == n)
                    .map(|(number, _, price)| SeatLine { seat_number: number.clone(), price: *price })
            })
            .collect();

        Ok(ClaimedSeats {
            event_id: event_id.to_string(),
            currency,
            seats,
            counters,
        })
    }

    async fn commit_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        holder_id: &str,
    ) -> BookingResult<(Vec<String>, InventoryCounters)> {
        let mut tx = self.pool.begin().await?;
        lock_event(&mut tx, event_id).await?;

        let committed: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE seats
            SET status = 'booked', updated_at = NOW()
            WHERE event_id = $1 AND seat_number = ANY($2) AND status = 'reserved' AND holder = $3
            RETURNING seat_number
            "#,
        )
        .bind(event_id)
        .bind(seat_numbers)
        .bind(holder_id)
        .fetch_all(&mut *tx)
        .await?;

        let counters = recount(&mut tx, event_id).await?;
        tx.commit().await?;
        Ok((committed, counters))
    }

    async fn release_seats(
        &self,
        event_id: &str,
        seat_numbers: &[String],
        holder_id: Option<&str>,
    ) -> BookingResult<ReleasedSeats> {
        let mut tx = self.pool.begin().await?;
        lock_event(&mut tx, event_id).await?;

        let released: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE seats
            SET status = 'available', holder = NULL, updated_at = NOW()
            WHERE event_id = $1 AND seat_number = ANY($2) AND status <> 'available'
              AND ($3::TEXT IS NULL OR holder = $3)
            RETURNING seat_number
            "#,
        )
        .bind(event_id)
        .bind(seat_numbers)
        .bind(holder_id)
        .fetch_all(&mut *tx)
        .await?;

        let counters = recount(&mut tx, event_id).await?;
        tx.commit().await?;
        Ok(ReleasedSeats {
            event_id: event_id.to_string(),
            released,
            counters,
        })
    }

    async fn seat_map(&self, event_id: &str) -> BookingResult<SeatMap> {
        let currency: String = sqlx::query_scalar("SELECT currency FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| BookingError::EventNotFound(event_id.to_string()))?;

        let rows: Vec<(String, String, String, f64, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT seat_number, row_label, section, price, status, holder
            FROM seats
            WHERE event_id = $1
            ORDER BY position
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let mut seats = Vec::with_capacity(rows.len());
        for (seat_number, row, section, price, status, holder) in rows {
            seats.push(SeatRecord {
                seat_number,
                row,
                section,
                price,
                status: status.parse().map_err(BookingError::Internal)?,
                holder,
            });
        }

        Ok(EventSeating::from_records(event_id, currency, seats).snapshot())
    }
}
