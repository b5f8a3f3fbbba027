// /consult-payments/services/payment-service/src/repository/booking.rs

use sqlx::{postgres::PgRow, PgPool, Transaction, Postgres, Row};
use uuid::Uuid;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use crate::{
    models::*,
    utils::error::{AppError, AppResult},
};

const BOOKING_COLUMNS: &str = r#"
    id, user_id, expert_id, booking_date, booking_time, amount,
    status, payment_status, transaction_id, payment_mode, payment_time,
    amount_hash, notes, created_at, updated_at
"#;

/// Repository untuk booking operations
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    /// Create new booking repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ambil harga expert terkini
    pub async fn expert_price(&self, expert_id: Uuid) -> AppResult<Option<BigDecimal>> {
        let row = sqlx::query("SELECT price FROM experts WHERE id = $1")
            .bind(expert_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(|r| r.try_get::<BigDecimal, _>("price"))
            .transpose()
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert booking baru, selalu pending/pending
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking: &NewBooking,
    ) -> AppResult<Booking> {
        let query = format!(
            r#"
            INSERT INTO bookings (
                id, user_id, expert_id, booking_date, booking_time, amount,
                status, payment_status, amount_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', 'pending', $7)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(booking.id)
            .bind(booking.user_id)
            .bind(booking.expert_id)
            .bind(booking.booking_date)
            .bind(booking.booking_time)
            .bind(&booking.amount)
            .bind(&booking.amount_hash)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        map_row_to_booking(&row)
    }

    pub async fn find_by_id(&self, booking_id: Uuid) -> AppResult<Option<Booking>> {
        let query = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);

        let row = sqlx::query(&query)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.as_ref().map(map_row_to_booking).transpose()
    }

    pub async fn find_by_transaction_id(&self, transaction_id: &str) -> AppResult<Option<Booking>> {
        let query = format!(
            "SELECT {} FROM bookings WHERE transaction_id = $1 ORDER BY created_at DESC LIMIT 1",
            BOOKING_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.as_ref().map(map_row_to_booking).transpose()
    }

    /// Booking pending terbaru (bounded lookback, tidak pernah full scan)
    pub async fn recent_pending(&self, limit: i64) -> AppResult<Vec<Booking>> {
        let query = format!(
            r#"
            SELECT {} FROM bookings
            WHERE payment_status = 'pending'
            ORDER BY created_at DESC
            LIMIT $1
            "#,
            BOOKING_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.iter().map(map_row_to_booking).collect()
    }

    pub async fn stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Booking>> {
        let query = format!(
            r#"
            SELECT {} FROM bookings
            WHERE payment_status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
            BOOKING_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(created_before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.iter().map(map_row_to_booking).collect()
    }

    /// Compare-and-swap pada payment_status. transaction_id hanya diisi
    /// jika masih kosong, notes selalu di-append.
    pub async fn transition_from_pending(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
        transition: &PaymentTransition,
    ) -> AppResult<Option<Booking>> {
        let query = format!(
            r#"
            UPDATE bookings
            SET payment_status = $2,
                status = $3,
                transaction_id = COALESCE(transaction_id, $4),
                payment_mode = COALESCE($5, payment_mode),
                payment_time = COALESCE($6, payment_time),
                notes = CASE
                    WHEN $7::TEXT IS NULL THEN notes
                    WHEN notes IS NULL OR notes = '' THEN $7::TEXT
                    ELSE notes || E'\n' || $7::TEXT
                END,
                updated_at = NOW()
            WHERE id = $1 AND payment_status = 'pending'
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(booking_id)
            .bind(transition.payment_status.as_str())
            .bind(transition.status.as_str())
            .bind(&transition.transaction_id)
            .bind(&transition.payment_mode)
            .bind(transition.payment_time)
            .bind(&transition.note)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.as_ref().map(map_row_to_booking).transpose()
    }
}

fn map_row_to_booking(row: &PgRow) -> AppResult<Booking> {
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;

    Ok(Booking {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        expert_id: row.try_get("expert_id")?,
        booking_date: row.try_get("booking_date")?,
        booking_time: row.try_get("booking_time")?,
        amount: row.try_get("amount")?,
        status: status.parse().map_err(AppError::Database)?,
        payment_status: payment_status.parse().map_err(AppError::Database)?,
        transaction_id: row.try_get("transaction_id")?,
        payment_mode: row.try_get("payment_mode")?,
        payment_time: row.try_get("payment_time")?,
        amount_hash: row.try_get("amount_hash")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
