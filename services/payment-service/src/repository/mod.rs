// /consult-payments/services/payment-service/src/repository/mod.rs

pub mod booking;
pub mod audit;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Transaction, Postgres};
use std::sync::Arc;
use uuid::Uuid;
use crate::{
    models::{Booking, NewBooking, PaymentTransition},
    utils::error::{AppError, AppResult},
};

/// Kontrak booking store. Semua mutasi status lewat
/// `transition_from_pending` yang bersifat compare-and-swap.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Harga expert saat ini (authoritative)
    async fn expert_price(&self, expert_id: Uuid) -> AppResult<Option<BigDecimal>>;

    async fn insert_booking(&self, booking: NewBooking) -> AppResult<Booking>;

    async fn find_booking(&self, booking_id: Uuid) -> AppResult<Option<Booking>>;

    async fn find_by_transaction_id(&self, transaction_id: &str) -> AppResult<Option<Booking>>;

    /// Booking pending terbaru, dibatasi `limit`
    async fn recent_pending(&self, limit: i64) -> AppResult<Vec<Booking>>;

    /// Booking pending yang dibuat sebelum `created_before`
    async fn stale_pending(&self, created_before: DateTime<Utc>, limit: i64) -> AppResult<Vec<Booking>>;

    /// Terapkan transition hanya jika payment_status masih pending.
    /// `None` berarti booking tidak ada atau sudah resolved.
    async fn transition_from_pending(
        &self,
        booking_id: Uuid,
        transition: &PaymentTransition,
    ) -> AppResult<Option<Booking>>;
}

/// Main repository struct (PostgreSQL) yang menggabungkan semua repositories
pub struct Repository {
    pub pool: PgPool,
    booking_repo: Arc<booking::BookingRepository>,
    audit_repo: Arc<audit::AuditRepository>,
}

impl Repository {
    /// Create new repository instance
    pub fn new(pool: PgPool) -> Self {
        let booking_repo = Arc::new(booking::BookingRepository::new(pool.clone()));
        let audit_repo = Arc::new(audit::AuditRepository::new());

        Self {
            pool,
            booking_repo,
            audit_repo,
        }
    }

    /// Get booking repository
    pub fn booking(&self) -> &booking::BookingRepository {
        &self.booking_repo
    }

    /// Get audit repository
    pub fn audit(&self) -> &audit::AuditRepository {
        &self.audit_repo
    }

    /// Begin database transaction
    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Expose pool untuk health check
    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BookingStore for Repository {
    async fn expert_price(&self, expert_id: Uuid) -> AppResult<Option<BigDecimal>> {
        self.booking().expert_price(expert_id).await
    }

    async fn insert_booking(&self, booking: NewBooking) -> AppResult<Booking> {
        let mut tx = self.begin_transaction().await?;

        let created = self.booking().insert(&mut tx, &booking).await?;
        self.audit().log_booking_created(&mut tx, &created).await?;

        tx.commit().await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    async fn find_booking(&self, booking_id: Uuid) -> AppResult<Option<Booking>> {
        self.booking().find_by_id(booking_id).await
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> AppResult<Option<Booking>> {
        self.booking().find_by_transaction_id(transaction_id).await
    }

    async fn recent_pending(&self, limit: i64) -> AppResult<Vec<Booking>> {
        self.booking().recent_pending(limit).await
    }

    async fn stale_pending(&self, created_before: DateTime<Utc>, limit: i64) -> AppResult<Vec<Booking>> {
        self.booking().stale_pending(created_before, limit).await
    }

    async fn transition_from_pending(
        &self,
        booking_id: Uuid,
        transition: &PaymentTransition,
    ) -> AppResult<Option<Booking>> {
        let mut tx = self.begin_transaction().await?;

        let updated = self.booking()
            .transition_from_pending(&mut tx, booking_id, transition)
            .await?;

        if let Some(ref booking) = updated {
            self.audit().log_transition(&mut tx, booking, transition).await?;
        }

        tx.commit().await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }
}
