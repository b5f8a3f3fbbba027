// /consult-payments/services/payment-service/src/core/resolver.rs

use std::sync::Arc;
use chrono::{Duration, Utc};
use uuid::Uuid;
use crate::{
    models::*,
    repository::BookingStore,
    utils::error::{AppError, AppResult},
};
use super::order_id::OrderId;

/// Hasil resolve halaman failure
#[derive(Debug)]
pub enum Resolution {
    /// Booking pending ditutup sebagai failed/cancelled
    Cancelled(Booking),
    /// Booking sudah resolved, dikembalikan apa adanya
    AlreadyResolved(Booking),
    /// Tidak ada booking yang cocok
    NotFound,
}

/// Menutup booking yang tertinggal pending ketika user mendarat di halaman
/// failure hanya dengan order id.
pub struct FailureResolver {
    store: Arc<dyn BookingStore>,
    lookback: i64,
}

impl FailureResolver {
    pub fn new(store: Arc<dyn BookingStore>, lookback: i64) -> Self {
        Self {
            store,
            lookback: lookback.max(1),
        }
    }

    pub async fn resolve(&self, order_id: &str, requesting_user: Uuid) -> AppResult<Resolution> {
        let candidate = match self.locate(order_id, requesting_user).await? {
            Some(booking) => Some(booking),
            None => self.scan_recent_pending(order_id, requesting_user).await?,
        };

        let Some(booking) = candidate else {
            tracing::info!(order_id = %order_id, "No booking matches failure page order id");
            return Ok(Resolution::NotFound);
        };

        if !booking.is_pending() {
            return Ok(Resolution::AlreadyResolved(booking));
        }

        let transition = PaymentTransition::failed(
            None,
            format!("Closed from failure page for order {}", order_id),
        );

        match self.store.transition_from_pending(booking.id, &transition).await? {
            Some(cancelled) => {
                tracing::info!(
                    order_id = %order_id,
                    booking_id = %cancelled.id,
                    "Pending booking closed after failed payment"
                );
                Ok(Resolution::Cancelled(cancelled))
            }
            None => {
                let current = self.store
                    .find_booking(booking.id)
                    .await?
                    .ok_or_else(|| AppError::BookingNotFound(booking.id.to_string()))?;
                Ok(Resolution::AlreadyResolved(current))
            }
        }
    }

    /// Lookup exact: transaction id lalu booking id dari order id.
    /// Booking milik user lain tidak pernah dikembalikan.
    pub async fn locate(&self, order_id: &str, requesting_user: Uuid) -> AppResult<Option<Booking>> {
        if let Some(booking) = self.store.find_by_transaction_id(order_id).await? {
            if booking.user_id == requesting_user {
                return Ok(Some(booking));
            }
            tracing::warn!(order_id = %order_id, user_id = %requesting_user, "Transaction belongs to another user");
        }

        if let Ok(order) = OrderId::parse(order_id) {
            if let Some(booking) = self.store.find_booking(order.booking_id).await? {
                if booking.user_id == requesting_user && booking.user_id == order.user_id {
                    return Ok(Some(booking));
                }
                tracing::warn!(order_id = %order_id, user_id = %requesting_user, "Order belongs to another user");
            }
        }

        Ok(None)
    }

    /// Heuristik fallback dengan lookback terbatas, diambil yang terbaru
    async fn scan_recent_pending(&self, order_id: &str, requesting_user: Uuid) -> AppResult<Option<Booking>> {
        let user_key = requesting_user.to_string();
        if !order_id.contains(&user_key) {
            return Ok(None);
        }

        let recent = self.store.recent_pending(self.lookback).await?;
        Ok(recent
            .into_iter()
            .filter(|b| b.user_id == requesting_user)
            .max_by_key(|b| b.created_at))
    }

    /// Tutup session yang pending lebih lama dari `ttl`. Return jumlah booking yang ditutup.
    pub async fn expire_stale(&self, ttl: Duration, batch_size: i64) -> AppResult<usize> {
        let cutoff = Utc::now() - ttl;
        let stale = self.store.stale_pending(cutoff, batch_size).await?;
        let mut closed = 0;

        for booking in stale {
            let transition = PaymentTransition::failed(
                None,
                format!(
                    "Payment session expired after {} minutes without callback",
                    ttl.num_minutes()
                ),
            );

            if self.store.transition_from_pending(booking.id, &transition).await?.is_some() {
                closed += 1;
            }
        }

        if closed > 0 {
            tracing::info!("Closed {} stale pending bookings", closed);
        }
        Ok(closed)
    }
}
