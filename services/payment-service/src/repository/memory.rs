// /consult-payments/services/payment-service/src/repository/memory.rs

//! In-memory `BookingStore` untuk unit test pipeline.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::BookingStore;
use crate::{
    models::*,
    utils::error::AppResult,
};

#[derive(Default)]
pub struct InMemoryBookingStore {
    experts: RwLock<HashMap<Uuid, BigDecimal>>,
    bookings: RwLock<HashMap<Uuid, Booking>>,
    writes: AtomicUsize,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_expert_price(&self, expert_id: Uuid, price: BigDecimal) {
        self.experts.write().await.insert(expert_id, price);
    }

    /// Seed booking pending langsung (tidak dihitung sebagai write)
    pub async fn seed_pending(
        &self,
        id: Uuid,
        user_id: Uuid,
        expert_id: Uuid,
        amount: BigDecimal,
        amount_hash: String,
    ) -> Booking {
        let booking = pending_booking(NewBooking {
            id,
            user_id,
            expert_id,
            booking_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap_or_default(),
            booking_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
            amount,
            amount_hash,
        });
        self.bookings.write().await.insert(id, booking.clone());
        booking
    }

    pub async fn backdate(&self, id: Uuid, created_at: DateTime<Utc>) {
        if let Some(booking) = self.bookings.write().await.get_mut(&id) {
            booking.created_at = created_at;
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Booking> {
        self.bookings.read().await.get(&id).cloned()
    }

    /// Jumlah mutasi yang benar-benar diterapkan
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

fn pending_booking(new: NewBooking) -> Booking {
    let now = Utc::now();
    Booking {
        id: new.id,
        user_id: new.user_id,
        expert_id: new.expert_id,
        booking_date: new.booking_date,
        booking_time: new.booking_time,
        amount: new.amount,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        transaction_id: None,
        payment_mode: None,
        payment_time: None,
        amount_hash: new.amount_hash,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn expert_price(&self, expert_id: Uuid) -> AppResult<Option<BigDecimal>> {
        Ok(self.experts.read().await.get(&expert_id).cloned())
    }

    async fn insert_booking(&self, booking: NewBooking) -> AppResult<Booking> {
        let created = pending_booking(booking);
        self.bookings.write().await.insert(created.id, created.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn find_booking(&self, booking_id: Uuid) -> AppResult<Option<Booking>> {
        Ok(self.get(booking_id).await)
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> AppResult<Option<Booking>> {
        Ok(self.bookings.read().await
            .values()
            .filter(|b| b.transaction_id.as_deref() == Some(transaction_id))
            .max_by_key(|b| b.created_at)
            .cloned())
    }

    async fn recent_pending(&self, limit: i64) -> AppResult<Vec<Booking>> {
        let mut pending: Vec<Booking> = self.bookings.read().await
            .values()
            .filter(|b| b.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn stale_pending(&self, created_before: DateTime<Utc>, limit: i64) -> AppResult<Vec<Booking>> {
        let mut stale: Vec<Booking> = self.bookings.read().await
            .values()
            .filter(|b| b.is_pending() && b.created_at < created_before)
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        stale.truncate(limit.max(0) as usize);
        Ok(stale)
    }

    async fn transition_from_pending(
        &self,
        booking_id: Uuid,
        transition: &PaymentTransition,
    ) -> AppResult<Option<Booking>> {
        // Lock tulis dipegang selama cek + update, setara dengan UPDATE ... WHERE
        let mut bookings = self.bookings.write().await;
        let Some(booking) = bookings.get_mut(&booking_id) else {
            return Ok(None);
        };
        if !booking.is_pending() {
            return Ok(None);
        }

        booking.payment_status = transition.payment_status;
        booking.status = transition.status;
        if booking.transaction_id.is_none() {
            booking.transaction_id = transition.transaction_id.clone();
        }
        if transition.payment_mode.is_some() {
            booking.payment_mode = transition.payment_mode.clone();
        }
        if transition.payment_time.is_some() {
            booking.payment_time = transition.payment_time;
        }
        if let Some(ref note) = transition.note {
            booking.notes = Some(match booking.notes.take() {
                Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
                _ => note.clone(),
            });
        }
        booking.updated_at = Utc::now();

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(booking.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transaction_id_is_never_overwritten() {
        let store = InMemoryBookingStore::new();
        let booking = store
            .seed_pending(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), BigDecimal::from(1500), "h".into())
            .await;

        let first = PaymentTransition::completed("txn_A".to_string(), Some("UPI".to_string()));
        let completed = store.transition_from_pending(booking.id, &first).await.unwrap();
        assert_eq!(completed.unwrap().transaction_id.as_deref(), Some("txn_A"));

        let second = PaymentTransition::completed("txn_B".to_string(), None);
        assert!(store.transition_from_pending(booking.id, &second).await.unwrap().is_none());

        let stored = store.get(booking.id).await.unwrap();
        assert_eq!(stored.transaction_id.as_deref(), Some("txn_A"));
        assert_eq!(store.write_count(), 1);
    }
}
