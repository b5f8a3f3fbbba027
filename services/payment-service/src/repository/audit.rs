// /consult-payments/services/payment-service/src/repository/audit.rs

use sqlx::{Transaction, Postgres};
use crate::{
    models::{Booking, PaymentTransition},
    utils::error::AppResult,
};

/// Repository untuk audit logging, selalu ditulis di transaction yang sama
/// dengan perubahan booking
pub struct AuditRepository;

impl AuditRepository {
    /// Create new audit repository
    pub fn new() -> Self {
        Self
    }

    /// Log booking dibuat oleh initiator
    pub async fn log_booking_created(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, resource_type, resource_id, details)
            VALUES ($1, 'BOOKING_CREATED', 'booking', $2, $3)
            "#
        )
        .bind(booking.user_id)
        .bind(booking.id)
        .bind(serde_json::json!({
            "expert_id": booking.expert_id,
            "amount": booking.amount.to_string(),
        }))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Log transition payment status
    pub async fn log_transition(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
        transition: &PaymentTransition,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, resource_type, resource_id, details)
            VALUES ($1, $2, 'booking', $3, $4)
            "#
        )
        .bind(booking.user_id)
        .bind(transition.audit_action())
        .bind(booking.id)
        .bind(serde_json::json!({
            "payment_status": transition.payment_status.as_str(),
            "status": transition.status.as_str(),
            "transaction_id": booking.transaction_id,
            "note": transition.note,
        }))
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
