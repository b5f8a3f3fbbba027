// /consult-payments/services/payment-service/src/core/poller.rs

use std::sync::Arc;
use crate::{
    models::*,
    repository::BookingStore,
    utils::error::{AppError, AppResult},
};
use super::{
    gateway::PaymentGateway,
    order_id::OrderId,
    verifier::{canonical_amount, AmountVerifier},
};

/// Status yang dilaporkan ke caller ketika three-way check gagal
pub const POLL_FAILED_STATUS: &str = "FAILED";

/// Read-mostly status query. Tidak pernah menandai booking completed,
/// satu-satunya write adalah jalur rejection.
pub struct StatusPoller {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: AmountVerifier,
}

impl StatusPoller {
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: AmountVerifier,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
        }
    }

    pub async fn poll_status(&self, order_id: &str) -> AppResult<PollResult> {
        let order = OrderId::parse(order_id)?;
        self.poll_parsed(order_id, &order).await
    }

    async fn poll_parsed(&self, order_id: &str, order: &OrderId) -> AppResult<PollResult> {
        let booking = self.store
            .find_booking(order.booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(format!("No booking for order {}", order_id)))?;

        if booking.user_id != order.user_id {
            return Err(AppError::BookingNotFound(format!("No booking for order {}", order_id)));
        }

        let expert_price = self.store
            .expert_price(booking.expert_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Expert {} tidak ditemukan", booking.expert_id)))?;

        let gateway_status = self.gateway.order_status(order_id).await?;
        let gateway_amount = &gateway_status.amount;

        let consistent = self.verifier.amounts_match(gateway_amount, &booking.amount)
            && self.verifier.amounts_match(gateway_amount, &expert_price)
            && self.verifier.amounts_match(&booking.amount, &expert_price);

        if !consistent {
            let note = format!(
                "Status poll rejected order {}: gateway {}, booking {}, expert price {}",
                order_id,
                canonical_amount(gateway_amount),
                canonical_amount(&booking.amount),
                canonical_amount(&expert_price)
            );
            tracing::warn!(booking_id = %booking.id, "{}", note);

            let transition = PaymentTransition::rejected(note);
            if self.store.transition_from_pending(booking.id, &transition).await?.is_none() {
                tracing::info!(
                    booking_id = %booking.id,
                    payment_status = %booking.payment_status,
                    "Inconsistent amounts on resolved booking, status left as is"
                );
            }

            return Ok(PollResult {
                order_id: order_id.to_string(),
                status: POLL_FAILED_STATUS.to_string(),
                verified_amount: None,
            });
        }

        tracing::debug!(
            order_id = %order_id,
            gateway_status = %gateway_status.status,
            "Status poll verified"
        );

        Ok(PollResult {
            order_id: order_id.to_string(),
            status: gateway_status.status,
            verified_amount: Some(gateway_status.amount),
        })
    }
}
