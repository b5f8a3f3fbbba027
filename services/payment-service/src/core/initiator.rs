// /consult-payments/services/payment-service/src/core/initiator.rs

use std::sync::Arc;
use std::time::Duration;
use bigdecimal::BigDecimal;
use uuid::Uuid;
use crate::{
    config::GatewayConfig,
    models::*,
    repository::BookingStore,
    utils::error::{AppError, AppResult},
};
use super::{
    gateway::PaymentGateway,
    order_id::OrderId,
    verifier::{canonical_amount, AmountVerifier},
};

/// Membuat payment session. Harga selalu dibaca ulang dari store,
/// booking baru di-insert hanya setelah gateway menerima session.
pub struct PaymentInitiator {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: AmountVerifier,
    config: GatewayConfig,
}

impl PaymentInitiator {
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: AmountVerifier,
        config: GatewayConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
            config,
        }
    }

    pub async fn initiate(&self, user: &AuthUser, input: SessionInput) -> AppResult<PaymentSession> {
        let price = self.store
            .expert_price(input.expert_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Expert tidak ditemukan".to_string()))?;

        if price <= BigDecimal::from(0) {
            tracing::error!(expert_id = %input.expert_id, price = %price, "Expert has non-positive price");
            return Err(AppError::BadRequest("Harga expert tidak valid".to_string()));
        }

        let booking_id = Uuid::new_v4();
        let order_id = OrderId::generate(user.user_id, booking_id).to_string();
        let amount_hash = self.verifier.compute_digest(booking_id, &price, user.user_id);

        let request = self.build_session_request(user, &input, booking_id, &order_id, &price, &amount_hash);
        let session = self.create_session_with_retry(&request).await?;

        let booking = self.store
            .insert_booking(NewBooking {
                id: booking_id,
                user_id: user.user_id,
                expert_id: input.expert_id,
                booking_date: input.booking_date,
                booking_time: input.booking_time,
                amount: price.clone(),
                amount_hash,
            })
            .await?;

        tracing::info!(
            order_id = %order_id,
            booking_id = %booking.id,
            user_id = %user.user_id,
            amount = %booking.amount,
            gateway_ref = ?session.gateway_order_ref,
            "Payment session created"
        );

        Ok(PaymentSession {
            order_id,
            booking_id: booking.id,
            amount: booking.amount,
            currency: self.config.currency.clone(),
            payment_url: session.payment_url,
            sdk_token: session.sdk_token,
        })
    }

    /// Create session dengan retry; order id yang sama dipakai di setiap attempt
    async fn create_session_with_retry(
        &self,
        request: &GatewaySessionRequest,
    ) -> AppResult<GatewaySession> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.gateway.create_session(request).await {
                Ok(session) => {
                    if attempt > 1 {
                        tracing::info!("Session created on attempt {}", attempt);
                    }
                    return Ok(session);
                }
                Err(e) => {
                    tracing::warn!(
                        order_id = %request.order_id,
                        "Session creation attempt {} failed: {}",
                        attempt,
                        e
                    );
                    last_error = Some(e);

                    if attempt < max_attempts {
                        tokio::time::sleep(Duration::from_millis(250 * attempt as u64)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(||
            AppError::GatewayError("All session attempts failed".to_string())
        ))
    }

    fn build_session_request(
        &self,
        user: &AuthUser,
        input: &SessionInput,
        booking_id: Uuid,
        order_id: &str,
        price: &BigDecimal,
        amount_hash: &str,
    ) -> GatewaySessionRequest {
        let options = self.config.payment_methods
            .iter()
            .map(|method| PaymentFilterOption {
                payment_method_type: method.clone(),
                enable: true,
            })
            .collect();

        GatewaySessionRequest {
            order_id: order_id.to_string(),
            amount: canonical_amount(price),
            currency: self.config.currency.clone(),
            customer_id: user.user_id.to_string(),
            customer_email: user.email.clone(),
            customer_phone: user.phone.clone(),
            payment_page_client_id: self.config.client_id.clone(),
            action: "paymentPage".to_string(),
            return_url: self.config.return_url.clone(),
            description: format!(
                "Consultation on {} at {}",
                input.booking_date,
                input.booking_time.format("%H:%M")
            ),
            payment_filter: PaymentFilter {
                allow_default_options: false,
                options,
            },
            metadata: SessionMetadata {
                expiry_in_mins: self.config.session_expiry_minutes.to_string(),
                booking_id: booking_id.to_string(),
                expert_id: input.expert_id.to_string(),
                booking_date: input.booking_date.to_string(),
                booking_time: input.booking_time.format("%H:%M").to_string(),
            },
            udf1: booking_id.to_string(),
            udf2: amount_hash.to_string(),
        }
    }
}
