// /consult-payments/services/payment-service/src/core/reconciler.rs

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use base64::Engine;
use bigdecimal::BigDecimal;
use crate::{
    config::GatewayConfig,
    models::*,
    repository::BookingStore,
    utils::error::{AppError, AppResult},
};
use super::{
    gateway::PaymentGateway,
    order_id::OrderId,
    verifier::{canonical_amount, constant_time_eq, verify_digest, verify_signature, AmountVerifier},
};

/// Hasil reconcile satu callback
#[derive(Debug)]
pub enum Reconciliation {
    /// Charge terverifikasi, booking confirmed
    Completed(Booking),
    /// Gateway melaporkan gagal, booking cancelled
    Failed(Booking),
    /// Status belum terminal, booking tidak disentuh
    InProgress { gateway_status: String },
    /// Booking sudah keluar dari pending sebelumnya (replay)
    AlreadyResolved(Booking),
    /// Gateway melaporkan charge untuk booking yang sudah ditutup tanpa completed.
    /// Tidak ada write, perlu rekonsiliasi manual.
    ChargedAfterClose(Booking),
}

/// State machine `pending -> {completed, failed, fraud_attempt}` untuk callback gateway
pub struct CallbackReconciler {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: AmountVerifier,
    config: GatewayConfig,
}

impl CallbackReconciler {
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

    /// Server-to-server webhook (form POST)
    pub async fn reconcile_webhook(
        &self,
        fields: &BTreeMap<String, String>,
        authorization: Option<&str>,
    ) -> AppResult<Reconciliation> {
        let authenticated = self.verify_webhook_auth(authorization)?;
        let callback = parse_webhook_fields(fields)?;
        // Tanpa Basic auth, status terminal hanya dipercaya setelah dikonfirmasi order status API
        self.reconcile(callback, !authenticated).await
    }

    /// Browser redirect (query string atau form), signature dicek sebelum apa pun
    pub async fn reconcile_redirect(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> AppResult<Reconciliation> {
        if !verify_signature(fields, &self.config.response_key) {
            tracing::warn!(
                order_id = ?fields.get("order_id"),
                "Redirect callback signature rejected"
            );
            return Err(AppError::InvalidSignature("redirect signature mismatch".to_string()));
        }

        let callback = parse_redirect_fields(fields)?;
        self.reconcile(callback, false).await
    }

    /// Basic auth webhook. `Ok(false)` berarti credential tidak dikonfigurasi.
    pub fn verify_webhook_auth(&self, authorization: Option<&str>) -> AppResult<bool> {
        let (Some(username), Some(password)) = (
            self.config.webhook_username.as_deref(),
            self.config.webhook_password.as_deref(),
        ) else {
            return Ok(false);
        };

        let provided = authorization
            .and_then(|header| header.trim().strip_prefix("Basic "))
            .and_then(|encoded| base64::engine::general_purpose::STANDARD.decode(encoded.trim()).ok())
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| AppError::InvalidSignature("missing webhook credentials".to_string()))?;

        let expected = format!("{}:{}", username, password);
        if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
            tracing::warn!("Webhook credentials rejected");
            return Err(AppError::InvalidSignature("webhook credentials rejected".to_string()));
        }

        Ok(true)
    }

    async fn reconcile(
        &self,
        mut callback: GatewayCallback,
        confirm_with_gateway: bool,
    ) -> AppResult<Reconciliation> {
        let order = OrderId::parse(&callback.order_id).map_err(|e| {
            AppError::MalformedCallback(format!("order_id '{}': {}", callback.order_id, e))
        })?;

        let booking = self.store
            .find_booking(order.booking_id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(format!("No booking for order {}", callback.order_id)))?;

        if booking.user_id != order.user_id {
            tracing::warn!(
                order_id = %callback.order_id,
                booking_id = %booking.id,
                "Order id user does not own the referenced booking"
            );
            return Err(AppError::BookingNotFound(format!("No booking for order {}", callback.order_id)));
        }

        if !booking.is_pending() {
            if GatewayStatus::parse(&callback.status) == GatewayStatus::Charged {
                return Ok(self.after_close(&callback.order_id, booking));
            }
            tracing::info!(
                order_id = %callback.order_id,
                payment_status = %booking.payment_status,
                source = ?callback.source,
                "Callback for resolved booking ignored"
            );
            return Ok(Reconciliation::AlreadyResolved(booking));
        }

        let mut status = GatewayStatus::parse(&callback.status);

        // Redirect tanpa amount atau webhook tanpa auth: order status API jadi sumber kebenaran
        let needs_lookup = match status {
            GatewayStatus::Charged => confirm_with_gateway || callback.amount.is_none(),
            GatewayStatus::Declined(_) => confirm_with_gateway,
            GatewayStatus::InProgress(_) => false,
        };
        if needs_lookup {
            let order_status = self.gateway.order_status(&callback.order_id).await?;
            let confirmed = GatewayStatus::parse(&order_status.status);
            if confirmed != status {
                tracing::warn!(
                    order_id = %callback.order_id,
                    claimed = %callback.status,
                    gateway_status = %order_status.status,
                    "Callback status differs from gateway order status"
                );
            }

            status = confirmed;
            callback.transaction_id = order_status.transaction_reference().or(callback.transaction_id);
            callback.amount = Some(order_status.amount);
            callback.payment_mode = order_status.payment_method_type.or(callback.payment_mode);
            callback.amount_hash = order_status.udf2.or(callback.amount_hash);
        }

        match status {
            GatewayStatus::InProgress(gateway_status) => {
                tracing::info!(
                    order_id = %callback.order_id,
                    gateway_status = %gateway_status,
                    "Payment still in progress, booking left pending"
                );
                Ok(Reconciliation::InProgress { gateway_status })
            }
            GatewayStatus::Declined(gateway_status) => {
                let transition = PaymentTransition::failed(
                    callback.transaction_id.clone(),
                    format!("Gateway reported {} for order {}", gateway_status, callback.order_id),
                );
                tracing::info!(
                    order_id = %callback.order_id,
                    gateway_status = %gateway_status,
                    "Payment declined"
                );
                self.apply(&booking, &transition, Reconciliation::Failed).await
            }
            GatewayStatus::Charged => self.settle(&order, &booking, callback).await,
        }
    }

    /// Dua pengecekan independen sebelum booking boleh completed
    async fn settle(
        &self,
        order: &OrderId,
        booking: &Booking,
        callback: GatewayCallback,
    ) -> AppResult<Reconciliation> {
        let Some(received) = callback.amount.clone() else {
            return Err(AppError::MalformedCallback(format!(
                "Charged callback for {} carries no amount",
                callback.order_id
            )));
        };

        if !self.verifier.amounts_match(&received, &booking.amount) {
            let expected = canonical_amount(&booking.amount);
            let received = canonical_amount(&received);
            let note = format!(
                "SECURITY: amount mismatch on order {}: expected {}, received {}",
                callback.order_id, expected, received
            );
            self.flag_fraud(booking, note).await?;

            return Err(AppError::AmountMismatch {
                order_id: callback.order_id,
                expected,
                received,
            });
        }

        // Digest terikat ke amount tersimpan, drift dalam epsilon sudah lolos di atas
        let computed = self.verifier.compute_digest(order.booking_id, &booking.amount, order.user_id);
        if !verify_digest(callback.amount_hash.as_deref(), Some(&booking.amount_hash), &computed) {
            let note = format!(
                "SECURITY: amount hash mismatch on order {}: expected amount {}, received {}",
                callback.order_id,
                canonical_amount(&booking.amount),
                canonical_amount(&received)
            );
            self.flag_fraud(booking, note).await?;

            return Err(AppError::HashMismatch { order_id: callback.order_id });
        }

        let transaction_id = callback.transaction_id
            .clone()
            .unwrap_or_else(|| callback.order_id.clone());
        let transition = PaymentTransition::completed(transaction_id, callback.payment_mode.clone());

        match self.apply(booking, &transition, Reconciliation::Completed).await? {
            Reconciliation::Completed(confirmed) => {
                tracing::info!(
                    order_id = %callback.order_id,
                    booking_id = %confirmed.id,
                    transaction_id = ?confirmed.transaction_id,
                    amount = %confirmed.amount,
                    "Payment completed"
                );
                Ok(Reconciliation::Completed(confirmed))
            }
            Reconciliation::AlreadyResolved(current) => Ok(self.after_close(&callback.order_id, current)),
            other => Ok(other),
        }
    }

    /// Charge untuk booking yang sudah keluar dari pending
    fn after_close(&self, order_id: &str, booking: Booking) -> Reconciliation {
        if booking.payment_status == PaymentStatus::Completed {
            tracing::info!(order_id = %order_id, booking_id = %booking.id, "Charge replay for completed booking ignored");
            return Reconciliation::AlreadyResolved(booking);
        }

        tracing::error!(
            order_id = %order_id,
            booking_id = %booking.id,
            user_id = %booking.user_id,
            payment_status = %booking.payment_status,
            amount = %booking.amount,
            "Charge reported for closed booking, manual reconciliation required"
        );
        Reconciliation::ChargedAfterClose(booking)
    }

    async fn flag_fraud(&self, booking: &Booking, note: String) -> AppResult<()> {
        tracing::error!(booking_id = %booking.id, user_id = %booking.user_id, "{}", note);

        let transition = PaymentTransition::fraud_attempt(note);
        if self.store.transition_from_pending(booking.id, &transition).await?.is_none() {
            tracing::warn!(booking_id = %booking.id, "Booking resolved concurrently, fraud flag not written");
        }
        Ok(())
    }

    /// Conditional write; kalah race berarti callback lain sudah menyelesaikan booking
    async fn apply(
        &self,
        booking: &Booking,
        transition: &PaymentTransition,
        wrap: fn(Booking) -> Reconciliation,
    ) -> AppResult<Reconciliation> {
        match self.store.transition_from_pending(booking.id, transition).await? {
            Some(updated) => Ok(wrap(updated)),
            None => {
                let current = self.store
                    .find_booking(booking.id)
                    .await?
                    .ok_or_else(|| AppError::BookingNotFound(booking.id.to_string()))?;
                tracing::info!(booking_id = %booking.id, "Booking resolved by a concurrent callback");
                Ok(Reconciliation::AlreadyResolved(current))
            }
        }
    }
}

/// Webhook wajib membawa status, order_id dan amount
pub fn parse_webhook_fields(fields: &BTreeMap<String, String>) -> AppResult<GatewayCallback> {
    let amount = required_field(fields, &["amount"])?;

    Ok(GatewayCallback {
        source: CallbackSource::Webhook,
        order_id: required_field(fields, &["order_id"])?,
        status: required_field(fields, &["status"])?,
        amount: Some(parse_amount(&amount)?),
        transaction_id: optional_field(fields, &["txn_id", "transaction_id"]),
        payment_mode: optional_field(fields, &["payment_method_type", "payment_mode"]),
        amount_hash: optional_field(fields, &["amount_hash", "udf2"]),
    })
}

pub fn parse_redirect_fields(fields: &BTreeMap<String, String>) -> AppResult<GatewayCallback> {
    let amount = optional_field(fields, &["amount"])
        .map(|raw| parse_amount(&raw))
        .transpose()?;

    Ok(GatewayCallback {
        source: CallbackSource::Redirect,
        order_id: required_field(fields, &["order_id"])?,
        status: required_field(fields, &["payment_status", "status"])?,
        amount,
        transaction_id: optional_field(fields, &["merchant_transaction_id", "txn_id"]),
        payment_mode: optional_field(fields, &["payment_instrument", "payment_method_type"]),
        amount_hash: optional_field(fields, &["amount_hash", "udf2"]),
    })
}

fn optional_field(fields: &BTreeMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn required_field(fields: &BTreeMap<String, String>, keys: &[&str]) -> AppResult<String> {
    optional_field(fields, keys)
        .ok_or_else(|| AppError::MalformedCallback(format!("missing field '{}'", keys[0])))
}

fn parse_amount(raw: &str) -> AppResult<BigDecimal> {
    let amount = BigDecimal::from_str(raw.trim())
        .map_err(|_| AppError::MalformedCallback(format!("invalid amount '{}'", raw)))?;

    if amount < BigDecimal::from(0) {
        return Err(AppError::MalformedCallback(format!("negative amount '{}'", raw)));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gateway::{tests::test_gateway_config, GatewayClient};
    use crate::core::verifier::{sign_params, SIGNATURE_FIELD};
    use crate::repository::memory::InMemoryBookingStore;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<InMemoryBookingStore>,
        reconciler: Arc<CallbackReconciler>,
        verifier: AmountVerifier,
    }

    fn verifier() -> AmountVerifier {
        AmountVerifier::new("reconciler-test-secret-0123456789abcdef", BigDecimal::from_str("0.01").unwrap())
    }

    fn fixture_with(config: GatewayConfig) -> Fixture {
        let store = Arc::new(InMemoryBookingStore::new());
        let gateway = Arc::new(GatewayClient::new(&config).unwrap());
        let reconciler = Arc::new(CallbackReconciler::new(store.clone(), gateway, verifier(), config));
        Fixture {
            store,
            reconciler,
            verifier: verifier(),
        }
    }

    /// base64("gateway:s3cret")
    const AUTH: Option<&str> = Some("Basic Z2F0ZXdheTpzM2NyZXQ=");

    fn authenticated_config(base_url: &str) -> GatewayConfig {
        let mut config = test_gateway_config(base_url);
        config.webhook_username = Some("gateway".to_string());
        config.webhook_password = Some("s3cret".to_string());
        config
    }

    fn fixture() -> Fixture {
        fixture_with(authenticated_config("http://127.0.0.1:9"))
    }

    async fn mock_order_status(
        server: &mut mockito::ServerGuard,
        order_id: &str,
        status: &str,
        amount: &str,
    ) -> mockito::Mock {
        server
            .mock("GET", format!("/orders/{}", order_id).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"order_id":"{}","status":"{}","amount":"{}","txn_id":"gw_txn_1","payment_method_type":"CARD"}}"#,
                order_id, status, amount
            ))
            .create_async()
            .await
    }

    /// Seed booking pending dengan digest valid, return order id
    async fn seed(fx: &Fixture, amount: i64) -> (Booking, String) {
        let booking_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let amount = BigDecimal::from(amount);
        let hash = fx.verifier.compute_digest(booking_id, &amount, user_id);
        let booking = fx.store
            .seed_pending(booking_id, user_id, Uuid::new_v4(), amount, hash)
            .await;
        let order_id = OrderId::generate(user_id, booking_id).to_string();
        (booking, order_id)
    }

    fn webhook(order_id: &str, status: &str, amount: &str) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("order_id".to_string(), order_id.to_string());
        fields.insert("status".to_string(), status.to_string());
        fields.insert("amount".to_string(), amount.to_string());
        fields.insert("txn_id".to_string(), "txn_777".to_string());
        fields.insert("payment_method_type".to_string(), "UPI".to_string());
        fields
    }

    fn signed_redirect(order_id: &str, status: &str, amount: Option<&str>, key: &str) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("order_id".to_string(), order_id.to_string());
        fields.insert("payment_status".to_string(), status.to_string());
        fields.insert("merchant_transaction_id".to_string(), "mtx_42".to_string());
        fields.insert("payment_instrument".to_string(), "CARD".to_string());
        fields.insert("transaction_date".to_string(), "2026-10-16T10:00:00Z".to_string());
        if let Some(amount) = amount {
            fields.insert("amount".to_string(), amount.to_string());
        }
        let signature = sign_params(&fields, key);
        fields.insert(SIGNATURE_FIELD.to_string(), signature);
        fields
    }

    #[tokio::test]
    async fn test_matching_charge_completes_booking() {
        let fx = fixture();
        let (booking, order_id) = seed(&fx, 1500).await;

        let outcome = fx.reconciler
            .reconcile_webhook(&webhook(&order_id, "CHARGED", "1500.0"), AUTH)
            .await
            .unwrap();

        let Reconciliation::Completed(updated) = outcome else {
            panic!("expected completed");
        };
        assert_eq!(updated.id, booking.id);
        assert_eq!(updated.payment_status, PaymentStatus::Completed);
        assert_eq!(updated.status, BookingStatus::Confirmed);
        assert_eq!(updated.transaction_id.as_deref(), Some("txn_777"));
        assert_eq!(updated.payment_mode.as_deref(), Some("UPI"));
        assert!(updated.payment_time.is_some());
    }

    #[tokio::test]
    async fn test_amount_mismatch_flags_fraud_and_keeps_both_values() {
        let fx = fixture();
        let (booking, order_id) = seed(&fx, 1500).await;

        let result = fx.reconciler
            .reconcile_webhook(&webhook(&order_id, "CHARGED", "1800.0"), AUTH)
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, AppError::AmountMismatch { .. }));
        assert_eq!(err.reason_code(), "amount_mismatch");

        let stored = fx.store.get(booking.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::FraudAttempt);
        let notes = stored.notes.unwrap();
        assert!(notes.contains("1500"));
        assert!(notes.contains("1800"));
    }

    #[tokio::test]
    async fn test_tampered_digest_flags_fraud() {
        let fx = fixture();
        let booking_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let amount = BigDecimal::from(1500);
        // Digest tersimpan dibuat untuk user lain
        let foreign = fx.verifier.compute_digest(booking_id, &amount, Uuid::new_v4());
        fx.store.seed_pending(booking_id, user_id, Uuid::new_v4(), amount, foreign).await;
        let order_id = OrderId::generate(user_id, booking_id).to_string();

        let mut fields = webhook(&order_id, "CHARGED", "1500.00");
        fields.insert("amount_hash".to_string(), "deadbeef".to_string());

        let err = fx.reconciler.reconcile_webhook(&fields, AUTH).await.unwrap_err();
        assert!(matches!(err, AppError::HashMismatch { .. }));
        assert_eq!(
            fx.store.get(booking_id).await.unwrap().payment_status,
            PaymentStatus::FraudAttempt
        );
    }

    #[tokio::test]
    async fn test_short_order_id_is_malformed_without_writes() {
        let fx = fixture();
        seed(&fx, 1500).await;

        let err = fx.reconciler
            .reconcile_webhook(&webhook("ORDER_abc", "CHARGED", "1500.00"), AUTH)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MalformedCallback(_)));
        assert_eq!(fx.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_replayed_success_is_noop() {
        let fx = fixture();
        let (_, order_id) = seed(&fx, 1500).await;
        let fields = webhook(&order_id, "CHARGED", "1500.00");

        let first = fx.reconciler.reconcile_webhook(&fields, AUTH).await.unwrap();
        let second = fx.reconciler.reconcile_webhook(&fields, AUTH).await.unwrap();

        assert!(matches!(first, Reconciliation::Completed(_)));
        assert!(matches!(second, Reconciliation::AlreadyResolved(ref b) if b.payment_status == PaymentStatus::Completed));
        assert_eq!(fx.store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_complete_once() {
        let fx = fixture();
        let (_, order_id) = seed(&fx, 1500).await;
        let fields = webhook(&order_id, "CHARGED", "1500.00");

        let (a, b) = tokio::join!(
            fx.reconciler.reconcile_webhook(&fields, AUTH),
            fx.reconciler.reconcile_webhook(&fields, AUTH)
        );

        let completed = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|r| matches!(r, Reconciliation::Completed(_)))
            .count();
        assert_eq!(completed, 1);
        assert_eq!(fx.store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_declined_status_cancels_booking() {
        let fx = fixture();
        let (booking, order_id) = seed(&fx, 1500).await;

        let outcome = fx.reconciler
            .reconcile_webhook(&webhook(&order_id, "AUTHORIZATION_FAILED", "1500.00"), AUTH)
            .await
            .unwrap();

        assert!(matches!(outcome, Reconciliation::Failed(_)));
        let stored = fx.store.get(booking.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert!(stored.notes.unwrap().contains("AUTHORIZATION_FAILED"));
    }

    #[tokio::test]
    async fn test_pending_status_leaves_booking_untouched() {
        let fx = fixture();
        let (booking, order_id) = seed(&fx, 1500).await;

        let outcome = fx.reconciler
            .reconcile_webhook(&webhook(&order_id, "PENDING_VBV", "1500.00"), AUTH)
            .await
            .unwrap();

        assert!(matches!(outcome, Reconciliation::InProgress { .. }));
        assert!(fx.store.get(booking.id).await.unwrap().is_pending());
        assert_eq!(fx.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_booking_not_found() {
        let fx = fixture();
        let order_id = OrderId::generate(Uuid::new_v4(), Uuid::new_v4()).to_string();

        let err = fx.reconciler
            .reconcile_webhook(&webhook(&order_id, "CHARGED", "1500.00"), AUTH)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookingNotFound(_)));
    }

    #[tokio::test]
    async fn test_order_id_with_foreign_user_not_found() {
        let fx = fixture();
        let (booking, _) = seed(&fx, 1500).await;
        let forged = OrderId::generate(Uuid::new_v4(), booking.id).to_string();

        let err = fx.reconciler
            .reconcile_webhook(&webhook(&forged, "FAILED", "1500.00"), AUTH)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BookingNotFound(_)));
        assert_eq!(fx.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_webhook_missing_amount_is_malformed() {
        let fx = fixture();
        let (_, order_id) = seed(&fx, 1500).await;
        let mut fields = webhook(&order_id, "CHARGED", "1500.00");
        fields.remove("amount");

        let err = fx.reconciler.reconcile_webhook(&fields, AUTH).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedCallback(_)));
    }

    #[tokio::test]
    async fn test_webhook_basic_auth_enforced_when_configured() {
        let fx = fixture();
        let (_, order_id) = seed(&fx, 1500).await;
        let fields = webhook(&order_id, "CHARGED", "1500.00");

        let missing = fx.reconciler.reconcile_webhook(&fields, None).await;
        assert!(matches!(missing, Err(AppError::InvalidSignature(_))));

        let wrong = fx.reconciler.reconcile_webhook(&fields, Some("Basic Z2F0ZXdheTpub3Bl")).await;
        assert!(matches!(wrong, Err(AppError::InvalidSignature(_))));
        assert_eq!(fx.store.write_count(), 0);

        let ok = fx.reconciler
            .reconcile_webhook(&fields, AUTH)
            .await
            .unwrap();
        assert!(matches!(ok, Reconciliation::Completed(_)));
    }

    #[tokio::test]
    async fn test_redirect_with_bad_signature_rejected_without_writes() {
        let fx = fixture();
        let (_, order_id) = seed(&fx, 1500).await;
        let fields = signed_redirect(&order_id, "CHARGED", Some("1500.00"), "wrong-key");

        let err = fx.reconciler.reconcile_redirect(&fields).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature(_)));
        assert_eq!(fx.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_signed_redirect_completes_booking() {
        let fx = fixture();
        let (_, order_id) = seed(&fx, 1500).await;
        let fields = signed_redirect(&order_id, "CHARGED", Some("1500.00"), "test-response-key");

        let outcome = fx.reconciler.reconcile_redirect(&fields).await.unwrap();
        let Reconciliation::Completed(updated) = outcome else {
            panic!("expected completed");
        };
        assert_eq!(updated.transaction_id.as_deref(), Some("mtx_42"));
        assert_eq!(updated.payment_mode.as_deref(), Some("CARD"));
    }

    #[tokio::test]
    async fn test_redirect_without_amount_uses_gateway_amount() {
        let mut server = mockito::Server::new_async().await;
        let fx = fixture_with(test_gateway_config(&server.url()));
        let (booking, order_id) = seed(&fx, 1500).await;

        let mock = server
            .mock("GET", format!("/orders/{}", order_id).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"order_id":"{}","status":"CHARGED","amount":1800.0,"txn_id":"gw_1"}}"#,
                order_id
            ))
            .create_async()
            .await;

        let fields = signed_redirect(&order_id, "CHARGED", None, "test-response-key");
        let err = fx.reconciler.reconcile_redirect(&fields).await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, AppError::AmountMismatch { .. }));
        assert_eq!(
            fx.store.get(booking.id).await.unwrap().payment_status,
            PaymentStatus::FraudAttempt
        );
    }

    #[tokio::test]
    async fn test_unauthenticated_charge_claim_is_checked_against_gateway() {
        let mut server = mockito::Server::new_async().await;
        let fx = fixture_with(test_gateway_config(&server.url()));
        let (booking, order_id) = seed(&fx, 1500).await;
        let mock = mock_order_status(&mut server, &order_id, "PENDING_VBV", "1500.00").await;

        let outcome = fx.reconciler
            .reconcile_webhook(&webhook(&order_id, "CHARGED", "1500"), None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(matches!(outcome, Reconciliation::InProgress { .. }));
        assert!(fx.store.get(booking.id).await.unwrap().is_pending());
        assert_eq!(fx.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unauthenticated_charge_completes_with_gateway_values() {
        let mut server = mockito::Server::new_async().await;
        let fx = fixture_with(test_gateway_config(&server.url()));
        let (_, order_id) = seed(&fx, 1500).await;
        mock_order_status(&mut server, &order_id, "CHARGED", "1500.00").await;

        let outcome = fx.reconciler
            .reconcile_webhook(&webhook(&order_id, "CHARGED", "1500"), None)
            .await
            .unwrap();

        let Reconciliation::Completed(updated) = outcome else {
            panic!("expected completed");
        };
        assert_eq!(updated.transaction_id.as_deref(), Some("gw_txn_1"));
        assert_eq!(updated.payment_mode.as_deref(), Some("CARD"));
    }

    #[tokio::test]
    async fn test_unauthenticated_webhook_without_gateway_answer_writes_nothing() {
        let mut server = mockito::Server::new_async().await;
        let fx = fixture_with(test_gateway_config(&server.url()));
        let (booking, order_id) = seed(&fx, 1500).await;
        server
            .mock("GET", format!("/orders/{}", order_id).as_str())
            .with_status(503)
            .create_async()
            .await;

        let err = fx.reconciler
            .reconcile_webhook(&webhook(&order_id, "FAILED", "1500"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::GatewayError(_)));
        assert!(fx.store.get(booking.id).await.unwrap().is_pending());
        assert_eq!(fx.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_sub_cent_drift_within_epsilon_completes() {
        let fx = fixture();
        let (booking, order_id) = seed(&fx, 1500).await;

        let outcome = fx.reconciler
            .reconcile_webhook(&webhook(&order_id, "CHARGED", "1500.006"), AUTH)
            .await
            .unwrap();

        assert!(matches!(outcome, Reconciliation::Completed(_)));
        assert_eq!(
            fx.store.get(booking.id).await.unwrap().payment_status,
            PaymentStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_charge_after_booking_closed_is_flagged_not_dropped() {
        let fx = fixture();
        let (booking, order_id) = seed(&fx, 1500).await;
        fx.store
            .transition_from_pending(booking.id, &PaymentTransition::failed(None, "closed".to_string()))
            .await
            .unwrap();

        let outcome = fx.reconciler
            .reconcile_webhook(&webhook(&order_id, "CHARGED", "1500.00"), AUTH)
            .await
            .unwrap();

        assert!(matches!(outcome, Reconciliation::ChargedAfterClose(ref b) if b.payment_status == PaymentStatus::Failed));
        assert_eq!(fx.store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_transaction_id_survives_later_deliveries() {
        let fx = fixture();
        let (booking, order_id) = seed(&fx, 1500).await;
        fx.reconciler
            .reconcile_webhook(&webhook(&order_id, "CHARGED", "1500.00"), AUTH)
            .await
            .unwrap();

        let mut replay = webhook(&order_id, "CHARGED", "1500.00");
        replay.insert("txn_id".to_string(), "txn_other".to_string());
        let outcome = fx.reconciler.reconcile_webhook(&replay, AUTH).await.unwrap();

        assert!(matches!(outcome, Reconciliation::AlreadyResolved(_)));
        let stored = fx.store.get(booking.id).await.unwrap();
        assert_eq!(stored.transaction_id.as_deref(), Some("txn_777"));
    }
}
