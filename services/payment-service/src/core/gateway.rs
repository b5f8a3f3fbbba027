// /consult-payments/services/payment-service/src/core/gateway.rs

use async_trait::async_trait;
use reqwest::Client;
use base64::Engine;
use std::time::Duration;
use crate::{
    config::GatewayConfig,
    models::*,
    utils::error::{AppError, AppResult},
};

/// Kontrak external payment gateway yang dipakai pipeline
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Buat hosted payment session
    async fn create_session(&self, request: &GatewaySessionRequest) -> AppResult<GatewaySession>;

    /// Query status order yang authoritative
    async fn order_status(&self, order_id: &str) -> AppResult<GatewayOrderStatus>;
}

/// Client HTTP untuk gateway (session API + order status API)
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_key: String,
    merchant_id: String,
}

impl GatewayClient {
    /// Initialize gateway client dari config
    pub fn new(config: &GatewayConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            merchant_id: config.merchant_id.clone(),
        })
    }

    fn auth_header(&self) -> String {
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(format!("{}:", self.api_key))
        )
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    async fn create_session(&self, request: &GatewaySessionRequest) -> AppResult<GatewaySession> {
        let response = self.client
            .post(format!("{}/session", self.base_url))
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .header("x-merchantid", &self.merchant_id)
            .header("x-customerid", &request.customer_id)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::GatewayError(format!(
                "Session creation failed with status {}: {}",
                status, error_text
            )));
        }

        let body: GatewaySessionResponse = response.json().await
            .map_err(|e| AppError::GatewayError(format!("Failed to parse session response: {}", e)))?;

        let payment_url = body.payment_links
            .and_then(|links| links.web)
            .filter(|url| !url.trim().is_empty());
        let sdk_token = body.sdk_payload
            .and_then(|sdk| sdk.payload)
            .and_then(|payload| payload.client_auth_token)
            .filter(|token| !token.trim().is_empty());

        if payment_url.is_none() && sdk_token.is_none() {
            return Err(AppError::GatewayError(format!(
                "Session response for {} has neither payment link nor SDK token",
                request.order_id
            )));
        }

        tracing::debug!(
            order_id = %request.order_id,
            gateway_status = ?body.status,
            "Gateway session created"
        );

        Ok(GatewaySession {
            gateway_order_ref: body.id.or(body.order_id),
            payment_url,
            sdk_token,
        })
    }

    async fn order_status(&self, order_id: &str) -> AppResult<GatewayOrderStatus> {
        let response = self.client
            .get(format!("{}/orders/{}", self.base_url, order_id))
            .header("Authorization", self.auth_header())
            .header("x-merchantid", &self.merchant_id)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::GatewayError(format!(
                "Order status query failed with status {}: {}",
                status, error_text
            )));
        }

        let order_status: GatewayOrderStatus = response.json().await
            .map_err(|e| AppError::GatewayError(format!("Failed to parse order status: {}", e)))?;

        if order_status.order_id != order_id {
            return Err(AppError::GatewayError(format!(
                "Order status response is for {} but {} was requested",
                order_status.order_id, order_id
            )));
        }

        Ok(order_status)
    }
}
