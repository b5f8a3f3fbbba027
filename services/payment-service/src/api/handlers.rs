// /consult-payments/services/payment-service/src/api/handlers.rs

use axum::{
    extract::{Form, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Json, Redirect},
    Extension,
};
use chrono::Utc;
use reqwest::Url;
use std::collections::BTreeMap;
use validator::Validate;

use crate::{
    models::*,
    AppState,
    core::{
        order_id::OrderId,
        reconciler::Reconciliation,
        resolver::Resolution,
    },
    utils::{
        error::{AppError, AppResult},
        health,
        validator as utils_validator,
    },
};

// ========================= SESSION HANDLERS =========================

/// Handler untuk membuat payment session
/// POST /api/payments/session
pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateSessionRequest>,
) -> AppResult<Json<PaymentSessionResponse>> {
    payload.validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let expert_id = utils_validator::validate_uuid(&payload.expert_id, "expert_id")?;
    let booking_time = utils_validator::validate_booking_time(&payload.booking_time)?;
    let booking_date = utils_validator::validate_booking_date(
        payload.booking_date,
        Utc::now().date_naive(),
    )?;

    let session = state.initiator
        .initiate(&user, SessionInput {
            expert_id,
            booking_date,
            booking_time,
        })
        .await?;

    Ok(Json(PaymentSessionResponse {
        success: true,
        message: "Payment session berhasil dibuat".to_string(),
        data: Some(session),
    }))
}

// ========================= CALLBACK HANDLERS =========================

/// Webhook server-to-server dari gateway. Response JSON supaya gateway
/// me-retry delivery yang gagal (5xx).
/// POST /api/payments/webhook
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(fields): Form<BTreeMap<String, String>>,
) -> AppResult<Json<serde_json::Value>> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    tracing::info!(order_id = ?fields.get("order_id"), status = ?fields.get("status"), "Processing gateway webhook");

    let outcome = state.reconciler.reconcile_webhook(&fields, authorization).await;
    let order_id = callback_order_id(&fields);
    log_callback_outcome(order_id, &outcome);
    webhook_response(order_id, outcome)
}

/// Hasil webhook: 200 jika callback sudah ditangani, selain itu error JSON
pub fn webhook_response(
    order_id: &str,
    outcome: AppResult<Reconciliation>,
) -> AppResult<Json<serde_json::Value>> {
    let result = outcome?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "order_id": order_id,
            "outcome": outcome_label(&result),
        }
    })))
}

/// Redirect browser dari hosted payment page (query string)
/// GET /api/payments/callback
pub async fn handle_redirect_query(
    State(state): State<AppState>,
    Query(fields): Query<BTreeMap<String, String>>,
) -> Redirect {
    let outcome = state.reconciler.reconcile_redirect(&fields).await;
    finish_callback(&state, &fields, outcome)
}

/// Redirect browser dari hosted payment page (form post)
/// POST /api/payments/callback
pub async fn handle_redirect_form(
    State(state): State<AppState>,
    Form(fields): Form<BTreeMap<String, String>>,
) -> Redirect {
    let outcome = state.reconciler.reconcile_redirect(&fields).await;
    finish_callback(&state, &fields, outcome)
}

fn finish_callback(
    state: &AppState,
    fields: &BTreeMap<String, String>,
    outcome: AppResult<Reconciliation>,
) -> Redirect {
    let order_id = callback_order_id(fields);
    log_callback_outcome(order_id, &outcome);
    Redirect::to(&callback_redirect(&state.config.frontend_base_url, order_id, &outcome))
}

fn callback_order_id(fields: &BTreeMap<String, String>) -> &str {
    fields.get("order_id").map(String::as_str).unwrap_or_default()
}

fn log_callback_outcome(order_id: &str, outcome: &AppResult<Reconciliation>) {
    match outcome {
        Ok(result) => tracing::info!(order_id = %order_id, outcome = ?outcome_label(result), "Callback reconciled"),
        Err(e) if e.is_security_violation() => {
            tracing::error!(order_id = %order_id, reason = e.reason_code(), "Callback failed security checks: {}", e)
        }
        Err(e) => tracing::warn!(order_id = %order_id, reason = e.reason_code(), "Callback rejected: {}", e),
    }
}

fn outcome_label(result: &Reconciliation) -> &'static str {
    match result {
        Reconciliation::Completed(_) => "completed",
        Reconciliation::Failed(_) => "failed",
        Reconciliation::InProgress { .. } => "in_progress",
        Reconciliation::AlreadyResolved(_) => "already_resolved",
        Reconciliation::ChargedAfterClose(_) => "charged_after_close",
    }
}

/// Setiap hasil callback berakhir di salah satu halaman frontend
pub fn callback_redirect(
    frontend_base_url: &str,
    order_id: &str,
    outcome: &AppResult<Reconciliation>,
) -> String {
    match outcome {
        Ok(Reconciliation::Completed(_)) => {
            frontend_url(frontend_base_url, "/payment/success", "orderId", order_id)
        }
        Ok(Reconciliation::AlreadyResolved(booking)) if booking.payment_status == PaymentStatus::Completed => {
            frontend_url(frontend_base_url, "/payment/success", "orderId", order_id)
        }
        // Belum final: halaman failure akan menutup booking yang mungkin masih dibayar
        Ok(Reconciliation::InProgress { .. }) | Ok(Reconciliation::ChargedAfterClose(_)) => {
            frontend_url(frontend_base_url, "/payment/pending", "orderId", order_id)
        }
        Ok(_) => frontend_url(frontend_base_url, "/payment/failure", "orderId", order_id),
        Err(e) if e.is_security_violation() => {
            frontend_url(frontend_base_url, "/payment/security-alert", "reason", e.reason_code())
        }
        Err(e) => frontend_url(frontend_base_url, "/payment/error", "reason", e.reason_code()),
    }
}

fn frontend_url(base: &str, path: &str, key: &str, value: &str) -> String {
    match Url::parse(&format!("{}{}", base.trim_end_matches('/'), path)) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(key, value);
            url.to_string()
        }
        Err(e) => {
            tracing::error!("Invalid FRONTEND_BASE_URL '{}': {}", base, e);
            path.to_string()
        }
    }
}

// ========================= STATUS & RECOVERY HANDLERS =========================

/// Handler untuk poll status ke gateway
/// GET /api/payments/status/{order_id}
pub async fn poll_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    utils_validator::validate_order_id_length(&order_id)?;
    let order = OrderId::parse(&order_id)?;

    if order.user_id != user.user_id {
        tracing::warn!("User {} attempted to poll order {} owned by {}", user.user_id, order_id, order.user_id);
        return Err(AppError::Forbidden("Akses ditolak untuk order ini".to_string()));
    }

    let result = state.poller.poll_status(&order_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": result,
    })))
}

/// Handler untuk halaman failure, menutup booking yang masih pending
/// GET /api/payments/failure/{order_id}
pub async fn resolve_failure(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    utils_validator::validate_order_id_length(&order_id)?;

    if let Ok(order) = OrderId::parse(&order_id) {
        if order.user_id != user.user_id {
            tracing::warn!("User {} attempted to resolve order {} owned by {}", user.user_id, order_id, order.user_id);
            return Err(AppError::Forbidden("Akses ditolak untuk order ini".to_string()));
        }
    }

    let (outcome, booking, message) = match state.resolver.resolve(&order_id, user.user_id).await? {
        Resolution::Cancelled(booking) => ("cancelled", Some(booking), "Pembayaran gagal, booking dibatalkan"),
        Resolution::AlreadyResolved(booking) => ("already_resolved", Some(booking), "Booking sudah diproses"),
        Resolution::NotFound => ("not_found", None, "Booking tidak ditemukan"),
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "message": message,
        "data": {
            "order_id": order_id,
            "outcome": outcome,
            "booking": booking.as_ref().map(BookingReceipt::from),
        }
    })))
}

/// Handler ringkasan booking untuk halaman success (owner only)
/// GET /api/payments/receipt/{order_id}
pub async fn get_receipt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    utils_validator::validate_order_id_length(&order_id)?;

    let booking = state.resolver
        .locate(&order_id, user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking tidak ditemukan".to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": BookingReceipt::from(&booking),
    })))
}

// ========================= HEALTH =========================

/// GET /health
pub async fn health_check_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let webhook_auth = state.config.gateway.webhook_username.is_some();
    let result = health::health_check(state.repository.get_pool(), webhook_auth).await;

    let status_code = match result.status {
        health::HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    (status_code, Json(serde_json::json!({
        "service": "consult-payment-service",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "health": result,
        "scheduler": state.scheduler_metrics.get_status().await,
    })))
}
