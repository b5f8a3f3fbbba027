// /consult-payments/services/payment-service/src/api/routes.rs

use axum::{
    routing::{get, post},
    Router,
};
use crate::AppState;
use super::handlers;

/// Create semua routes untuk payment service
pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Session (JWT)
        .route("/api/payments/session", post(handlers::create_session))

        // Callback dari gateway (public, diverifikasi di reconciler)
        .route("/api/payments/webhook", post(handlers::handle_webhook))
        .route(
            "/api/payments/callback",
            get(handlers::handle_redirect_query).post(handlers::handle_redirect_form),
        )

        // Status dan recovery (JWT)
        .route("/api/payments/status/{order_id}", get(handlers::poll_status))
        .route("/api/payments/failure/{order_id}", get(handlers::resolve_failure))
        .route("/api/payments/receipt/{order_id}", get(handlers::get_receipt))

        .route("/health", get(handlers::health_check_handler))
}
