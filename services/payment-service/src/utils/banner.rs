// /consult-payments/services/payment-service/src/utils/banner.rs

/// Print startup banner
pub fn print_startup_banner(bind_address: &str) {
    println!(r#"
╔══════════════════════════════════════════════════════════╗
║            CONSULTATION PAYMENT SERVICE v1.0.0            ║
╚══════════════════════════════════════════════════════════╝
    "#);

    tracing::info!("🚀 Payment Service starting at {}", bind_address);
    tracing::info!("📋 Available endpoints:");
    tracing::info!("  Public:");
    tracing::info!("    POST /api/payments/webhook             - Gateway webhook");
    tracing::info!("    GET  /api/payments/callback            - Gateway redirect");
    tracing::info!("    GET  /health                           - Health check");
    tracing::info!("  Protected:");
    tracing::info!("    POST /api/payments/session             - Create payment session");
    tracing::info!("    GET  /api/payments/status/{{order_id}}   - Poll gateway status");
    tracing::info!("    GET  /api/payments/failure/{{order_id}}  - Resolve failed payment");
    tracing::info!("    GET  /api/payments/receipt/{{order_id}}  - Booking receipt");
}
