// /consult-payments/services/payment-service/src/utils/logger.rs

use tracing_subscriber::EnvFilter;

/// Logger initialization. Format JSON di production, human readable selain itu.
pub fn init_logger(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("consult_payment_service=debug,tower_http=debug,info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
