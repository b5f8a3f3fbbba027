// /consult-payments/services/payment-service/src/main.rs

mod models;
mod config;
mod api;
mod core;
mod repository;
mod middleware;
mod utils;

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
    timeout::TimeoutLayer,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::info;
use crate::{
    api::routes,
    config::AppConfig,
    core::services::*,
    repository::{BookingStore, Repository},
    middleware::auth::{auth_middleware, JwtVerifier},
    utils::scheduler::{start_background_jobs, SchedulerMetrics},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repository: Arc<Repository>,
    pub initiator: Arc<PaymentInitiator>,
    pub reconciler: Arc<CallbackReconciler>,
    pub poller: Arc<StatusPoller>,
    pub resolver: Arc<FailureResolver>,
    pub scheduler_metrics: Arc<SchedulerMetrics>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Arc::new(AppConfig::from_env()?);

    // Initialize logging
    utils::logger::init_logger(config.is_production());

    // Setup database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(config.database_acquire_timeout_secs))
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("✅ Database berhasil terkoneksi, migrations applied");

    // Initialize repository layer
    let repository = Arc::new(Repository::new(pool));
    let store: Arc<dyn BookingStore> = repository.clone();

    let gateway: Arc<dyn PaymentGateway> = Arc::new(GatewayClient::new(&config.gateway)?);
    let verifier = AmountVerifier::new(config.digest_secret.clone(), config.amount_epsilon.clone());

    let initiator = Arc::new(PaymentInitiator::new(
        store.clone(),
        gateway.clone(),
        verifier.clone(),
        config.gateway.clone(),
    ));
    let reconciler = Arc::new(CallbackReconciler::new(
        store.clone(),
        gateway.clone(),
        verifier.clone(),
        config.gateway.clone(),
    ));
    let poller = Arc::new(StatusPoller::new(store.clone(), gateway, verifier));
    let resolver = Arc::new(FailureResolver::new(store, config.resolver_lookback));

    if config.gateway.webhook_username.is_none() {
        tracing::warn!("⚠️ Webhook Basic auth tidak dikonfigurasi, status webhook dikonfirmasi lewat order status API");
    }

    // Start background jobs
    let scheduler_metrics = SchedulerMetrics::new();
    let _scheduler = start_background_jobs(
        resolver.clone(),
        config.pending_ttl_minutes,
        scheduler_metrics.clone(),
    ).await?;

    // Create application state
    let app_state = AppState {
        config: config.clone(),
        repository,
        initiator,
        reconciler,
        poller,
        resolver,
        scheduler_metrics,
    };

    let jwt = Arc::new(JwtVerifier::new(&config.jwt_secret, config.jwt_issuer.as_deref()));
    let cors = utils::cors::create_cors_layer(&config);

    let app = apply_middleware(
        Router::new()
            .merge(routes::create_routes())
            .with_state(app_state),
        cors,
        jwt,
    );

    let bind_address = format!("0.0.0.0:{}", config.port);
    utils::banner::print_startup_banner(&bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("🚀 Payment Service berjalan di {}", bind_address);

    axum::serve(listener, app)
        .await
        .map_err(|e| e.into())
}

/// Layer terakhir yang dipasang adalah yang paling luar:
/// auth paling dalam, CORS dan tracing di luarnya
fn apply_middleware(router: Router, cors: CorsLayer, jwt: Arc<JwtVerifier>) -> Router {
    router
        .layer(axum_middleware::from_fn_with_state(jwt, auth_middleware))
        .layer(axum_middleware::from_fn(
            middleware::security::security_headers_middleware
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                // Request tracing
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                // Timeout protection
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(30),
                ))
                .layer(cors)
        )
}
