// /consult-payments/services/payment-service/src/utils/cors.rs

use tower_http::cors::CorsLayer;
use axum::http::{header, Method, HeaderValue};
use std::env;
use crate::config::AppConfig;

/// Setup CORS layer untuk payment service
pub fn create_cors_layer(config: &AppConfig) -> CorsLayer {
    if config.is_production() {
        build_production_cors(&config.frontend_base_url)
    } else {
        build_development_cors(&config.frontend_base_url)
    }
}

/// Build CORS configuration untuk development environment
pub(crate) fn build_development_cors(frontend: &str) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(parse_allowed_origins(frontend, false))
        .allow_methods(allowed_methods())
        .allow_headers(allowed_headers())
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Build CORS configuration untuk production, hanya origin https
fn build_production_cors(frontend: &str) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(parse_allowed_origins(frontend, true))
        .allow_methods(allowed_methods())
        .allow_headers(allowed_headers())
        .allow_credentials(true)
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(86400))
}

/// Origin dari ALLOWED_ORIGINS, fallback ke frontend base url
fn parse_allowed_origins(frontend: &str, https_only: bool) -> Vec<HeaderValue> {
    let origins_str = env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| frontend.to_string());

    origins_str
        .split(',')
        .map(str::trim)
        .filter(|origin| !https_only || origin.starts_with("https://"))
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(header) => {
                tracing::debug!("CORS origin registered: {}", origin);
                Some(header)
            }
            Err(e) => {
                tracing::warn!("Invalid origin format '{}': {}", origin, e);
                None
            }
        })
        .collect()
}

fn allowed_methods() -> Vec<Method> {
    vec![Method::GET, Method::POST, Method::OPTIONS]
}

/// Daftar headers yang diizinkan (explicit list required untuk credentials)
fn allowed_headers() -> Vec<header::HeaderName> {
    vec![
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
        header::CACHE_CONTROL,
    ]
}
