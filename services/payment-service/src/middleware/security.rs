// /consult-payments/services/payment-service/src/middleware/security.rs

use axum::{
    http::HeaderValue,
    middleware::Next,
    response::Response,
    extract::Request,
};

/// Security headers middleware
pub async fn security_headers_middleware(
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("strict-origin-when-cross-origin"));
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    // Response payment tidak boleh di-cache di mana pun
    if path.starts_with("/api/payments") {
        headers.insert(
            "Cache-Control",
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
    }

    response
}
