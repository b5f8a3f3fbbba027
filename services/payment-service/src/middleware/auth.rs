// /consult-payments/services/payment-service/src/middleware/auth.rs

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    models::{AuthUser, Claims, ErrorResponse},
    utils::error::{AppError, AppResult},
};

/// Verifier HS256 untuk token yang di-issue identity provider
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 60;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify token dan ubah claims menjadi `AuthUser`
    pub fn verify(&self, token: &str) -> AppResult<AuthUser> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Unauthorized(format!("Token tidak valid: {}", e)))?;

        let claims = token_data.claims;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Format user ID tidak valid".to_string()))?;

        if claims.email.trim().is_empty() {
            return Err(AppError::Unauthorized("Email tidak ada dalam token".to_string()));
        }

        Ok(AuthUser {
            user_id,
            email: claims.email,
            phone: claims.phone.filter(|p| !p.trim().is_empty()),
        })
    }
}

/// Middleware untuk verify JWT dan inject `AuthUser` ke request extensions
pub async fn auth_middleware(
    State(jwt): State<Arc<JwtVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let path = req.uri().path().to_string();

    // Skip auth untuk public endpoints dan CORS preflight
    if req.method() == Method::OPTIONS || is_public_endpoint(&path) {
        return Ok(next.run(req).await);
    }

    let token = req.headers()
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    let Some(token) = token else {
        tracing::debug!("Request ke {} ditolak: missing authorization header", path);
        return Err(reject("Authorization header diperlukan", "MISSING_TOKEN"));
    };

    let user = jwt.verify(&token).map_err(|e| {
        tracing::warn!("Token verification failed for {}: {}", path, e);
        reject("Token tidak valid atau expired", "INVALID_TOKEN")
    })?;

    tracing::debug!("✓ Token verified: user={}, path={}", user.user_id, path);

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

fn reject(message: &str, code: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            success: false,
            message: message.to_string(),
            error_code: Some(code.to_string()),
            details: None,
        }),
    )
}

/// Check apakah endpoint public (tidak perlu auth)
fn is_public_endpoint(path: &str) -> bool {
    let public_paths = [
        "/health",
        "/api/payments/webhook",
        "/api/payments/callback",
    ];

    public_paths.iter().any(|&public_path| path == public_path || path.starts_with(&format!("{}/", public_path)))
}
