// /consult-payments/services/payment-service/src/utils/error.rs
// Centralized error handling untuk payment service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use crate::models::ErrorResponse;

/// Type alias untuk Result dengan AppError
pub type AppResult<T> = Result<T, AppError>;

/// Application error enum dengan semua possible errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Malformed callback: {0}")]
    MalformedCallback(String),

    #[error("Invalid order format: {0}")]
    InvalidOrderFormat(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    /// Values are kept for logging only, never rendered to the client.
    #[error("Amount mismatch on order {order_id}")]
    AmountMismatch {
        order_id: String,
        expected: String,
        received: String,
    },

    #[error("Hash mismatch on order {order_id}")]
    HashMismatch { order_id: String },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Reason code yang dibawa ke halaman error/security-alert frontend
    pub fn reason_code(&self) -> &'static str {
        match self {
            AppError::GatewayError(_) => "gateway_error",
            AppError::MalformedCallback(_) | AppError::InvalidOrderFormat(_) => "malformed_callback",
            AppError::BookingNotFound(_) | AppError::NotFound(_) => "booking_not_found",
            AppError::AmountMismatch { .. } => "amount_mismatch",
            AppError::HashMismatch { .. } => "hash_mismatch",
            AppError::InvalidSignature(_) => "invalid_signature",
            AppError::BadRequest(_) | AppError::ValidationError(_) => "bad_request",
            AppError::Unauthorized(_) | AppError::Forbidden(_) => "unauthorized",
            AppError::Database(_) | AppError::Configuration(_) | AppError::Internal(_) => "internal_error",
        }
    }

    /// Security failure yang harus diarahkan ke halaman security-alert
    pub fn is_security_violation(&self) -> bool {
        matches!(self, AppError::AmountMismatch { .. } | AppError::HashMismatch { .. })
    }
}

impl IntoResponse for AppError {
    /// Convert AppError ke HTTP response
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AppError::GatewayError(msg) => {
                tracing::error!("Gateway error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "GATEWAY_ERROR",
                    "Payment gateway unavailable, please retry".to_string(),
                )
            }
            AppError::MalformedCallback(msg) => {
                tracing::warn!("Malformed callback: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    "MALFORMED_CALLBACK",
                    "Malformed payment callback".to_string(),
                )
            }
            AppError::InvalidOrderFormat(msg) => {
                tracing::warn!("Invalid order format: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    "INVALID_ORDER_FORMAT",
                    "Invalid order identifier".to_string(),
                )
            }
            AppError::BookingNotFound(msg) => (
                StatusCode::NOT_FOUND,
                "BOOKING_NOT_FOUND",
                msg.clone(),
            ),
            AppError::AmountMismatch { order_id, expected, received } => {
                tracing::error!(
                    order_id = %order_id,
                    expected = %expected,
                    received = %received,
                    "Amount mismatch detected"
                );
                (
                    StatusCode::BAD_REQUEST,
                    "AMOUNT_MISMATCH",
                    "Payment verification failed".to_string(),
                )
            }
            AppError::HashMismatch { order_id } => {
                tracing::error!(order_id = %order_id, "Amount hash mismatch detected");
                (
                    StatusCode::BAD_REQUEST,
                    "HASH_MISMATCH",
                    "Payment verification failed".to_string(),
                )
            }
            AppError::InvalidSignature(msg) => {
                tracing::warn!("Invalid signature: {}", msg);
                (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_SIGNATURE",
                    "Invalid callback signature".to_string(),
                )
            }
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database operation failed".to_string(),
                )
            }
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
            ),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                msg.clone(),
            ),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    "Service configuration error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error_code: Some(error_code.to_string()),
            details: None,
        });

        (status, body).into_response()
    }
}

// Implement conversions dari common error types
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::GatewayError(err.to_string())
    }
}
