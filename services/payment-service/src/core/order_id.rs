// /consult-payments/services/payment-service/src/core/order_id.rs

//! Order identifier yang mengikat transaksi gateway ke booking.
//!
//! Format: `ORDER_<unix-millis>_<user-uuid>_<booking-uuid>`. Semua komponen
//! (reconciler, poller, resolver) wajib parse lewat [`OrderId::parse`].

use std::fmt;
use uuid::Uuid;
use chrono::Utc;
use crate::utils::error::AppError;

pub const ORDER_PREFIX: &str = "ORDER";
pub const ORDER_DELIMITER: char = '_';
pub const ORDER_SEGMENTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderId {
    pub timestamp_ms: i64,
    pub user_id: Uuid,
    pub booking_id: Uuid,
}

/// Alasan parse gagal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderIdError {
    SegmentCount { found: usize },
    Prefix(String),
    Timestamp(String),
    UserId(String),
    BookingId(String),
}

impl fmt::Display for OrderIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderIdError::SegmentCount { found } => write!(
                f,
                "expected {} segments separated by '{}', found {}",
                ORDER_SEGMENTS, ORDER_DELIMITER, found
            ),
            OrderIdError::Prefix(p) => write!(f, "unexpected prefix '{}'", p),
            OrderIdError::Timestamp(t) => write!(f, "invalid timestamp segment '{}'", t),
            OrderIdError::UserId(u) => write!(f, "invalid user id segment '{}'", u),
            OrderIdError::BookingId(b) => write!(f, "invalid booking id segment '{}'", b),
        }
    }
}

impl std::error::Error for OrderIdError {}

impl From<OrderIdError> for AppError {
    fn from(err: OrderIdError) -> Self {
        AppError::InvalidOrderFormat(err.to_string())
    }
}

impl OrderId {
    /// Generate order id baru dengan timestamp sekarang
    pub fn generate(user_id: Uuid, booking_id: Uuid) -> Self {
        Self {
            timestamp_ms: Utc::now().timestamp_millis(),
            user_id,
            booking_id,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, OrderIdError> {
        let segments: Vec<&str> = raw.trim().split(ORDER_DELIMITER).collect();

        if segments.len() != ORDER_SEGMENTS {
            return Err(OrderIdError::SegmentCount { found: segments.len() });
        }

        if segments[0] != ORDER_PREFIX {
            return Err(OrderIdError::Prefix(segments[0].to_string()));
        }

        let timestamp_ms = segments[1]
            .parse::<i64>()
            .ok()
            .filter(|ts| *ts > 0)
            .ok_or_else(|| OrderIdError::Timestamp(segments[1].to_string()))?;

        let user_id = Uuid::parse_str(segments[2])
            .map_err(|_| OrderIdError::UserId(segments[2].to_string()))?;

        let booking_id = Uuid::parse_str(segments[3])
            .map_err(|_| OrderIdError::BookingId(segments[3].to_string()))?;

        Ok(Self {
            timestamp_ms,
            user_id,
            booking_id,
        })
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{prefix}{d}{ts}{d}{user}{d}{booking}",
            prefix = ORDER_PREFIX,
            d = ORDER_DELIMITER,
            ts = self.timestamp_ms,
            user = self.user_id,
            booking = self.booking_id,
        )
    }
}
