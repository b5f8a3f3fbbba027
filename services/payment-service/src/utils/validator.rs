// /consult-payments/services/payment-service/src/utils/validator.rs

use uuid::Uuid;
use chrono::{NaiveDate, NaiveTime};
use crate::utils::error::{AppError, AppResult};

/// Validasi UUID format
pub fn validate_uuid(uuid_str: &str, field_name: &str) -> AppResult<Uuid> {
    Uuid::parse_str(uuid_str.trim())
        .map_err(|_| AppError::BadRequest(format!("Format {} tidak valid", field_name)))
}

/// Jam konsultasi dalam format HH:MM (detik opsional)
pub fn validate_booking_time(raw: &str) -> AppResult<NaiveTime> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| AppError::ValidationError(format!("Booking time '{}' harus HH:MM", raw)))
}

/// Tanggal booking tidak boleh di masa lalu
pub fn validate_booking_date(date: NaiveDate, today: NaiveDate) -> AppResult<NaiveDate> {
    if date < today {
        return Err(AppError::ValidationError(
            "Booking date tidak boleh di masa lalu".to_string(),
        ));
    }
    Ok(date)
}

/// Validasi order id mentah sebelum masuk pipeline
pub fn validate_order_id_length(order_id: &str) -> AppResult<()> {
    if order_id.trim().is_empty() {
        return Err(AppError::BadRequest("Order ID tidak boleh kosong".to_string()));
    }

    if order_id.len() > 128 {
        return Err(AppError::BadRequest("Order ID terlalu panjang".to_string()));
    }

    Ok(())
}
