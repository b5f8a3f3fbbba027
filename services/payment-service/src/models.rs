// /consult-payments/services/payment-service/src/models.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use validator::Validate;
use bigdecimal::BigDecimal;
use std::fmt;
use std::str::FromStr;

// ========================= DOMAIN MODELS =========================

/// Booking record, satu-satunya entity yang dimutasi oleh payment pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expert_id: Uuid,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
    pub amount: BigDecimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_mode: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub amount_hash: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_pending(&self) -> bool {
        self.payment_status == PaymentStatus::Pending
    }
}

/// Data untuk insert booking baru (selalu pending)
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expert_id: Uuid,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
    pub amount: BigDecimal,
    pub amount_hash: String,
}

/// Conditional transition keluar dari `pending`.
/// Store hanya boleh menerapkan ini jika payment_status saat ini masih pending.
#[derive(Debug, Clone)]
pub struct PaymentTransition {
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub transaction_id: Option<String>,
    pub payment_mode: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl PaymentTransition {
    pub fn completed(transaction_id: String, payment_mode: Option<String>) -> Self {
        Self {
            payment_status: PaymentStatus::Completed,
            status: BookingStatus::Confirmed,
            transaction_id: Some(transaction_id),
            payment_mode,
            payment_time: Some(Utc::now()),
            note: None,
        }
    }

    pub fn failed(transaction_id: Option<String>, note: String) -> Self {
        Self {
            payment_status: PaymentStatus::Failed,
            status: BookingStatus::Cancelled,
            transaction_id,
            payment_mode: None,
            payment_time: None,
            note: Some(note),
        }
    }

    pub fn fraud_attempt(note: String) -> Self {
        Self {
            payment_status: PaymentStatus::FraudAttempt,
            status: BookingStatus::FraudAttempt,
            transaction_id: None,
            payment_mode: None,
            payment_time: None,
            note: Some(note),
        }
    }

    pub fn rejected(note: String) -> Self {
        Self {
            payment_status: PaymentStatus::Rejected,
            status: BookingStatus::Cancelled,
            transaction_id: None,
            payment_mode: None,
            payment_time: None,
            note: Some(note),
        }
    }

    /// Nama action untuk audit_logs
    pub fn audit_action(&self) -> &'static str {
        match self.payment_status {
            PaymentStatus::Completed => "PAYMENT_COMPLETED",
            PaymentStatus::Failed => "PAYMENT_FAILED",
            PaymentStatus::FraudAttempt => "PAYMENT_FRAUD_ATTEMPT",
            PaymentStatus::Rejected => "PAYMENT_REJECTED",
            PaymentStatus::Pending => "PAYMENT_PENDING",
        }
    }
}

/// Authenticated identity dari JWT
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub phone: Option<String>,
}

/// JWT claims yang di-issue identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub iss: Option<String>,
}

// ========================= ENUMS =========================

/// Payment status booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    FraudAttempt,
    Rejected,
}

impl PaymentStatus {
    /// Convert ke string untuk database
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::FraudAttempt => "fraud_attempt",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "fraud_attempt" => Ok(PaymentStatus::FraudAttempt),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(format!("unknown payment_status '{}'", other)),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking status (sisi jadwal konsultasi)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    FraudAttempt,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::FraudAttempt => "fraud_attempt",
            BookingStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "fraud_attempt" => Ok(BookingStatus::FraudAttempt),
            "rejected" => Ok(BookingStatus::Rejected),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

/// Status order yang dilaporkan gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    /// Charge berhasil, satu-satunya status yang boleh menyelesaikan booking
    Charged,
    /// Belum terminal, booking dibiarkan pending
    InProgress(String),
    /// Semua status lain diperlakukan sebagai gagal
    Declined(String),
}

impl GatewayStatus {
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "CHARGED" | "SUCCESS" | "COMPLETED" => GatewayStatus::Charged,
            "PENDING" | "PENDING_VBV" | "AUTHORIZING" | "STARTED" => GatewayStatus::InProgress(normalized),
            _ => GatewayStatus::Declined(normalized),
        }
    }
}

// ========================= REQUEST DTOs =========================

/// Request untuk membuat payment session. Tidak ada field amount:
/// harga selalu dibaca ulang dari data expert di server.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, message = "Expert ID diperlukan"))]
    pub expert_id: String,

    pub booking_date: NaiveDate,

    #[validate(length(min = 4, max = 8, message = "Booking time harus HH:MM"))]
    pub booking_time: String,
}

/// Input Initiator setelah validasi boundary
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub expert_id: Uuid,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
}

/// Callback gateway yang sudah diparse ke bentuk typed
#[derive(Debug, Clone)]
pub struct GatewayCallback {
    pub source: CallbackSource,
    pub order_id: String,
    pub status: String,
    pub amount: Option<BigDecimal>,
    pub transaction_id: Option<String>,
    pub payment_mode: Option<String>,
    pub amount_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackSource {
    Webhook,
    Redirect,
}

// ========================= RESPONSE DTOs =========================

/// Payment session yang dikembalikan ke frontend
#[derive(Debug, Serialize)]
pub struct PaymentSession {
    pub order_id: String,
    pub booking_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub payment_url: Option<String>,
    pub sdk_token: Option<String>,
}

/// Response wrapper untuk payment session
#[derive(Debug, Serialize)]
pub struct PaymentSessionResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<PaymentSession>,
}

/// Hasil status poll
#[derive(Debug, Serialize, PartialEq)]
pub struct PollResult {
    pub order_id: String,
    pub status: String,
    pub verified_amount: Option<BigDecimal>,
}

/// Ringkasan booking untuk halaman success/failure
#[derive(Debug, Serialize)]
pub struct BookingReceipt {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub amount: BigDecimal,
    pub payment_mode: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
}

impl From<&Booking> for BookingReceipt {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            status: booking.status,
            payment_status: booking.payment_status,
            transaction_id: booking.transaction_id.clone(),
            amount: booking.amount.clone(),
            payment_mode: booking.payment_mode.clone(),
            payment_time: booking.payment_time,
            booking_date: booking.booking_date,
            booking_time: booking.booking_time,
        }
    }
}

/// Standard error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    pub details: Option<serde_json::Value>,
}

// ========================= PAYMENT GATEWAY DTOs =========================

/// Request ke endpoint session gateway
#[derive(Debug, Serialize)]
pub struct GatewaySessionRequest {
    pub order_id: String,
    /// Selalu string dengan dua desimal, contoh "1500.00"
    pub amount: String,
    pub currency: String,
    pub customer_id: String,
    pub customer_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    pub payment_page_client_id: String,
    pub action: String,
    pub return_url: String,
    pub description: String,
    pub payment_filter: PaymentFilter,
    pub metadata: SessionMetadata,
    /// Booking id, dikembalikan gateway di status API
    pub udf1: String,
    /// Amount hash, dikembalikan gateway di status API dan webhook
    pub udf2: String,
}

/// Allow-list metode pembayaran
#[derive(Debug, Serialize)]
pub struct PaymentFilter {
    #[serde(rename = "allowDefaultOptions")]
    pub allow_default_options: bool,
    pub options: Vec<PaymentFilterOption>,
}

#[derive(Debug, Serialize)]
pub struct PaymentFilterOption {
    #[serde(rename = "paymentMethodType")]
    pub payment_method_type: String,
    pub enable: bool,
}

/// Metadata session (expiry dan konteks booking)
#[derive(Debug, Serialize)]
pub struct SessionMetadata {
    #[serde(rename = "expiryInMins")]
    pub expiry_in_mins: String,
    pub booking_id: String,
    pub expert_id: String,
    pub booking_date: String,
    pub booking_time: String,
}

/// Response dari endpoint session gateway
#[derive(Debug, Deserialize)]
pub struct GatewaySessionResponse {
    pub status: Option<String>,
    pub id: Option<String>,
    pub order_id: Option<String>,
    pub payment_links: Option<PaymentLinks>,
    pub sdk_payload: Option<SdkPayload>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentLinks {
    pub web: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SdkPayload {
    pub payload: Option<SdkPayloadBody>,
}

#[derive(Debug, Deserialize)]
pub struct SdkPayloadBody {
    #[serde(rename = "clientAuthToken")]
    pub client_auth_token: Option<String>,
}

/// Session yang sudah divalidasi: minimal salah satu dari url/token ada
#[derive(Debug, Clone)]
pub struct GatewaySession {
    pub gateway_order_ref: Option<String>,
    pub payment_url: Option<String>,
    pub sdk_token: Option<String>,
}

/// Response dari order status API gateway
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrderStatus {
    pub order_id: String,
    pub status: String,
    pub amount: BigDecimal,
    pub currency: Option<String>,
    pub txn_id: Option<String>,
    pub payment_method_type: Option<String>,
    pub payment_method: Option<String>,
    /// Amount hash yang dikirim saat session dibuat
    pub udf2: Option<String>,
    pub txn_detail: Option<TxnDetail>,
}

/// Detail instrument pembayaran
#[derive(Debug, Clone, Deserialize)]
pub struct TxnDetail {
    pub txn_id: Option<String>,
    pub status: Option<String>,
    pub gateway: Option<String>,
    pub txn_amount: Option<BigDecimal>,
}

impl GatewayOrderStatus {
    /// Reference transaksi paling spesifik yang tersedia
    pub fn transaction_reference(&self) -> Option<String> {
        self.txn_id
            .clone()
            .or_else(|| self.txn_detail.as_ref().and_then(|d| d.txn_id.clone()))
    }
}
