// /consult-payments/services/payment-service/src/middleware/mod.rs

pub mod auth;
pub mod security;
