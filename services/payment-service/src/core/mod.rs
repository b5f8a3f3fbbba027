// /consult-payments/services/payment-service/src/core/mod.rs

pub mod order_id;
pub mod verifier;
pub mod gateway;
pub mod initiator;
pub mod reconciler;
pub mod poller;
pub mod resolver;

// Re-export untuk kemudahan akses
pub mod services {
    pub use super::gateway::{GatewayClient, PaymentGateway};
    pub use super::initiator::PaymentInitiator;
    pub use super::reconciler::CallbackReconciler;
    pub use super::poller::StatusPoller;
    pub use super::resolver::FailureResolver;
    pub use super::verifier::AmountVerifier;
}
