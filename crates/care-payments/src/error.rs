//! Error types for care-payments

use thiserror::Error;

/// care-payments error type
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rejected by gateway: {0}")]
    Rejected(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Invalid amount: {0} cents")]
    InvalidAmount(i64),
}

impl From<PaymentError> for care_core::Error {
    fn from(err: PaymentError) -> Self {
        care_core::Error::Payment(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;
