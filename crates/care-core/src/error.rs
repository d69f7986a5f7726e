//! Error types for care-core

use thiserror::Error;

use crate::booking::BookingStatus;

/// Main error type for care-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Hire request not found: {0}")]
    RequestNotFound(String),

    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("Appointment already rated: {0}")]
    AlreadyRated(String),

    #[error("Payment error: {0}")]
    Payment(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the underlying SQLite failure is a constraint violation
    pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Result type alias for care-core
pub type Result<T> = std::result::Result<T, Error>;
