//! Error types for care-api

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use care_core::Error as CoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication failed")]
    AuthFailed,

    #[error("Missing x-user-id header")]
    MissingUser,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AuthFailed | ApiError::MissingUser => StatusCode::UNAUTHORIZED,
            ApiError::InvalidRequest(_) | ApiError::Json(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(e) => match e {
                CoreError::Validation(_) | CoreError::Json(_) => StatusCode::BAD_REQUEST,
                CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                CoreError::UserNotFound(_)
                | CoreError::RequestNotFound(_)
                | CoreError::NotificationNotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Conflict(_)
                | CoreError::SlotUnavailable(_)
                | CoreError::AlreadyRated(_)
                | CoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
                CoreError::Payment(_) => StatusCode::BAD_GATEWAY,
                CoreError::Database(_)
                | CoreError::Io(_)
                | CoreError::Config(_)
                | CoreError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            "internal error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use care_core::BookingStatus;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (CoreError::RequestNotFound("x".into()), StatusCode::NOT_FOUND),
            (CoreError::SlotUnavailable("x".into()), StatusCode::CONFLICT),
            (CoreError::AlreadyRated("x".into()), StatusCode::CONFLICT),
            (
                CoreError::InvalidTransition {
                    from: BookingStatus::Completed,
                    to: BookingStatus::Pending,
                },
                StatusCode::CONFLICT,
            ),
            (CoreError::Payment("x".into()), StatusCode::BAD_GATEWAY),
            (CoreError::Other("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(ApiError::MissingUser.status(), StatusCode::UNAUTHORIZED);
    }
}
