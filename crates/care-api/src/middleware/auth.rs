//! Authentication middleware
//!
//! Requests carry the platform API key as a bearer token, and name the user
//! they act for in the `x-user-id` header.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::ApiError;
use crate::server::AppState;

pub const USER_HEADER: &str = "x-user-id";

/// API key authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if !validate_api_key(provided, state.config.api.key.as_deref()) {
        debug!("Rejected request to {}", request.uri().path());
        return Err(ApiError::AuthFailed);
    }
    Ok(next.run(request).await)
}

/// Simple API key validation. No configured key means open access.
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> bool {
    match (provided, expected) {
        (Some(p), Some(e)) => p == e,
        (_, None) => true,
        (None, Some(_)) => false,
    }
}

/// The user a request acts for
#[derive(Debug, Clone)]
pub struct ActingUser(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| ActingUser(id.to_string()))
            .ok_or(ApiError::MissingUser)
    }
}
