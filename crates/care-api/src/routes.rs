//! Route definitions
//!
//! Defines all authenticated HTTP API endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers;
use crate::server::AppState;

/// Create the API router
pub fn routes() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/api/users", post(handlers::register_user))
        .route(
            "/api/users/{id}",
            get(handlers::get_user).patch(handlers::update_user),
        )
        // Caregivers
        .route(
            "/api/caregivers/{id}/availability",
            put(handlers::set_availability),
        )
        .route("/api/caregivers/{id}/slots", get(handlers::caregiver_slots))
        .route("/api/caregivers/{id}/ratings", get(handlers::caregiver_ratings))
        .route("/api/caregivers/{id}/earnings", get(handlers::caregiver_earnings))
        .route("/api/search", get(handlers::search))
        // Favorites
        .route("/api/favorites", get(handlers::list_favorites))
        .route("/api/favorites/{caregiver_id}", post(handlers::toggle_favorite))
        // Hire requests
        .route(
            "/api/requests",
            post(handlers::create_request).get(handlers::list_requests),
        )
        .route("/api/requests/{id}", get(handlers::get_request))
        .route("/api/requests/{id}/accept", post(handlers::accept_request))
        .route("/api/requests/{id}/reject", post(handlers::reject_request))
        .route("/api/requests/{id}/cancel", post(handlers::cancel_request))
        .route("/api/requests/{id}/pay", post(handlers::pay_request))
        .route("/api/requests/{id}/complete", post(handlers::complete_request))
        .route("/api/requests/{id}/rating", post(handlers::rate_request))
        // Notifications
        .route("/api/notifications", get(handlers::list_notifications))
        .route(
            "/api/notifications/read-all",
            post(handlers::mark_all_notifications_read),
        )
        .route(
            "/api/notifications/{id}/read",
            post(handlers::mark_notification_read),
        )
}
