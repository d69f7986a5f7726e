//! HTTP API handlers
//!
//! Thin adapters from HTTP to [`care_core::Marketplace`] operations.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use care_core::{
    Availability, BookingStatus, CaregiverCard, EarningsSummary, Error as CoreError, HireRequest,
    NewHireRequest, NewUser, Notification, ProfileUpdate, Rating, RatingSummary, SearchQuery,
    TimeSlot, User,
};

use crate::error::Result;
use crate::extract::{Json, Query};
use crate::middleware::ActingUser;
use crate::server::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct RequestsQuery {
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatingBody {
    pub stars: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatingsResponse {
    pub summary: RatingSummary,
    pub ratings: Vec<Rating>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub caregiver_id: String,
    pub favorite: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub unread_count: usize,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct MarkedResponse {
    pub marked: usize,
}

fn require_self(actor: &ActingUser, id: &str) -> Result<()> {
    if actor.0 == id {
        Ok(())
    } else {
        Err(CoreError::Forbidden("cannot act on another user's account".to_string()).into())
    }
}

// ============================================================================
// Handler functions
// ============================================================================

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

pub async fn register_user(
    State(state): State<AppState>,
    Json(input): Json<NewUser>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.marketplace.register_user(input)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<User>> {
    Ok(Json(state.marketplace.get_user(&id)?))
}

pub async fn update_user(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    require_self(&actor, &id)?;
    Ok(Json(state.marketplace.update_profile(&id, update)?))
}

pub async fn set_availability(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<String>,
    Json(availability): Json<Availability>,
) -> Result<Json<User>> {
    require_self(&actor, &id)?;
    Ok(Json(state.marketplace.set_availability(&id, availability)?))
}

pub async fn caregiver_slots(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Vec<TimeSlot>>> {
    Ok(Json(state.marketplace.available_slots(&id, query.date)?))
}

pub async fn caregiver_ratings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RatingsResponse>> {
    Ok(Json(RatingsResponse {
        summary: state.marketplace.rating_summary(&id)?,
        ratings: state.marketplace.list_ratings(&id)?,
    }))
}

pub async fn caregiver_earnings(
    State(state): State<AppState>,
    actor: ActingUser,
    Path(id): Path<String>,
) -> Result<Json<EarningsSummary>> {
    require_self(&actor, &id)?;
    Ok(Json(state.marketplace.earnings(&id)?))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<CaregiverCard>>> {
    debug!("Search: {:?}", query);
    Ok(Json(state.marketplace.search_caregivers(&query)?))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.marketplace.list_favorites(&user_id)?))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(caregiver_id): Path<String>,
) -> Result<Json<FavoriteResponse>> {
    let favorite = state.marketplace.toggle_favorite(&user_id, &caregiver_id)?;
    Ok(Json(FavoriteResponse {
        caregiver_id,
        favorite,
    }))
}

pub async fn create_request(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(input): Json<NewHireRequest>,
) -> Result<(StatusCode, Json<HireRequest>)> {
    let request = state.marketplace.request_booking(&user_id, input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_requests(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Query(query): Query<RequestsQuery>,
) -> Result<Json<Vec<HireRequest>>> {
    Ok(Json(state.marketplace.list_requests(&user_id, query.status)?))
}

pub async fn get_request(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
) -> Result<Json<HireRequest>> {
    Ok(Json(state.marketplace.get_request(&user_id, &id)?))
}

pub async fn accept_request(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
) -> Result<Json<HireRequest>> {
    Ok(Json(state.marketplace.accept(&user_id, &id).await?))
}

pub async fn reject_request(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
) -> Result<Json<HireRequest>> {
    Ok(Json(state.marketplace.reject(&user_id, &id).await?))
}

/// The body is optional: `{"reason": "..."}`
pub async fn cancel_request(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<HireRequest>> {
    let body = if body.is_empty() {
        CancelBody::default()
    } else {
        serde_json::from_slice::<CancelBody>(&body)?
    };
    Ok(Json(state.marketplace.cancel(&user_id, &id, body.reason).await?))
}

pub async fn pay_request(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
) -> Result<Json<HireRequest>> {
    Ok(Json(state.marketplace.pay(&user_id, &id).await?))
}

pub async fn complete_request(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
) -> Result<Json<HireRequest>> {
    Ok(Json(state.marketplace.complete(&user_id, &id).await?))
}

pub async fn rate_request(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
    Json(body): Json<RatingBody>,
) -> Result<(StatusCode, Json<Rating>)> {
    let rating = state
        .marketplace
        .rate(&user_id, &id, body.stars, body.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(rating)))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<NotificationsResponse>> {
    Ok(Json(NotificationsResponse {
        unread_count: state.marketplace.unread_count(&user_id)?,
        notifications: state.marketplace.list_notifications(&user_id, query.unread)?,
    }))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.marketplace.mark_read(&user_id, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<Json<MarkedResponse>> {
    let marked = state.marketplace.mark_all_read(&user_id)?;
    Ok(Json(MarkedResponse { marked }))
}

