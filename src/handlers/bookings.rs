//! # Booking Handlers

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::CurrentAccount;
use crate::error::ApiError;
use crate::handlers::types::{ApiJson, ApiPath, ApiQuery, BookingView, MessageResponse};
use crate::models::{BookingStatus, Role};
use crate::repositories::booking::BookingDetail;
use crate::server::AppState;
use crate::services::booking::BookingPerspective;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateBookingRequest {
    pub listing_id: Option<i32>,
    /// RFC 3339 timestamp strictly in the future
    #[schema(example = "2030-01-15T10:00:00+08:00")]
    pub booking_date: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookingSide {
    Customer,
    Provider,
}

#[derive(Debug, Default, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
    /// Defaults to the caller's role
    #[serde(rename = "as", alias = "role")]
    pub side: Option<BookingSide>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    pub success: bool,
    pub booking: BookingView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingsResponse {
    pub success: bool,
    pub bookings: Vec<BookingView>,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingDetailResponse {
    pub success: bool,
    pub booking: BookingDetail,
}

/// Book an approved listing
#[utoipa::path(
    post,
    path = "/api/bookings",
    security(("bearer_auth" = [])),
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = BookingResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Missing or invalid credential", body = ApiError),
        (status = 404, description = "Listing missing or not approved", body = ApiError)
    ),
    tag = "bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    account: CurrentAccount,
    ApiJson(request): ApiJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let booking = state
        .bookings()
        .create_booking(
            account.user_id(),
            request.listing_id,
            request.booking_date.as_deref(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            success: true,
            booking: booking.into(),
        }),
    ))
}

/// Bookings made by the caller, or made against the caller's listings
#[utoipa::path(
    get,
    path = "/api/bookings",
    security(("bearer_auth" = [])),
    params(BookingListQuery),
    responses(
        (status = 200, description = "Bookings", body = BookingsResponse),
        (status = 403, description = "Provider view without a provider profile", body = ApiError)
    ),
    tag = "bookings"
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    account: CurrentAccount,
    ApiQuery(query): ApiQuery<BookingListQuery>,
) -> Result<Json<BookingsResponse>, ApiError> {
    let perspective = match query.side {
        Some(BookingSide::Provider) => BookingPerspective::Provider,
        Some(BookingSide::Customer) => BookingPerspective::Customer,
        None if account.0.user.role == Role::Provider => BookingPerspective::Provider,
        None => BookingPerspective::Customer,
    };
    let bookings = state
        .bookings()
        .list_bookings(account.user_id(), perspective, query.status)
        .await?;
    let bookings: Vec<BookingView> = bookings.into_iter().map(BookingView::from).collect();
    Ok(Json(BookingsResponse {
        success: true,
        count: bookings.len(),
        bookings,
    }))
}

#[utoipa::path(
    get,
    path = "/api/bookings/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking details", body = BookingDetailResponse),
        (status = 403, description = "Neither customer nor provider", body = ApiError),
        (status = 404, description = "Booking not found", body = ApiError)
    ),
    tag = "bookings"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    account: CurrentAccount,
    ApiPath(booking_id): ApiPath<i32>,
) -> Result<Json<BookingDetailResponse>, ApiError> {
    let booking = state
        .bookings()
        .get_booking_details(booking_id, account.user_id())
        .await?;
    Ok(Json(BookingDetailResponse {
        success: true,
        booking,
    }))
}

/// Move a booking to a new status
#[utoipa::path(
    put,
    path = "/api/bookings/{id}/status",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Booking id")),
    request_body = UpdateBookingStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = BookingResponse),
        (status = 400, description = "Invalid status transition", body = ApiError),
        (status = 403, description = "Neither customer nor provider", body = ApiError),
        (status = 404, description = "Booking not found", body = ApiError)
    ),
    tag = "bookings"
)]
pub async fn update_booking_status(
    State(state): State<AppState>,
    account: CurrentAccount,
    ApiPath(booking_id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateBookingStatusRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state
        .bookings()
        .update_status(booking_id, account.user_id(), request.status)
        .await?;
    Ok(Json(BookingResponse {
        success: true,
        booking: booking.into(),
    }))
}

/// Delete a pending booking
#[utoipa::path(
    delete,
    path = "/api/bookings/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking deleted", body = MessageResponse),
        (status = 400, description = "Booking is not pending", body = ApiError),
        (status = 403, description = "Not the booking's customer", body = ApiError),
        (status = 404, description = "Booking not found", body = ApiError)
    ),
    tag = "bookings"
)]
pub async fn delete_booking(
    State(state): State<AppState>,
    account: CurrentAccount,
    ApiPath(booking_id): ApiPath<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .bookings()
        .delete_booking(booking_id, account.user_id())
        .await?;
    Ok(Json(MessageResponse::new("Booking deleted")))
}
