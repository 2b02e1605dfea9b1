//! # Review Handlers

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{AdminAccount, CurrentAccount};
use crate::error::ApiError;
use crate::handlers::types::{ApiJson, ApiPath, MessageResponse, ReviewView};
use crate::repositories::review::{RatingAverage, ReviewPatch, ReviewWithReviewer};
use crate::server::AppState;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AddReviewRequest {
    pub booking_id: Option<i32>,
    /// 1 to 5
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateReviewRequest {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    pub success: bool,
    pub review: ReviewView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListingReviewsResponse {
    pub success: bool,
    pub reviews: Vec<ReviewWithReviewer>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewsResponse {
    pub success: bool,
    pub reviews: Vec<ReviewView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AveragesResponse {
    pub success: bool,
    pub averages: Vec<RatingAverage>,
}

/// Reviews of a listing, newest first
#[utoipa::path(
    get,
    path = "/api/services/{id}/reviews",
    params(("id" = i32, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Reviews", body = ListingReviewsResponse)
    ),
    tag = "reviews"
)]
pub async fn list_listing_reviews(
    State(state): State<AppState>,
    ApiPath(listing_id): ApiPath<i32>,
) -> Result<Json<ListingReviewsResponse>, ApiError> {
    let reviews = state.reviews().list_for_listing(listing_id).await?;
    Ok(Json(ListingReviewsResponse {
        success: true,
        reviews,
    }))
}

/// Review a listing through one of the caller's bookings
#[utoipa::path(
    post,
    path = "/api/services/{id}/reviews",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Listing id")),
    request_body = AddReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 400, description = "Validation error or duplicate review", body = ApiError),
        (status = 401, description = "Missing or invalid credential", body = ApiError)
    ),
    tag = "reviews"
)]
pub async fn add_review(
    State(state): State<AppState>,
    account: CurrentAccount,
    ApiPath(listing_id): ApiPath<i32>,
    ApiJson(request): ApiJson<AddReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError> {
    let review = state
        .reviews()
        .add_review(
            account.user_id(),
            listing_id,
            request.booking_id,
            request.rating,
            request.comment,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse {
            success: true,
            review: review.into(),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Review id")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = ReviewResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Review not found", body = ApiError)
    ),
    tag = "reviews"
)]
pub async fn update_review(
    State(state): State<AppState>,
    _admin: AdminAccount,
    ApiPath(review_id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateReviewRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let review = state
        .reviews()
        .update_review(
            review_id,
            ReviewPatch {
                rating: request.rating,
                comment: request.comment,
            },
        )
        .await?;
    Ok(Json(ReviewResponse {
        success: true,
        review: review.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review deleted", body = MessageResponse),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Review not found", body = ApiError)
    ),
    tag = "reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    _admin: AdminAccount,
    ApiPath(review_id): ApiPath<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.reviews().delete_review(review_id).await?;
    Ok(Json(MessageResponse::new("Review deleted")))
}

/// Average rating per listing, rounded to one decimal
#[utoipa::path(
    get,
    path = "/api/reviews/averages",
    responses(
        (status = 200, description = "Averages", body = AveragesResponse)
    ),
    tag = "reviews"
)]
pub async fn average_ratings(
    State(state): State<AppState>,
) -> Result<Json<AveragesResponse>, ApiError> {
    let averages = state.reviews().average_ratings().await?;
    Ok(Json(AveragesResponse {
        success: true,
        averages,
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/reviews",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All reviews", body = ReviewsResponse),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    tag = "reviews"
)]
pub async fn admin_list_reviews(
    State(state): State<AppState>,
    _admin: AdminAccount,
) -> Result<Json<ReviewsResponse>, ApiError> {
    let reviews = state.reviews().list_all().await?;
    Ok(Json(ReviewsResponse {
        success: true,
        reviews: reviews.into_iter().map(ReviewView::from).collect(),
    }))
}
