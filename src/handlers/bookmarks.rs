//! # Bookmark Handlers

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::CurrentAccount;
use crate::error::ApiError;
use crate::handlers::types::{ApiJson, ApiPath, MessageResponse, rfc3339};
use crate::models::bookmark;
use crate::repositories::bookmark::BookmarkedListing;
use crate::server::AppState;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AddBookmarkRequest {
    pub listing_id: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookmarkView {
    pub id: i32,
    pub user_id: String,
    pub listing_id: i32,
    pub created_at: String,
}

impl From<bookmark::Model> for BookmarkView {
    fn from(model: bookmark::Model) -> Self {
        Self {
            created_at: rfc3339(&model.created_at),
            id: model.id,
            user_id: model.user_id,
            listing_id: model.listing_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookmarkResponse {
    pub success: bool,
    pub message: String,
    pub bookmark: BookmarkView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookmarksResponse {
    pub success: bool,
    pub bookmarks: Vec<BookmarkedListing>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookmarkCheckResponse {
    pub success: bool,
    pub is_bookmarked: bool,
}

/// The caller's bookmarked listings that are currently approved
#[utoipa::path(
    get,
    path = "/api/bookmarks",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Bookmarks", body = BookmarksResponse),
        (status = 401, description = "Missing or invalid credential", body = ApiError)
    ),
    tag = "bookmarks"
)]
pub async fn list_bookmarks(
    State(state): State<AppState>,
    account: CurrentAccount,
) -> Result<Json<BookmarksResponse>, ApiError> {
    let bookmarks = state
        .bookmarks()
        .list_with_details(account.user_id())
        .await?;
    Ok(Json(BookmarksResponse {
        success: true,
        count: bookmarks.len(),
        bookmarks,
    }))
}

#[utoipa::path(
    post,
    path = "/api/bookmarks",
    security(("bearer_auth" = [])),
    request_body = AddBookmarkRequest,
    responses(
        (status = 201, description = "Bookmark created", body = BookmarkResponse),
        (status = 400, description = "Already bookmarked", body = ApiError),
        (status = 404, description = "Listing not found", body = ApiError)
    ),
    tag = "bookmarks"
)]
pub async fn add_bookmark(
    State(state): State<AppState>,
    account: CurrentAccount,
    ApiJson(request): ApiJson<AddBookmarkRequest>,
) -> Result<(StatusCode, Json<BookmarkResponse>), ApiError> {
    let bookmark = state
        .bookmarks()
        .add(account.user_id(), request.listing_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(BookmarkResponse {
            success: true,
            message: "Service bookmarked".to_string(),
            bookmark: bookmark.into(),
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/bookmarks/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Bookmark id")),
    responses(
        (status = 200, description = "Bookmark removed", body = MessageResponse),
        (status = 403, description = "Not the bookmark owner", body = ApiError),
        (status = 404, description = "Bookmark not found", body = ApiError)
    ),
    tag = "bookmarks"
)]
pub async fn remove_bookmark(
    State(state): State<AppState>,
    account: CurrentAccount,
    ApiPath(bookmark_id): ApiPath<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .bookmarks()
        .remove(bookmark_id, account.user_id())
        .await?;
    Ok(Json(MessageResponse::new("Bookmark removed")))
}

#[utoipa::path(
    delete,
    path = "/api/bookmarks/listing/{listing_id}",
    security(("bearer_auth" = [])),
    params(("listing_id" = i32, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Bookmark removed", body = MessageResponse),
        (status = 404, description = "Bookmark not found", body = ApiError)
    ),
    tag = "bookmarks"
)]
pub async fn remove_bookmark_by_listing(
    State(state): State<AppState>,
    account: CurrentAccount,
    ApiPath(listing_id): ApiPath<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .bookmarks()
        .remove_by_listing(account.user_id(), listing_id)
        .await?;
    Ok(Json(MessageResponse::new("Bookmark removed")))
}

#[utoipa::path(
    get,
    path = "/api/bookmarks/check/{listing_id}",
    security(("bearer_auth" = [])),
    params(("listing_id" = i32, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Bookmark status", body = BookmarkCheckResponse)
    ),
    tag = "bookmarks"
)]
pub async fn check_bookmark(
    State(state): State<AppState>,
    account: CurrentAccount,
    ApiPath(listing_id): ApiPath<i32>,
) -> Result<Json<BookmarkCheckResponse>, ApiError> {
    let is_bookmarked = state
        .bookmarks()
        .is_bookmarked(account.user_id(), listing_id)
        .await?;
    Ok(Json(BookmarkCheckResponse {
        success: true,
        is_bookmarked,
    }))
}
