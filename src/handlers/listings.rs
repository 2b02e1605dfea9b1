//! # Listing Handlers
//!
//! Provider management of their own services, the public catalog, and admin
//! moderation.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{AdminAccount, ProviderAccount};
use crate::error::ApiError;
use crate::handlers::types::{ApiJson, ApiPath, ApiQuery, ListingView, MessageResponse};
use crate::models::ListingStatus;
use crate::repositories::listing::{ListingFilter, ListingPatch};
use crate::server::AppState;
use crate::services::catalog::{ListingDraft, Requester};

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct CreateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<i32>,
    pub image_url: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<CreateListingRequest> for ListingDraft {
    fn from(req: CreateListingRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            price: req.price,
            category_id: req.category_id,
            image_url: req.image_url,
            location: req.location,
            latitude: req.latitude,
            longitude: req.longitude,
        }
    }
}

/// Partial listing update; omitted fields are left unchanged
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<i32>,
    pub image_url: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Providers may only set `completed` on an approved listing
    pub status: Option<ListingStatus>,
}

impl UpdateListingRequest {
    fn into_parts(self) -> (ListingPatch, Option<ListingStatus>) {
        (
            ListingPatch {
                title: self.title,
                description: self.description,
                price: self.price,
                category_id: self.category_id,
                image_url: self.image_url,
                location: self.location,
                latitude: self.latitude,
                longitude: self.longitude,
            },
            self.status,
        )
    }
}

#[derive(Debug, Default, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct ListingQuery {
    pub status: Option<ListingStatus>,
    pub category_id: Option<i32>,
    pub provider_id: Option<i32>,
}

impl From<ListingQuery> for ListingFilter {
    fn from(query: ListingQuery) -> Self {
        Self {
            status: query.status,
            provider_id: query.provider_id,
            category_id: query.category_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListingResponse {
    pub success: bool,
    pub service: ListingView,
}

impl ListingResponse {
    fn new(model: crate::models::listing::Model) -> Json<Self> {
        Json(Self {
            success: true,
            service: model.into(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListingsResponse {
    pub success: bool,
    pub services: Vec<ListingView>,
    pub count: usize,
}

impl ListingsResponse {
    fn new(models: Vec<crate::models::listing::Model>) -> Json<Self> {
        let services: Vec<ListingView> = models.into_iter().map(ListingView::from).collect();
        Json(Self {
            success: true,
            count: services.len(),
            services,
        })
    }
}

/// Create a listing; it starts out pending
#[utoipa::path(
    post,
    path = "/api/provider/services",
    security(("bearer_auth" = [])),
    request_body = CreateListingRequest,
    responses(
        (status = 201, description = "Listing created", body = ListingResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Provider access required", body = ApiError)
    ),
    tag = "services"
)]
pub async fn create_listing(
    State(state): State<AppState>,
    provider: ProviderAccount,
    ApiJson(request): ApiJson<CreateListingRequest>,
) -> Result<(StatusCode, Json<ListingResponse>), ApiError> {
    let created = state
        .catalog()
        .create_listing(provider.provider.id, request.into())
        .await?;
    Ok((StatusCode::CREATED, ListingResponse::new(created)))
}

/// The caller's own listings, newest first
#[utoipa::path(
    get,
    path = "/api/provider/services",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own listings", body = ListingsResponse),
        (status = 403, description = "Provider access required", body = ApiError)
    ),
    tag = "services"
)]
pub async fn list_own_listings(
    State(state): State<AppState>,
    provider: ProviderAccount,
) -> Result<Json<ListingsResponse>, ApiError> {
    let listings = state
        .catalog()
        .list_for_provider(provider.provider.id)
        .await?;
    Ok(ListingsResponse::new(listings))
}

#[utoipa::path(
    get,
    path = "/api/provider/services/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Listing", body = ListingResponse),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Listing not found", body = ApiError)
    ),
    tag = "services"
)]
pub async fn get_own_listing(
    State(state): State<AppState>,
    provider: ProviderAccount,
    ApiPath(listing_id): ApiPath<i32>,
) -> Result<Json<ListingResponse>, ApiError> {
    let listing = state
        .catalog()
        .get_owned(listing_id, &Requester::provider(provider.provider.id))
        .await?;
    Ok(ListingResponse::new(listing))
}

#[utoipa::path(
    put,
    path = "/api/provider/services/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Listing id")),
    request_body = UpdateListingRequest,
    responses(
        (status = 200, description = "Listing updated", body = ListingResponse),
        (status = 400, description = "Validation error or invalid transition", body = ApiError),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Listing not found", body = ApiError)
    ),
    tag = "services"
)]
pub async fn update_own_listing(
    State(state): State<AppState>,
    provider: ProviderAccount,
    ApiPath(listing_id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateListingRequest>,
) -> Result<Json<ListingResponse>, ApiError> {
    let (patch, status) = request.into_parts();
    let updated = state
        .catalog()
        .update_listing(
            listing_id,
            &Requester::provider(provider.provider.id),
            patch,
            status,
        )
        .await?;
    Ok(ListingResponse::new(updated))
}

#[utoipa::path(
    delete,
    path = "/api/provider/services/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Listing deleted", body = MessageResponse),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Listing not found", body = ApiError)
    ),
    tag = "services"
)]
pub async fn delete_own_listing(
    State(state): State<AppState>,
    provider: ProviderAccount,
    ApiPath(listing_id): ApiPath<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .catalog()
        .delete_listing(listing_id, &Requester::provider(provider.provider.id))
        .await?;
    Ok(Json(MessageResponse::new("Service deleted")))
}

/// Public catalog. Defaults to approved listings.
#[utoipa::path(
    get,
    path = "/api/services",
    params(ListingQuery),
    responses(
        (status = 200, description = "Listings", body = ListingsResponse),
        (status = 400, description = "Status not publicly visible", body = ApiError)
    ),
    tag = "services"
)]
pub async fn list_public_listings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListingQuery>,
) -> Result<Json<ListingsResponse>, ApiError> {
    let listings = state.catalog().list_public(query.into()).await?;
    Ok(ListingsResponse::new(listings))
}

#[utoipa::path(
    get,
    path = "/api/services/{id}",
    params(("id" = i32, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Listing", body = ListingResponse),
        (status = 404, description = "Listing not found", body = ApiError)
    ),
    tag = "services"
)]
pub async fn get_listing(
    State(state): State<AppState>,
    ApiPath(listing_id): ApiPath<i32>,
) -> Result<Json<ListingResponse>, ApiError> {
    let listing = state.catalog().get_listing(listing_id).await?;
    Ok(ListingResponse::new(listing))
}

/// Every listing regardless of status
#[utoipa::path(
    get,
    path = "/api/admin/services",
    security(("bearer_auth" = [])),
    params(ListingQuery),
    responses(
        (status = 200, description = "Listings", body = ListingsResponse),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    tag = "services"
)]
pub async fn admin_list_listings(
    State(state): State<AppState>,
    _admin: AdminAccount,
    ApiQuery(query): ApiQuery<ListingQuery>,
) -> Result<Json<ListingsResponse>, ApiError> {
    let listings = state.catalog().list_all(query.into()).await?;
    Ok(ListingsResponse::new(listings))
}

#[utoipa::path(
    put,
    path = "/api/admin/services/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Listing id")),
    request_body = UpdateListingRequest,
    responses(
        (status = 200, description = "Listing updated", body = ListingResponse),
        (status = 400, description = "Validation error or invalid transition", body = ApiError),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Listing not found", body = ApiError)
    ),
    tag = "services"
)]
pub async fn admin_update_listing(
    State(state): State<AppState>,
    admin: AdminAccount,
    ApiPath(listing_id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateListingRequest>,
) -> Result<Json<ListingResponse>, ApiError> {
    let (patch, status) = request.into_parts();
    let updated = state
        .catalog()
        .update_listing(listing_id, &Requester::from(&admin.0), patch, status)
        .await?;
    Ok(ListingResponse::new(updated))
}

#[utoipa::path(
    post,
    path = "/api/admin/services/{id}/approve",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Listing approved", body = ListingResponse),
        (status = 400, description = "Listing is not pending", body = ApiError),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Listing not found", body = ApiError)
    ),
    tag = "services"
)]
pub async fn admin_approve_listing(
    State(state): State<AppState>,
    admin: AdminAccount,
    ApiPath(listing_id): ApiPath<i32>,
) -> Result<Json<ListingResponse>, ApiError> {
    let updated = state
        .catalog()
        .moderate(listing_id, &Requester::from(&admin.0), ListingStatus::Approved)
        .await?;
    Ok(ListingResponse::new(updated))
}

#[utoipa::path(
    post,
    path = "/api/admin/services/{id}/reject",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Listing rejected", body = ListingResponse),
        (status = 400, description = "Listing is not pending", body = ApiError),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Listing not found", body = ApiError)
    ),
    tag = "services"
)]
pub async fn admin_reject_listing(
    State(state): State<AppState>,
    admin: AdminAccount,
    ApiPath(listing_id): ApiPath<i32>,
) -> Result<Json<ListingResponse>, ApiError> {
    let updated = state
        .catalog()
        .moderate(listing_id, &Requester::from(&admin.0), ListingStatus::Rejected)
        .await?;
    Ok(ListingResponse::new(updated))
}

#[utoipa::path(
    delete,
    path = "/api/admin/services/{id}",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Listing id")),
    responses(
        (status = 200, description = "Listing deleted", body = MessageResponse),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "Listing not found", body = ApiError)
    ),
    tag = "services"
)]
pub async fn admin_delete_listing(
    State(state): State<AppState>,
    admin: AdminAccount,
    ApiPath(listing_id): ApiPath<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .catalog()
        .delete_listing(listing_id, &Requester::from(&admin.0))
        .await?;
    Ok(Json(MessageResponse::new("Service deleted")))
}
