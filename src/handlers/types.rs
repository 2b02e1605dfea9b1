//! # Common API Types
//!
//! Request extractors that turn axum rejections into the JSON error envelope,
//! and the response views shared by several handler modules.

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::{BookingStatus, ListingStatus, Role, booking, listing, provider, review, user};

/// JSON body extractor with [`ApiError`] rejections
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Query string extractor with [`ApiError`] rejections
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Path parameter extractor with [`ApiError`] rejections
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// RFC 3339 rendering used for every timestamp in responses
pub fn rfc3339(value: &DateTimeWithTimeZone) -> String {
    value.to_rfc3339()
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProviderView {
    pub id: i32,
    pub business_name: String,
    pub description: String,
    pub approved: bool,
}

impl From<provider::Model> for ProviderView {
    fn from(model: provider::Model) -> Self {
        Self {
            id: model.id,
            business_name: model.business_name,
            description: model.description,
            approved: model.approved,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: String,
    /// Present for provider accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderView>,
}

impl UserView {
    pub fn new(user: user::Model, provider: Option<provider::Model>) -> Self {
        Self {
            created_at: rfc3339(&user.created_at),
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            phone: user.phone,
            role: user.role,
            provider: provider.map(ProviderView::from),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListingView {
    pub id: i32,
    pub provider_id: i32,
    pub category_id: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub status: ListingStatus,
    pub image_url: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: String,
}

impl From<listing::Model> for ListingView {
    fn from(model: listing::Model) -> Self {
        Self {
            created_at: rfc3339(&model.created_at),
            id: model.id,
            provider_id: model.provider_id,
            category_id: model.category_id,
            title: model.title,
            description: model.description,
            price: model.price,
            status: model.status,
            image_url: model.image_url,
            location: model.location,
            latitude: model.latitude,
            longitude: model.longitude,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingView {
    pub id: i32,
    pub listing_id: i32,
    pub user_id: String,
    pub booking_date: String,
    pub status: BookingStatus,
    pub created_at: String,
}

impl From<booking::Model> for BookingView {
    fn from(model: booking::Model) -> Self {
        Self {
            booking_date: rfc3339(&model.booking_date),
            created_at: rfc3339(&model.created_at),
            id: model.id,
            listing_id: model.listing_id,
            user_id: model.user_id,
            status: model.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewView {
    pub id: i32,
    pub booking_id: i32,
    pub user_id: String,
    pub listing_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: String,
}

impl From<review::Model> for ReviewView {
    fn from(model: review::Model) -> Self {
        Self {
            created_at: rfc3339(&model.created_at),
            id: model.id,
            booking_id: model.booking_id,
            user_id: model.user_id,
            listing_id: model.listing_id,
            rating: model.rating,
            comment: model.comment,
        }
    }
}
