//! # External Data Handlers
//!
//! Geocoding and open-data proxies. Upstream JSON is returned unchanged.

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, ServiceError};
use crate::external::Dataset;
use crate::external::open_data::resolve_limit;
use crate::handlers::types::{ApiPath, ApiQuery, MessageResponse};
use crate::server::AppState;

#[derive(Debug, Default, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct GeocodeQuery {
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct OpenDataQuery {
    /// 1 to 100, default 10
    pub limit: Option<u32>,
}

/// Geocode an address
#[utoipa::path(
    get,
    path = "/api/maps/geocode",
    params(GeocodeQuery),
    responses(
        (status = 200, description = "Upstream geocoding result", body = serde_json::Value),
        (status = 400, description = "Missing address", body = ApiError),
        (status = 502, description = "Upstream failure", body = ApiError),
        (status = 503, description = "Geocoding not configured", body = ApiError)
    ),
    tag = "external"
)]
pub async fn geocode(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<GeocodeQuery>,
) -> Result<Json<Value>, ApiError> {
    let address = query.address.unwrap_or_default();
    let result = state
        .geocoder
        .geocode(&address)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(result))
}

/// Rows from a public open-data resource
#[utoipa::path(
    get,
    path = "/api/govsg/{dataset}",
    params(
        ("dataset" = String, Path, description = "acra, business-expectations or bites"),
        OpenDataQuery
    ),
    responses(
        (status = 200, description = "Upstream datastore result", body = serde_json::Value),
        (status = 400, description = "Invalid limit", body = ApiError),
        (status = 404, description = "Unknown dataset", body = ApiError),
        (status = 502, description = "Upstream failure", body = ApiError)
    ),
    tag = "external"
)]
pub async fn open_data(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(query): ApiQuery<OpenDataQuery>,
) -> Result<Json<Value>, ApiError> {
    let dataset = Dataset::from_slug(&slug)
        .ok_or_else(|| ServiceError::not_found(format!("Unknown dataset: {slug}")))?;
    let limit = resolve_limit(query.limit).map_err(ServiceError::from)?;
    let result = state
        .open_data
        .fetch(dataset, limit)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(result))
}

/// Liveness of the external proxy routes
#[utoipa::path(
    get,
    path = "/api/ping",
    responses(
        (status = 200, description = "pong", body = MessageResponse)
    ),
    tag = "external"
)]
pub async fn ping() -> Json<MessageResponse> {
    Json(MessageResponse::new("pong"))
}
