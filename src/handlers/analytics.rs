//! Provider analytics handler

use axum::{extract::State, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::ProviderAccount;
use crate::error::ApiError;
use crate::repositories::analytics::ProviderAnalyticsSummary;
use crate::server::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyticsResponse {
    pub success: bool,
    pub analytics: ProviderAnalyticsSummary,
}

/// Listing, booking and rating totals for the caller's provider profile
#[utoipa::path(
    get,
    path = "/api/provider/analytics",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Analytics", body = AnalyticsResponse),
        (status = 403, description = "Provider access required", body = ApiError)
    ),
    tag = "services"
)]
pub async fn provider_analytics(
    State(state): State<AppState>,
    provider: ProviderAccount,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let analytics = state.analytics().summary(provider.provider.id).await?;
    Ok(Json(AnalyticsResponse {
        success: true,
        analytics,
    }))
}
