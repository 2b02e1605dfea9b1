//! FAQ chat handler

use axum::response::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiError, validation_error};
use crate::faq;
use crate::handlers::types::ApiJson;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ChatRequest {
    #[serde(default)]
    #[schema(example = "How do I find a plumber?")]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub success: bool,
    pub reply: String,
}

/// Answer a frequently asked question
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply", body = ChatResponse),
        (status = 400, description = "Empty message", body = ApiError)
    ),
    tag = "external"
)]
pub async fn chat(ApiJson(request): ApiJson<ChatRequest>) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(validation_error("message is required"));
    }
    Ok(Json(ChatResponse {
        success: true,
        reply: faq::reply_for(&request.message).to_string(),
    }))
}
