//! # Account Handlers
//!
//! Login (resolve-or-create), own profile, self-service deletion and user
//! administration.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{AdminAccount, Authenticated, BearerToken};
use crate::error::{ApiError, unauthorized, validation_error};
use crate::handlers::types::{ApiJson, ApiPath, MessageResponse, UserView};
use crate::identity::verify_with_retry;
use crate::models::Role;
use crate::server::AppState;
use crate::services::directory::AccountRequest;

/// Optional login body used on first login
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    /// Requested role; only `provider` has an effect
    pub role: Option<Role>,
    pub business_name: Option<String>,
    pub business_description: Option<String>,
    /// Overrides the name carried by the identity token
    pub display_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    /// True when this login created the account
    pub created: bool,
    pub user: UserView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub success: bool,
    pub user: UserView,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsersResponse {
    pub success: bool,
    pub users: Vec<UserView>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SetRoleRequest {
    pub role: Role,
    /// Used when promoting to provider; defaults to the display name
    pub business_name: Option<String>,
    pub business_description: Option<String>,
}

/// Verify the bearer credential and return the local account, creating it
/// on first login
#[utoipa::path(
    post,
    path = "/api/login",
    security(("bearer_auth" = [])),
    request_body(content = LoginRequest, description = "Optional first-login details"),
    responses(
        (status = 200, description = "Existing account", body = LoginResponse),
        (status = 201, description = "Account created", body = LoginResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Missing or invalid credential", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn login(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    body: Bytes,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let request: LoginRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LoginRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| validation_error(&format!("Invalid JSON body: {e}")))?
    };

    let identity_config = &state.config.identity;
    let identity = verify_with_retry(
        state.identity.as_ref(),
        &token,
        identity_config.verify_attempts,
        Duration::from_millis(identity_config.verify_backoff_ms),
    )
    .await
    .map_err(|err| {
        tracing::info!(error = %err, "Login rejected");
        metrics::counter!("logins_total", "outcome" => "rejected").increment(1);
        unauthorized(Some("Invalid token"))
    })?;

    let resolution = state
        .directory()
        .resolve_or_create(AccountRequest {
            subject_id: identity.subject_id,
            email: identity.email,
            display_name: request.display_name.or(identity.display_name),
            phone: request.phone,
            requested_role: request.role,
            business_name: request.business_name,
            business_description: request.business_description,
        })
        .await?;

    let created = resolution.is_created();
    metrics::counter!("logins_total", "outcome" => if created { "created" } else { "existing" })
        .increment(1);

    let account = resolution.into_account();
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(LoginResponse {
            success: true,
            message: "Login successful".to_string(),
            created,
            user: UserView::new(account.user, account.provider),
        }),
    ))
}

/// Profile of the caller
#[utoipa::path(
    get,
    path = "/api/users/me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller profile", body = UserResponse),
        (status = 401, description = "Missing or invalid credential", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn me(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<UserResponse>, ApiError> {
    let account = state.directory().get_profile(&identity.subject_id).await?;
    Ok(Json(UserResponse {
        success: true,
        user: UserView::new(account.user, account.provider),
    }))
}

/// Record a logout. Sessions live with the identity provider, so this only
/// checks the credential and logs the event.
#[utoipa::path(
    post,
    path = "/api/logout",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logout recorded", body = MessageResponse),
        (status = 401, description = "Missing or invalid credential", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn logout(Authenticated(identity): Authenticated) -> Json<MessageResponse> {
    tracing::info!(subject_id = %identity.subject_id, "User logged out");
    Json(MessageResponse::new("Logout logged"))
}

/// Delete the caller's account and revoke it upstream
#[utoipa::path(
    delete,
    path = "/api/users/delete",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid credential", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn delete_me(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<MessageResponse>, ApiError> {
    state.directory().delete_account(&identity.subject_id).await?;
    Ok(Json(MessageResponse::new("Account deleted")))
}

/// All users, newest first
#[utoipa::path(
    get,
    path = "/api/admin/users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Users", body = UsersResponse),
        (status = 401, description = "Missing or invalid credential", body = ApiError),
        (status = 403, description = "Admin access required", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn admin_list_users(
    State(state): State<AppState>,
    _admin: AdminAccount,
) -> Result<Json<UsersResponse>, ApiError> {
    let users = state.directory().list_users().await?;
    Ok(Json(UsersResponse {
        success: true,
        users: users.into_iter().map(|u| UserView::new(u, None)).collect(),
    }))
}

/// Remove another user's account
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Admins cannot delete themselves", body = ApiError),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn admin_delete_user(
    State(state): State<AppState>,
    admin: AdminAccount,
    ApiPath(user_id): ApiPath<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .directory()
        .remove_user(&admin.actor(), &user_id)
        .await?;
    Ok(Json(MessageResponse::new(format!("User {user_id} deleted"))))
}

/// Assign a role to a user
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "User id")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserResponse),
        (status = 403, description = "Admin access required", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn admin_set_role(
    State(state): State<AppState>,
    admin: AdminAccount,
    ApiPath(user_id): ApiPath<String>,
    ApiJson(request): ApiJson<SetRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let account = state
        .directory()
        .set_role(
            &admin.actor(),
            &user_id,
            request.role,
            request.business_name,
            request.business_description,
        )
        .await?;
    Ok(Json(UserResponse {
        success: true,
        user: UserView::new(account.user, account.provider),
    }))
}
