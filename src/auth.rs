//! # Authentication and Authorization
//!
//! Request extractors that verify the `Authorization: Bearer` credential with
//! the configured [`IdentityProvider`](crate::identity::IdentityProvider) and
//! resolve the local account and its role.
//!
//! | Extractor          | Requires                                   |
//! |--------------------|--------------------------------------------|
//! | [`BearerToken`]    | a well-formed bearer header                |
//! | [`Authenticated`]  | a verified credential                      |
//! | [`CurrentAccount`] | a verified credential with a local account |
//! | [`AdminAccount`]   | an admin account                           |
//! | [`ProviderAccount`]| a provider account with a provider profile |

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{ApiError, forbidden, unauthorized};
use crate::identity::VerifiedIdentity;
use crate::models::{Role, provider};
use crate::server::AppState;
use crate::services::{Account, Actor};

const MISSING_BEARER: &str = "Missing or invalid Authorization header";
const INVALID_TOKEN: &str = "Invalid token";
const NOT_REGISTERED: &str = "User not registered";

/// Raw bearer credential, not yet verified
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// A verified identity. The local account may not exist yet.
#[derive(Debug, Clone)]
pub struct Authenticated(pub VerifiedIdentity);

/// A verified identity with a registered local account
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Account);

#[derive(Debug, Clone)]
pub struct AdminAccount(pub Account);

/// A provider account together with its provider profile
#[derive(Debug, Clone)]
pub struct ProviderAccount {
    pub account: Account,
    pub provider: provider::Model,
}

impl CurrentAccount {
    pub fn actor(&self) -> Actor {
        self.0.actor()
    }

    pub fn user_id(&self) -> &str {
        &self.0.user.id
    }
}

impl AdminAccount {
    pub fn actor(&self) -> Actor {
        self.0.actor()
    }
}

fn bearer_from_parts(parts: &Parts) -> Result<String, ApiError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
        .ok_or_else(|| unauthorized(Some(MISSING_BEARER)))
}

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_from_parts(parts).map(BearerToken)
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_from_parts(parts)?;
        let state = AppState::from_ref(state);
        match state.identity.verify(&token).await {
            Ok(identity) => Ok(Authenticated(identity)),
            Err(err) => {
                tracing::debug!(error = %err, "Bearer verification failed");
                Err(unauthorized(Some(INVALID_TOKEN)))
            }
        }
    }
}

impl<S> FromRequestParts<S> for CurrentAccount
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authenticated(identity) = Authenticated::from_request_parts(parts, state).await?;
        let state = AppState::from_ref(state);
        match state.directory().get_profile(&identity.subject_id).await {
            Ok(account) => Ok(CurrentAccount(account)),
            Err(crate::error::ServiceError::NotFound(_)) => {
                Err(unauthorized(Some(NOT_REGISTERED)))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl<S> FromRequestParts<S> for AdminAccount
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentAccount(account) = CurrentAccount::from_request_parts(parts, state).await?;
        if account.user.role != Role::Admin {
            return Err(forbidden(Some("Admin access required")));
        }
        Ok(AdminAccount(account))
    }
}

impl<S> FromRequestParts<S> for ProviderAccount
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentAccount(account) = CurrentAccount::from_request_parts(parts, state).await?;
        match (&account.user.role, account.provider.clone()) {
            (Role::Provider, Some(provider)) => Ok(ProviderAccount { account, provider }),
            _ => Err(forbidden(Some("Provider access required"))),
        }
    }
}
