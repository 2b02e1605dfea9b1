//! Identity adapter.
//!
//! Verifies bearer credentials issued by the external identity provider and
//! revokes upstream accounts. Production tokens are RS256 JWTs checked
//! against a JWKS endpoint; local and test profiles may use HS256 tokens
//! signed with a shared secret.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use lru::LruCache;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

use crate::config::AppConfig;

/// Identity asserted by a verified credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// `iat` lies in the future beyond the allowed leeway
    #[error("token used before its issue time")]
    NotYetValid,
    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(String),
    #[error("failed to revoke identity: {0}")]
    Revocation(String),
}

impl IdentityError {
    /// Errors that may clear up on their own (clock skew, key propagation).
    pub fn is_transient(&self) -> bool {
        matches!(self, IdentityError::NotYetValid | IdentityError::KeyFetch(_))
    }
}

/// External identity provider capability.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a bearer credential.
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;

    /// Revoke the upstream account for `subject_id`.
    async fn revoke(&self, subject_id: &str) -> Result<(), IdentityError>;
}

/// Verify with a bounded retry on transient failures.
///
/// Only the login path uses this; every other request verifies once.
pub async fn verify_with_retry(
    provider: &dyn IdentityProvider,
    token: &str,
    attempts: u32,
    backoff: Duration,
) -> Result<VerifiedIdentity, IdentityError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match provider.verify(token).await {
            Ok(identity) => return Ok(identity),
            Err(err) if err.is_transient() && attempt < attempts => {
                tracing::warn!(attempt, error = %err, "Token verification failed, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    iat: Option<i64>,
}

impl IdentityClaims {
    fn into_identity(self, leeway_seconds: u64) -> Result<VerifiedIdentity, IdentityError> {
        if let Some(iat) = self.iat {
            let now = chrono::Utc::now().timestamp();
            if iat > now + leeway_seconds as i64 {
                return Err(IdentityError::NotYetValid);
            }
        }
        if self.sub.trim().is_empty() {
            return Err(IdentityError::InvalidToken("empty subject".to_string()));
        }
        Ok(VerifiedIdentity {
            subject_id: self.sub,
            email: self.email.filter(|e| !e.trim().is_empty()),
            display_name: self.name.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// Calls `DELETE {base_url}/{subject_id}` on the identity provider's admin API.
#[derive(Clone)]
pub struct RevocationClient {
    http_client: Client,
    base_url: Url,
    admin_token: Option<String>,
}

impl RevocationClient {
    pub fn new(http_client: Client, base_url: Url, admin_token: Option<String>) -> Self {
        Self {
            http_client,
            base_url,
            admin_token,
        }
    }

    pub async fn revoke(&self, subject_id: &str) -> Result<(), IdentityError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IdentityError::Revocation("revoke URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(subject_id);

        let mut request = self.http_client.delete(url);
        if let Some(token) = &self.admin_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IdentityError::Revocation(e.to_string()))?;

        // Already gone upstream counts as revoked
        if response.status().is_success() || response.status() == reqwest::StatusCode::NOT_FOUND
        {
            Ok(())
        } else {
            Err(IdentityError::Revocation(format!(
                "identity provider returned {}",
                response.status()
            )))
        }
    }
}

async fn revoke_or_skip(
    revocation: Option<&RevocationClient>,
    subject_id: &str,
) -> Result<(), IdentityError> {
    match revocation {
        Some(client) => client.revoke(subject_id).await,
        None => {
            tracing::debug!(subject_id, "No revoke endpoint configured, skipping");
            Ok(())
        }
    }
}

/// JSON Web Key Set document
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JsonWebKey>,
}

#[derive(Debug, Deserialize, Clone)]
struct JsonWebKey {
    kty: String,
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

/// RS256 verifier backed by a cached JWKS endpoint.
pub struct OidcIdentityProvider {
    http_client: Client,
    jwks_url: String,
    audience: String,
    issuer: String,
    leeway_seconds: u64,
    jwks_cache: RwLock<LruCache<String, JsonWebKey>>,
    revocation: Option<RevocationClient>,
}

impl OidcIdentityProvider {
    pub fn new(
        http_client: Client,
        jwks_url: String,
        audience: String,
        issuer: String,
        leeway_seconds: u64,
        revocation: Option<RevocationClient>,
    ) -> Self {
        Self {
            http_client,
            jwks_url,
            audience,
            issuer,
            leeway_seconds,
            jwks_cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(32).unwrap_or(NonZeroUsize::MIN),
            )),
            revocation,
        }
    }

    /// Look up the key by `kid`, refreshing the key set on a miss.
    async fn verification_key(&self, kid: &str) -> Result<JsonWebKey, IdentityError> {
        {
            let mut cache = self.jwks_cache.write().await;
            if let Some(jwk) = cache.get(kid) {
                return Ok(jwk.clone());
            }
        }

        let jwks = self.fetch_jwks().await?;
        let mut cache = self.jwks_cache.write().await;
        let mut found = None;
        for key in jwks.keys {
            if let Some(key_id) = key.kid.clone() {
                if key_id == kid {
                    found = Some(key.clone());
                }
                cache.put(key_id, key);
            }
        }

        found.ok_or_else(|| IdentityError::InvalidToken(format!("unknown signing key '{}'", kid)))
    }

    async fn fetch_jwks(&self) -> Result<JwksResponse, IdentityError> {
        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| IdentityError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::KeyFetch(format!(
                "JWKS request failed with status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| IdentityError::KeyFetch(format!("malformed JWKS: {}", e)))
    }

    fn decoding_key(jwk: &JsonWebKey) -> Result<DecodingKey, IdentityError> {
        if jwk.kty != "RSA" {
            return Err(IdentityError::InvalidToken(
                "only RSA signing keys are supported".to_string(),
            ));
        }
        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            return Err(IdentityError::InvalidToken(
                "signing key is missing RSA components".to_string(),
            ));
        };
        DecodingKey::from_rsa_components(n, e)
            .map_err(|e| IdentityError::InvalidToken(format!("bad signing key: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for OidcIdentityProvider {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let header = decode_header(token)
            .map_err(|e| IdentityError::InvalidToken(format!("malformed header: {}", e)))?;
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::InvalidToken("missing 'kid' header".to_string()))?;

        let jwk = self.verification_key(&kid).await?;
        let key = Self::decoding_key(&jwk)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = self.leeway_seconds;

        let data = decode::<IdentityClaims>(token, &key, &validation)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;
        data.claims.into_identity(self.leeway_seconds)
    }

    async fn revoke(&self, subject_id: &str) -> Result<(), IdentityError> {
        revoke_or_skip(self.revocation.as_ref(), subject_id).await
    }
}

/// HS256 verifier for local development and tests.
pub struct SharedSecretIdentityProvider {
    key: DecodingKey,
    validation: Validation,
    leeway_seconds: u64,
    revocation: Option<RevocationClient>,
}

impl SharedSecretIdentityProvider {
    pub fn new(secret: &[u8], leeway_seconds: u64, revocation: Option<RevocationClient>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.leeway = leeway_seconds;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
            leeway_seconds,
            revocation,
        }
    }
}

#[async_trait]
impl IdentityProvider for SharedSecretIdentityProvider {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let data = decode::<IdentityClaims>(token, &self.key, &self.validation)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?;
        data.claims.into_identity(self.leeway_seconds)
    }

    async fn revoke(&self, subject_id: &str) -> Result<(), IdentityError> {
        revoke_or_skip(self.revocation.as_ref(), subject_id).await
    }
}

/// Build the identity provider selected by `IDENTITY_MODE`.
pub fn build_identity_provider(
    config: &AppConfig,
    http_client: Client,
) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    let identity = &config.identity;
    let revocation = identity
        .revoke_url
        .as_deref()
        .map(Url::parse)
        .transpose()?
        .map(|url| RevocationClient::new(http_client.clone(), url, identity.admin_token.clone()));

    match identity.mode.as_str() {
        "shared_secret" => {
            let secret = identity
                .shared_secret
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("shared secret identity mode without a secret"))?;
            Ok(Arc::new(SharedSecretIdentityProvider::new(
                secret,
                identity.leeway_seconds,
                revocation,
            )))
        }
        _ => {
            let audience = identity
                .effective_audience()
                .ok_or_else(|| anyhow::anyhow!("identity audience is not configured"))?;
            let issuer = identity
                .effective_issuer()
                .ok_or_else(|| anyhow::anyhow!("identity issuer is not configured"))?;
            Ok(Arc::new(OidcIdentityProvider::new(
                http_client,
                identity.jwks_url.clone(),
                audience,
                issuer,
                identity.leeway_seconds,
                revocation,
            )))
        }
    }
}
