//! Configuration loading for the marketplace API.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `MARKETPLACE_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "MARKETPLACE_";
const REDACTED: &str = "[REDACTED]";

/// Application configuration derived from `MARKETPLACE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Browser origins allowed by CORS. Empty means permissive in local/test.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cors_allowed_origins: Vec<String>,
    /// Emails that become admins on first login
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admin_emails: Vec<String>,
    /// Emails that become providers on first login
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_allowlist: Vec<ProviderAllowlistEntry>,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub external: ExternalApiConfig,
}

/// One provider allow-list entry, optionally carrying the business profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAllowlistEntry {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Identity provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct IdentityConfig {
    /// `oidc` (RS256 against a JWKS endpoint) or `shared_secret` (HS256, local/test only)
    #[serde(default = "default_identity_mode")]
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default = "default_identity_jwks_url")]
    pub jwks_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_secret: Option<Vec<u8>>,
    /// Base URL; revocation issues `DELETE {revoke_url}/{subject_id}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoke_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    #[serde(default = "default_identity_verify_attempts")]
    pub verify_attempts: u32,
    #[serde(default = "default_identity_verify_backoff_ms")]
    pub verify_backoff_ms: u64,
    #[serde(default = "default_identity_leeway_seconds")]
    pub leeway_seconds: u64,
}

impl IdentityConfig {
    /// Explicit audience, falling back to the project id.
    pub fn effective_audience(&self) -> Option<String> {
        self.audience.clone().or_else(|| self.project_id.clone())
    }

    /// Explicit issuer, falling back to the secure-token issuer of the project.
    pub fn effective_issuer(&self) -> Option<String> {
        self.issuer.clone().or_else(|| {
            self.project_id
                .as_ref()
                .map(|project| format!("https://securetoken.google.com/{}", project))
        })
    }
}

/// Third-party data sources proxied by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ExternalApiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps_api_key: Option<String>,
    #[serde(default = "default_geocode_base_url")]
    pub geocode_base_url: String,
    #[serde(default = "default_open_data_base_url")]
    pub open_data_base_url: String,
    #[serde(default = "default_external_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_geocode_cache_ttl_seconds")]
    pub geocode_cache_ttl_seconds: u64,
    #[serde(default = "default_geocode_cache_capacity")]
    pub geocode_cache_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            cors_allowed_origins: Vec::new(),
            admin_emails: Vec::new(),
            provider_allowlist: Vec::new(),
            identity: IdentityConfig::default(),
            external: ExternalApiConfig::default(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            mode: default_identity_mode(),
            project_id: None,
            issuer: None,
            audience: None,
            jwks_url: default_identity_jwks_url(),
            shared_secret: None,
            revoke_url: None,
            admin_token: None,
            verify_attempts: default_identity_verify_attempts(),
            verify_backoff_ms: default_identity_verify_backoff_ms(),
            leeway_seconds: default_identity_leeway_seconds(),
        }
    }
}

impl Default for ExternalApiConfig {
    fn default() -> Self {
        Self {
            maps_api_key: None,
            geocode_base_url: default_geocode_base_url(),
            open_data_base_url: default_open_data_base_url(),
            timeout_ms: default_external_timeout_ms(),
            geocode_cache_ttl_seconds: default_geocode_cache_ttl_seconds(),
            geocode_cache_capacity: default_geocode_cache_capacity(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// True for the `local` and `test` profiles.
    pub fn is_dev_profile(&self) -> bool {
        matches!(self.profile.as_str(), "local" | "test")
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.identity.shared_secret.is_some() {
            config.identity.shared_secret = Some(REDACTED.as_bytes().to_vec());
        }
        if config.identity.admin_token.is_some() {
            config.identity.admin_token = Some(REDACTED.to_string());
        }
        if config.external.maps_api_key.is_some() {
            config.external.maps_api_key = Some(REDACTED.to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.profile.as_str(), "local" | "test" | "dev" | "prod") {
            return Err(ConfigError::InvalidProfile {
                value: self.profile.clone(),
            });
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidDbMaxConnections);
        }

        match self.identity.mode.as_str() {
            "oidc" => {
                if self.identity.effective_audience().is_none() {
                    return Err(ConfigError::MissingIdentityAudience);
                }
            }
            "shared_secret" => {
                if !self.is_dev_profile() {
                    return Err(ConfigError::SharedSecretNotAllowed {
                        profile: self.profile.clone(),
                    });
                }
                if self.identity.shared_secret.as_ref().is_none_or(|s| s.is_empty()) {
                    return Err(ConfigError::MissingSharedSecret);
                }
            }
            other => {
                return Err(ConfigError::InvalidIdentityMode {
                    value: other.to_string(),
                });
            }
        }

        if !(1..=10).contains(&self.identity.verify_attempts) {
            return Err(ConfigError::InvalidVerifyAttempts {
                value: self.identity.verify_attempts,
            });
        }

        for (field, value) in [
            ("IDENTITY_JWKS_URL", Some(&self.identity.jwks_url)),
            ("IDENTITY_REVOKE_URL", self.identity.revoke_url.as_ref()),
            ("GEOCODE_BASE_URL", Some(&self.external.geocode_base_url)),
            ("OPEN_DATA_BASE_URL", Some(&self.external.open_data_base_url)),
        ] {
            if let Some(value) = value
                && url::Url::parse(value).is_err()
            {
                return Err(ConfigError::InvalidUrl {
                    field,
                    value: value.clone(),
                });
            }
        }

        if self.external.geocode_cache_capacity == 0 {
            return Err(ConfigError::InvalidCacheCapacity);
        }

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://marketplace.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_identity_mode() -> String {
    "oidc".to_string()
}

fn default_identity_jwks_url() -> String {
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com"
        .to_string()
}

fn default_identity_verify_attempts() -> u32 {
    3
}

fn default_identity_verify_backoff_ms() -> u64 {
    500
}

fn default_identity_leeway_seconds() -> u64 {
    60
}

fn default_geocode_base_url() -> String {
    "https://maps.googleapis.com".to_string()
}

fn default_open_data_base_url() -> String {
    "https://data.gov.sg".to_string()
}

fn default_external_timeout_ms() -> u64 {
    10_000
}

fn default_geocode_cache_ttl_seconds() -> u64 {
    3600
}

fn default_geocode_cache_capacity() -> usize {
    512
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read env file {path:?}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("unknown profile '{value}' (expected local, test, dev or prod)")]
    InvalidProfile { value: String },
    #[error("unknown log format '{value}' (expected json or pretty)")]
    InvalidLogFormat { value: String },
    #[error("database max connections must be at least 1")]
    InvalidDbMaxConnections,
    #[error("unknown identity mode '{value}' (expected oidc or shared_secret)")]
    InvalidIdentityMode { value: String },
    #[error(
        "identity audience is missing; set MARKETPLACE_IDENTITY_PROJECT_ID or MARKETPLACE_IDENTITY_AUDIENCE"
    )]
    MissingIdentityAudience,
    #[error("shared secret is missing; set MARKETPLACE_IDENTITY_SHARED_SECRET")]
    MissingSharedSecret,
    #[error("shared secret identity mode is only allowed in local/test profiles, got '{profile}'")]
    SharedSecretNotAllowed { profile: String },
    #[error("identity shared secret is invalid base64: {error}")]
    InvalidSharedSecretBase64 { error: String },
    #[error("identity verify attempts must be between 1 and 10, got {value}")]
    InvalidVerifyAttempts { value: u32 },
    #[error("invalid provider allow-list entry: {entry}")]
    InvalidAllowlistEntry { entry: String },
    #[error("invalid admin email: {entry}")]
    InvalidAdminEmail { entry: String },
    #[error("{field} is not a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("geocode cache capacity must be at least 1")]
    InvalidCacheCapacity,
}

fn is_valid_email(entry: &str) -> bool {
    let mut parts = entry.split('@');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(local), Some(domain), None) if !local.is_empty() && domain.contains('.')
    )
}

fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `email` or `email|business name|description` entries separated by `;`.
fn parse_provider_allowlist(value: &str) -> Result<Vec<ProviderAllowlistEntry>, ConfigError> {
    split_list(value, ';')
        .into_iter()
        .map(|entry| {
            let mut fields = entry.splitn(3, '|').map(str::trim);
            let email = fields.next().unwrap_or_default().to_lowercase();
            if !is_valid_email(&email) {
                return Err(ConfigError::InvalidAllowlistEntry { entry });
            }
            let business_name = fields.next().filter(|s| !s.is_empty()).map(String::from);
            let description = fields.next().filter(|s| !s.is_empty()).map(String::from);
            Ok(ProviderAllowlistEntry {
                email,
                business_name,
                description,
            })
        })
        .collect()
}

/// Loads configuration using layered `.env` files and `MARKETPLACE_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env`, `.env.local`, `.env.<profile>`, `.env.<profile>.local`
    /// and finally the process environment, later layers winning.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        // Empty values count as unset
        layered.retain(|_, value| !value.trim().is_empty());

        let profile = layered.remove("PROFILE").unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered.remove("LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let cors_allowed_origins = layered
            .remove("CORS_ALLOWED_ORIGINS")
            .map(|v| split_list(&v, ','))
            .unwrap_or_default();

        let admin_emails = layered
            .remove("ADMIN_EMAILS")
            .map(|v| split_list(&v, ','))
            .unwrap_or_default()
            .into_iter()
            .map(|email| email.to_lowercase())
            .collect::<Vec<_>>();
        if let Some(bad) = admin_emails.iter().find(|email| !is_valid_email(email)) {
            return Err(ConfigError::InvalidAdminEmail { entry: bad.clone() });
        }

        let provider_allowlist = match layered.remove("PROVIDER_ALLOWLIST") {
            Some(value) => parse_provider_allowlist(&value)?,
            None => Vec::new(),
        };

        let shared_secret = layered
            .remove("IDENTITY_SHARED_SECRET")
            .map(|encoded| {
                general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| ConfigError::InvalidSharedSecretBase64 {
                        error: e.to_string(),
                    })
            })
            .transpose()?;

        let identity = IdentityConfig {
            mode: layered
                .remove("IDENTITY_MODE")
                .unwrap_or_else(default_identity_mode),
            project_id: layered.remove("IDENTITY_PROJECT_ID"),
            issuer: layered.remove("IDENTITY_ISSUER"),
            audience: layered.remove("IDENTITY_AUDIENCE"),
            jwks_url: layered
                .remove("IDENTITY_JWKS_URL")
                .unwrap_or_else(default_identity_jwks_url),
            shared_secret,
            revoke_url: layered.remove("IDENTITY_REVOKE_URL"),
            admin_token: layered.remove("IDENTITY_ADMIN_TOKEN"),
            verify_attempts: layered
                .remove("IDENTITY_VERIFY_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_identity_verify_attempts),
            verify_backoff_ms: layered
                .remove("IDENTITY_VERIFY_BACKOFF_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_identity_verify_backoff_ms),
            leeway_seconds: layered
                .remove("IDENTITY_LEEWAY_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_identity_leeway_seconds),
        };

        let external = ExternalApiConfig {
            maps_api_key: layered.remove("MAPS_API_KEY"),
            geocode_base_url: layered
                .remove("GEOCODE_BASE_URL")
                .unwrap_or_else(default_geocode_base_url),
            open_data_base_url: layered
                .remove("OPEN_DATA_BASE_URL")
                .unwrap_or_else(default_open_data_base_url),
            timeout_ms: layered
                .remove("EXTERNAL_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_external_timeout_ms),
            geocode_cache_ttl_seconds: layered
                .remove("GEOCODE_CACHE_TTL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_geocode_cache_ttl_seconds),
            geocode_cache_capacity: layered
                .remove("GEOCODE_CACHE_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_geocode_cache_capacity),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            cors_allowed_origins,
            admin_emails,
            provider_allowlist,
            identity,
            external,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{}PROFILE", ENV_PREFIX))
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
