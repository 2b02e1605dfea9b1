//! # External Data Proxies
//!
//! Thin clients for third-party lookups exposed through the API: address
//! geocoding and the public open-data datastore. Nothing in the booking,
//! listing or review logic depends on these.

pub mod cache;
pub mod geocode;
pub mod open_data;

pub use cache::{Cache, CacheEntry, TtlCache};
pub use geocode::GeocodingClient;
pub use open_data::{Dataset, OpenDataClient};

use thiserror::Error;

use crate::error::ServiceError;

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("upstream request failed: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for ExternalError {
    fn from(err: reqwest::Error) -> Self {
        ExternalError::Upstream(err.without_url().to_string())
    }
}

impl From<ExternalError> for ServiceError {
    fn from(err: ExternalError) -> Self {
        match err {
            ExternalError::InvalidInput(message) => ServiceError::Validation(message),
            ExternalError::NotConfigured(_) => ServiceError::Unavailable(err.to_string()),
            ExternalError::Upstream(_) => ServiceError::Upstream(err.to_string()),
        }
    }
}

/// Shared HTTP client for outbound calls
pub fn build_http_client(timeout: std::time::Duration) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("marketplace/", env!("CARGO_PKG_VERSION")))
        .build()?)
}
