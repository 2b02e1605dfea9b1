//! Address geocoding through the Google Maps geocoding JSON API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::{Cache, ExternalError};

const GEOCODE_PATH: &str = "maps/api/geocode/json";

/// Cache key for an address: trimmed, lowercased, inner whitespace collapsed.
pub fn normalize_address(address: &str) -> String {
    address
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub struct GeocodingClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
    cache: Arc<dyn Cache<String, Value>>,
    ttl: Duration,
}

impl GeocodingClient {
    pub fn new(
        http: Client,
        base_url: Url,
        api_key: Option<String>,
        cache: Arc<dyn Cache<String, Value>>,
        ttl: Duration,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            cache,
            ttl,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Geocode `address`, returning the upstream JSON unchanged.
    pub async fn geocode(&self, address: &str) -> Result<Value, ExternalError> {
        let key = normalize_address(address);
        if key.is_empty() {
            return Err(ExternalError::InvalidInput(
                "address param required".to_string(),
            ));
        }
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ExternalError::NotConfigured("Geocoding"));
        };

        if let Some(hit) = self.cache.get(&key).await {
            metrics::counter!("external_cache_hits_total", "source" => "geocode").increment(1);
            return Ok(hit);
        }
        metrics::counter!("external_cache_misses_total", "source" => "geocode").increment(1);

        let url = self
            .base_url
            .join(GEOCODE_PATH)
            .map_err(|e| ExternalError::Upstream(e.to_string()))?;
        let response = self
            .http
            .get(url)
            .query(&[("address", address.trim()), ("key", api_key)])
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;

        // Only successful lookups are memoized
        if body.get("status").and_then(Value::as_str) == Some("OK") {
            self.cache.put(key, body.clone(), self.ttl).await;
        } else {
            tracing::debug!(status = ?body.get("status"), "Geocode returned non-OK status");
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::TtlCache;
    use std::num::NonZeroUsize;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server_uri: &str, api_key: Option<&str>) -> GeocodingClient {
        GeocodingClient::new(
            Client::new(),
            Url::parse(&format!("{server_uri}/")).unwrap(),
            api_key.map(String::from),
            Arc::new(TtlCache::new(NonZeroUsize::new(8).unwrap())),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn normalizes_addresses() {
        assert_eq!(normalize_address("  1 Raffles   Place "), "1 raffles place");
        assert_eq!(normalize_address("   "), "");
    }

    #[tokio::test]
    async fn caches_successful_lookups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .and(query_param("key", "maps-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "results": [{"formatted_address": "1 Raffles Place"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri(), Some("maps-key"));
        let first = client.geocode("1 Raffles Place").await.unwrap();
        let second = client.geocode("1  raffles place").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first["status"], "OK");
    }

    #[tokio::test]
    async fn does_not_cache_failed_lookups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps/api/geocode/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "ZERO_RESULTS", "results": []})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server.uri(), Some("maps-key"));
        client.geocode("nowhere").await.unwrap();
        client.geocode("nowhere").await.unwrap();
    }

    #[tokio::test]
    async fn reports_missing_key_and_blank_address() {
        let client = client("http://127.0.0.1:9", None);
        assert!(matches!(
            client.geocode("somewhere").await,
            Err(ExternalError::NotConfigured(_))
        ));
        assert!(matches!(
            client.geocode("  ").await,
            Err(ExternalError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn upstream_errors_surface() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client(&server.uri(), Some("maps-key"));
        assert!(matches!(
            client.geocode("somewhere").await,
            Err(ExternalError::Upstream(_))
        ));
    }
}
