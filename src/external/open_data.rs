//! Proxy for a fixed set of data.gov.sg datastore resources.

use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::ExternalError;

const DATASTORE_PATH: &str = "api/action/datastore_search";
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Datasets exposed by the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    /// ACRA registered business entities
    Acra,
    /// Business expectations of the services sector
    BusinessExpectations,
    /// Business insights tool
    Bites,
}

impl Dataset {
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "acra" => Some(Dataset::Acra),
            "business-expectations" => Some(Dataset::BusinessExpectations),
            "bites" => Some(Dataset::Bites),
            _ => None,
        }
    }

    pub fn resource_id(&self) -> &'static str {
        match self {
            Dataset::Acra => "8c00bf08-9124-479e-aeca-7cc411d884b5",
            Dataset::BusinessExpectations => "cec21148-68fe-4be9-90ae-2118ae68c3c9",
            Dataset::Bites => "82d7eb42-79d9-4f4b-8971-70f8f78e1b61",
        }
    }
}

/// Resolve the requested row limit, defaulting when absent.
pub fn resolve_limit(limit: Option<u32>) -> Result<u32, ExternalError> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(n) if (1..=MAX_LIMIT).contains(&n) => Ok(n),
        Some(_) => Err(ExternalError::InvalidInput(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        ))),
    }
}

pub struct OpenDataClient {
    http: Client,
    base_url: Url,
}

impl OpenDataClient {
    pub fn new(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub async fn fetch(&self, dataset: Dataset, limit: u32) -> Result<Value, ExternalError> {
        let url = self
            .base_url
            .join(DATASTORE_PATH)
            .map_err(|e| ExternalError::Upstream(e.to_string()))?;
        let limit = limit.to_string();
        let response = self
            .http
            .get(url)
            .query(&[("resource_id", dataset.resource_id()), ("limit", limit.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn dataset_slugs() {
        assert_eq!(Dataset::from_slug("acra"), Some(Dataset::Acra));
        assert_eq!(
            Dataset::from_slug("business-expectations"),
            Some(Dataset::BusinessExpectations)
        );
        assert_eq!(Dataset::from_slug("weather"), None);
    }

    #[test]
    fn limit_bounds() {
        assert_eq!(resolve_limit(None).unwrap(), DEFAULT_LIMIT);
        assert_eq!(resolve_limit(Some(100)).unwrap(), 100);
        assert!(resolve_limit(Some(0)).is_err());
        assert!(resolve_limit(Some(101)).is_err());
    }

    #[tokio::test]
    async fn fetches_resource_with_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/action/datastore_search"))
            .and(query_param("resource_id", Dataset::Bites.resource_id()))
            .and(query_param("limit", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": {"records": [{"_id": 1}]}
            })))
            .mount(&server)
            .await;

        let client = OpenDataClient::new(
            Client::new(),
            Url::parse(&format!("{}/", server.uri())).unwrap(),
        );
        let body = client.fetch(Dataset::Bites, 3).await.unwrap();
        assert_eq!(body["result"]["records"][0]["_id"], 1);
    }
}
