//! HTTP telemetry client using the source's JSON API.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fibersight_client::{HttpTelemetryClient, TelemetryClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpTelemetryClient::builder()
//!         .endpoint("http://localhost:8080")
//!         .timeout(Duration::from_secs(5))
//!         .build();
//!
//!     let states = client
//!         .fetch_metric_states(&["requests".to_string()])
//!         .await?;
//!
//!     for state in &states {
//!         println!("{}: {:?}", state.key.name, state.value);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fibersight_types::{FiberInfo, FiberTraceRequest, MetricKey, MetricState};

use crate::{ClientError, TelemetryClient};

/// Telemetry client for sources exposing the JSON API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTelemetryClient {
    client: Client,
    endpoint: String,
}

impl HttpTelemetryClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> HttpTelemetryClientBuilder {
        HttpTelemetryClientBuilder::default()
    }

    /// The base URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        if !response.status().is_success() {
            return Err(ClientError::Http(format!(
                "API returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}

#[async_trait]
impl TelemetryClient for HttpTelemetryClient {
    async fn fetch_metric_keys(&self) -> Result<Vec<MetricKey>, ClientError> {
        let response = self.client.get(self.url("insight/keys")).send().await?;
        let body: KeysResponse = Self::decode(response).await?;

        debug!(keys = body.keys.len(), "Fetched metric keys");
        Ok(body.keys)
    }

    async fn fetch_metric_states(&self, ids: &[String]) -> Result<Vec<MetricState>, ClientError> {
        let response = self
            .client
            .post(self.url("insight/metrics"))
            .json(&StatesRequest { selectors: ids })
            .send()
            .await?;
        let body: StatesResponse = Self::decode(response).await?;

        debug!(
            requested = ids.len(),
            received = body.states.len(),
            "Fetched metric states"
        );
        Ok(body.states)
    }

    async fn fetch_fibers(&self, request: &FiberTraceRequest) -> Result<Vec<FiberInfo>, ClientError> {
        let response = self
            .client
            .post(self.url("fibers/traces"))
            .json(request)
            .send()
            .await?;
        let body: FibersResponse = Self::decode(response).await?;

        debug!(fibers = body.fibers.len(), "Fetched fiber infos");
        Ok(body.fibers)
    }
}

/// Builder for HttpTelemetryClient.
#[derive(Debug, Default)]
pub struct HttpTelemetryClientBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl HttpTelemetryClientBuilder {
    /// Set the API base URL (e.g., "http://localhost:8080").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> HttpTelemetryClient {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        HttpTelemetryClient {
            client,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct StatesRequest<'a> {
    selectors: &'a [String],
}

#[derive(Debug, Deserialize)]
struct KeysResponse {
    #[serde(default)]
    keys: Vec<MetricKey>,
}

#[derive(Debug, Deserialize)]
struct StatesResponse {
    #[serde(default)]
    states: Vec<MetricState>,
}

#[derive(Debug, Deserialize)]
struct FibersResponse {
    #[serde(default)]
    fibers: Vec<FiberInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = HttpTelemetryClient::builder().build();
        assert_eq!(client.endpoint(), "http://localhost:8080");
    }

    #[test]
    fn test_builder_custom() {
        let client = HttpTelemetryClient::builder()
            .endpoint("http://telemetry.local:9000")
            .timeout(Duration::from_secs(1))
            .build();

        assert_eq!(client.endpoint(), "http://telemetry.local:9000");
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = HttpTelemetryClient::builder()
            .endpoint("http://telemetry.local/")
            .build();
        assert_eq!(client.url("insight/keys"), "http://telemetry.local/insight/keys");
    }

    #[test]
    fn test_states_request_shape() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let json = serde_json::to_value(StatesRequest { selectors: &ids }).unwrap();
        assert_eq!(json, serde_json::json!({"selectors": ["a", "b"]}));
    }

    #[test]
    fn test_missing_envelope_field_is_empty() {
        let body: FibersResponse = serde_json::from_str("{}").unwrap();
        assert!(body.fibers.is_empty());
    }
}
