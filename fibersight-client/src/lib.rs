//! # fibersight-client
//!
//! The telemetry collaborator consumed by the fibersight pipeline.
//!
//! The pipeline only ever talks to a [`TelemetryClient`]; this crate
//! defines that trait and ships an HTTP implementation for telemetry
//! sources that expose a JSON API.
//!
//! ## Endpoints (HTTP implementation)
//!
//! - `GET  {endpoint}/insight/keys` - available metric keys
//! - `POST {endpoint}/insight/metrics` - states for a set of metric ids
//! - `POST {endpoint}/fibers/traces` - fiber infos for a trace request
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fibersight_client::{HttpTelemetryClient, TelemetryClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpTelemetryClient::builder()
//!         .endpoint("http://localhost:8080")
//!         .build();
//!
//!     let keys = client.fetch_metric_keys().await?;
//!     println!("Source offers {} metrics", keys.len());
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "http")]
pub mod http;

use std::fmt::Debug;

use async_trait::async_trait;

pub use error::ClientError;
#[cfg(feature = "http")]
pub use http::{HttpTelemetryClient, HttpTelemetryClientBuilder};

// Re-export types for convenience
pub use fibersight_types::{FiberInfo, FiberTraceRequest, MetricKey, MetricState};

/// A source of metric and fiber telemetry.
///
/// Implementations are shared between poll loops, so they must be usable
/// concurrently from several tasks.
#[async_trait]
pub trait TelemetryClient: Send + Sync + Debug {
    /// List every metric key the source currently offers.
    async fn fetch_metric_keys(&self) -> Result<Vec<MetricKey>, ClientError>;

    /// Fetch the current state of each requested metric id.
    ///
    /// Ids the source does not know are omitted from the result.
    async fn fetch_metric_states(&self, ids: &[String]) -> Result<Vec<MetricState>, ClientError>;

    /// Fetch fiber infos matching `request`. Filtering happens at the source.
    async fn fetch_fibers(&self, request: &FiberTraceRequest) -> Result<Vec<FiberInfo>, ClientError>;
}
