//! # fibersight-core
//!
//! The metrics subscription and aggregation pipeline behind the fibersight
//! dashboard.
//!
//! A [`MetricsManager`] polls a [`TelemetryClient`] on a fixed schedule for
//! the union of every subscriber's metric ids and fans the results out on a
//! bounded broadcast channel. Each dashboard panel owns a
//! [`GraphDataService`] that filters that shared stream for its own metrics
//! and maintains memory-bounded [`TimeSeries`], republishing a [`GraphData`]
//! snapshot after every relevant update. A [`FiberDataService`] runs a
//! parallel pipeline for fiber trace data.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fibersight_core::{Dashboard, DashboardConfig};
//! use fibersight_types::{MetricKey, MetricType};
//!
//! #[tokio::main]
//! async fn main() {
//!     let dashboard = Dashboard::connect(&DashboardConfig::default());
//!     dashboard.start();
//!
//!     let panel = dashboard.panels().register("latency").unwrap();
//!     panel.set_metrics([MetricKey::new("p99", "request_latency", MetricType::Gauge)]);
//!
//!     let mut data = panel.data();
//!     if let Some(snapshot) = data.recv().await {
//!         println!("{} series", snapshot.len());
//!     }
//!
//!     dashboard.shutdown().await;
//! }
//! ```
//!
//! ## Delivery
//!
//! Every channel is bounded and drops the oldest unread items for a slow
//! subscriber; the poller never waits on a consumer. Consumers always
//! re-derive whole snapshots, so losing an intermediate update is harmless.
//!
//! [`TelemetryClient`]: fibersight_client::TelemetryClient

mod broadcast;
mod config;
mod dashboard;
mod error;
mod fibers;
mod graph;
mod ids;
mod metrics;
mod panels;
mod poller;
mod registry;
mod series;

pub use broadcast::{BoundedBroadcast, Updates};
pub use config::DashboardConfig;
pub use dashboard::Dashboard;
pub use error::PanelError;
pub use fibers::{FiberDataService, FiberDataServiceBuilder, FiberSubscription};
pub use graph::GraphDataService;
pub use ids::{IdGenerator, MonotonicIds};
pub use metrics::{MetricsManager, MetricsManagerBuilder};
pub use panels::GraphDataManager;
pub use poller::PollerHandle;
pub use registry::SubscriptionRegistry;
pub use series::{
    entries_from_state, GraphData, TimeSeries, TimeSeriesEntry, TimeSeriesKey,
    DEFAULT_MAX_ENTRIES,
};

// Re-export types for convenience
pub use fibersight_types::{
    FiberId, FiberInfo, FiberStatus, FiberTraceRequest, MetricKey, MetricState, MetricType,
    MetricValue, Timestamp,
};
