//! Dashboard configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::series::DEFAULT_MAX_ENTRIES;

/// Settings shared by every component of a [`Dashboard`](crate::Dashboard).
///
/// Every field has a default, so a partial config file is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Telemetry source base URL.
    pub endpoint: String,
    /// Metrics poll interval in milliseconds.
    pub metrics_poll_interval_ms: u64,
    /// Fiber poll interval in milliseconds.
    pub fiber_poll_interval_ms: u64,
    /// Capacity of every broadcast channel.
    pub broadcast_capacity: usize,
    /// Default time series capacity for new panels.
    pub max_entries: usize,
    /// HTTP request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            metrics_poll_interval_ms: 3000,
            fiber_poll_interval_ms: 3000,
            broadcast_capacity: 128,
            max_entries: DEFAULT_MAX_ENTRIES,
            request_timeout_ms: 10_000,
        }
    }
}

impl DashboardConfig {
    pub fn metrics_poll_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_poll_interval_ms)
    }

    pub fn fiber_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fiber_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DashboardConfig::default();
        assert_eq!(config.metrics_poll_interval(), Duration::from_secs(3));
        assert_eq!(config.fiber_poll_interval(), Duration::from_secs(3));
        assert_eq!(config.max_entries, 20);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: DashboardConfig =
            serde_json::from_str(r#"{"endpoint": "http://telemetry:1111", "max_entries": 50}"#).unwrap();

        assert_eq!(config.endpoint, "http://telemetry:1111");
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.broadcast_capacity, 128);
    }
}
