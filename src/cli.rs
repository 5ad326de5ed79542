//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use fibersight_core::DashboardConfig;
use fibersight_types::FiberTraceRequest;

#[derive(Parser, Debug)]
#[command(name = "fibersight")]
#[command(about = "Stream metric time series and fiber traces from a telemetry source")]
pub struct Cli {
    /// Telemetry source base URL (overrides config)
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Metric id to plot; repeat for several
    #[arg(short, long = "metric", value_name = "ID")]
    pub metrics: Vec<String>,

    /// Print the metric keys the source offers and exit
    #[arg(long, conflicts_with_all = ["metrics", "fibers"])]
    pub list_keys: bool,

    /// Stream fiber batches instead of metrics
    #[arg(long, conflicts_with = "metrics")]
    pub fibers: bool,

    /// Only fetch fibers that are currently running
    #[arg(long, requires = "fibers")]
    pub active_only: bool,

    /// Restrict fibers to the tree under this fiber id
    #[arg(long, value_name = "FIBER", requires = "fibers")]
    pub root: Option<u64>,

    /// Fiber id to trace; repeat for several
    #[arg(long = "trace", value_name = "FIBER", requires = "fibers")]
    pub traced: Vec<u64>,

    /// Samples kept per series (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_entries: Option<u64>,

    /// Poll interval in milliseconds for both pipelines (overrides config)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: Option<u64>,

    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Apply flag overrides on top of a loaded config.
    pub fn apply(&self, config: &mut DashboardConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(max_entries) = self.max_entries {
            config.max_entries = usize::try_from(max_entries).unwrap_or(usize::MAX);
        }
        if let Some(interval_ms) = self.interval_ms {
            config.metrics_poll_interval_ms = interval_ms;
            config.fiber_poll_interval_ms = interval_ms;
        }
    }

    /// The fiber filter described by the flags.
    pub fn trace_request(&self) -> FiberTraceRequest {
        let mut request = FiberTraceRequest::new().active_only(self.active_only);
        request.root_fiber_id = self.root;
        request.traced_ids.extend(self.traced.iter().copied());
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_metrics_are_collected() {
        let cli = Cli::try_parse_from(["fibersight", "-m", "a", "--metric", "b"]).unwrap();
        assert_eq!(cli.metrics, vec!["a", "b"]);
        assert!(!cli.fibers);
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "fibersight",
            "--endpoint",
            "http://telemetry:1111",
            "--max-entries",
            "5",
            "--interval-ms",
            "250",
        ])
        .unwrap();

        let mut config = DashboardConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.endpoint, "http://telemetry:1111");
        assert_eq!(config.max_entries, 5);
        assert_eq!(config.metrics_poll_interval_ms, 250);
        assert_eq!(config.fiber_poll_interval_ms, 250);
        assert_eq!(config.broadcast_capacity, 128);
    }

    #[test]
    fn fiber_flags_build_trace_request() {
        let cli = Cli::try_parse_from([
            "fibersight",
            "--fibers",
            "--active-only",
            "--root",
            "3",
            "--trace",
            "7",
            "--trace",
            "9",
        ])
        .unwrap();

        assert_eq!(
            cli.trace_request(),
            FiberTraceRequest::new().active_only(true).root(3).trace(7).trace(9)
        );
    }

    #[test]
    fn zero_interval_and_capacity_are_rejected() {
        assert!(Cli::try_parse_from(["fibersight", "--interval-ms", "0"]).is_err());
        assert!(Cli::try_parse_from(["fibersight", "-i", "0"]).is_err());
        assert!(Cli::try_parse_from(["fibersight", "--max-entries", "0"]).is_err());

        let cli = Cli::try_parse_from(["fibersight", "--interval-ms", "1"]).unwrap();
        assert_eq!(cli.interval_ms, Some(1));
    }

    #[test]
    fn trace_flags_require_fibers() {
        assert!(Cli::try_parse_from(["fibersight", "--active-only"]).is_err());
        assert!(Cli::try_parse_from(["fibersight", "--list-keys", "-m", "a"]).is_err());
    }
}
