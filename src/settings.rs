//! Layered dashboard configuration.
//!
//! Values are resolved in order, later sources winning:
//! built-in defaults, an optional TOML file, then `FIBERSIGHT_*`
//! environment variables. Command-line flags are applied on top by the
//! binary.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use fibersight_core::DashboardConfig;

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "FIBERSIGHT";

/// Load the dashboard config from `path` (if any) and the environment.
pub fn load(path: Option<&Path>) -> Result<DashboardConfig> {
    load_with_prefix(path, ENV_PREFIX)
}

/// Like [`load`], reading environment overrides under `prefix`.
pub fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<DashboardConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    let config = builder
        .add_source(Environment::with_prefix(prefix).try_parsing(true))
        .build()
        .context("Failed to read configuration")?;

    let config: DashboardConfig = config
        .try_deserialize()
        .context("Invalid configuration")?;
    validate(&config)?;
    Ok(config)
}

/// Reject values the pipelines cannot run with.
fn validate(config: &DashboardConfig) -> Result<()> {
    ensure!(
        config.metrics_poll_interval_ms > 0,
        "metrics_poll_interval_ms must be at least 1"
    );
    ensure!(
        config.fiber_poll_interval_ms > 0,
        "fiber_poll_interval_ms must be at least 1"
    );
    ensure!(config.max_entries > 0, "max_entries must be at least 1");
    ensure!(
        config.broadcast_capacity > 0,
        "broadcast_capacity must be at least 1"
    );
    Ok(())
}
