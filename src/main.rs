use std::io::Write;

use anyhow::{bail, Result};
use clap::Parser;
use fibersight::{settings, telemetry, Cli};
use fibersight_core::{Dashboard, MetricKey, MetricType};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json);

    let mut config = settings::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    info!(endpoint = %config.endpoint, "Using telemetry source");

    let dashboard = Dashboard::connect(&config);

    if cli.list_keys {
        return list_keys(&dashboard).await;
    }

    let result = if cli.fibers {
        stream_fibers(&dashboard, &cli).await
    } else {
        stream_metrics(&dashboard, &cli.metrics).await
    };

    dashboard.shutdown().await;
    result
}

/// Print each available metric key as one JSON line.
async fn list_keys(dashboard: &Dashboard) -> Result<()> {
    let keys = dashboard.metrics().available_keys().await;
    if keys.is_empty() {
        warn!("Telemetry source offered no metric keys");
    }

    let mut stdout = std::io::stdout().lock();
    for key in keys {
        writeln!(stdout, "{}", serde_json::to_string(&key)?)?;
    }
    Ok(())
}

/// Plot `ids` on a single panel until interrupted.
async fn stream_metrics(dashboard: &Dashboard, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        bail!("Nothing to plot: pass at least one --metric, or use --list-keys or --fibers");
    }

    let available = dashboard.metrics().available_keys().await;
    let keys: Vec<MetricKey> = ids
        .iter()
        .map(|id| match available.iter().find(|key| &key.id == id) {
            Some(key) => key.clone(),
            None => {
                warn!(metric_id = %id, "Metric not offered by source, plotting as gauge");
                MetricKey::new(id.as_str(), id.as_str(), MetricType::Gauge)
            }
        })
        .collect();

    let panel = dashboard.panels().register("cli")?;
    panel.set_metrics(keys);
    let mut data = panel.data();
    dashboard.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
            snapshot = data.recv() => match snapshot {
                Some(snapshot) => println!("{}", serde_json::to_string(&snapshot)?),
                None => return Ok(()),
            },
        }
    }
}

/// Print fiber batches matching the flags until interrupted.
async fn stream_fibers(dashboard: &Dashboard, cli: &Cli) -> Result<()> {
    let fibers = dashboard.fibers();
    fibers.set_trace_request(cli.trace_request());
    let mut subscription = fibers.create_subscription();
    let subscription_id = subscription.id().to_string();
    dashboard.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                fibers.remove_subscription(&subscription_id);
                return Ok(());
            }
            batch = subscription.recv() => match batch {
                Some(batch) => println!("{}", serde_json::to_string(&batch)?),
                None => return Ok(()),
            },
        }
    }
}
