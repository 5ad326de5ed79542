//! Wiring of every pipeline component under one shutdown scope.

use std::sync::Arc;

use fibersight_client::{HttpTelemetryClient, TelemetryClient};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::DashboardConfig;
use crate::fibers::FiberDataService;
use crate::ids::{IdGenerator, MonotonicIds};
use crate::metrics::MetricsManager;
use crate::panels::GraphDataManager;
use crate::poller::PollerHandle;

/// The metrics manager, panel registry and fiber service of one dashboard.
///
/// Both poll daemons run under a single cancellation token so they can be
/// stopped together.
#[derive(Debug)]
pub struct Dashboard {
    metrics: MetricsManager,
    panels: GraphDataManager,
    fibers: FiberDataService,
    shutdown: CancellationToken,
    pollers: Mutex<Vec<PollerHandle>>,
}

impl Dashboard {
    pub fn new(
        client: Arc<dyn TelemetryClient>,
        ids: Arc<dyn IdGenerator>,
        config: &DashboardConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();

        let metrics = MetricsManager::builder(client.clone())
            .config(config)
            .ids(ids.clone())
            .shutdown(shutdown.clone())
            .build();
        let fibers = FiberDataService::builder(client)
            .config(config)
            .ids(ids)
            .shutdown(shutdown.clone())
            .build();
        let panels = GraphDataManager::new(metrics.clone(), config.max_entries);

        Self {
            metrics,
            panels,
            fibers,
            shutdown,
            pollers: Mutex::new(Vec::new()),
        }
    }

    /// Build a dashboard backed by the HTTP client for `config.endpoint`.
    pub fn connect(config: &DashboardConfig) -> Self {
        let client = HttpTelemetryClient::builder()
            .endpoint(&config.endpoint)
            .timeout(config.request_timeout())
            .build();
        Self::new(Arc::new(client), Arc::new(MonotonicIds::new()), config)
    }

    /// Spawn both poll daemons. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut pollers = self.pollers.lock();
        if !pollers.is_empty() || self.shutdown.is_cancelled() {
            return;
        }
        pollers.extend(self.metrics.start());
        pollers.extend(self.fibers.start());
        info!("Dashboard started");
    }

    pub fn metrics(&self) -> &MetricsManager {
        &self.metrics
    }

    pub fn panels(&self) -> &GraphDataManager {
        &self.panels
    }

    pub fn fibers(&self) -> &FiberDataService {
        &self.fibers
    }

    /// Token cancelled on shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Close every panel, stop both daemons and wait for them to exit.
    pub async fn shutdown(&self) {
        self.panels.close_all();
        self.shutdown.cancel();

        let pollers = std::mem::take(&mut *self.pollers.lock());
        for poller in pollers {
            poller.join().await;
        }
        info!("Dashboard stopped");
    }
}
