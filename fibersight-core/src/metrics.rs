//! The metrics manager: subscription registry, poll loop and shared
//! metric-state broadcast.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use fibersight_client::TelemetryClient;
use fibersight_types::{MetricKey, MetricState};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::{BoundedBroadcast, Updates};
use crate::config::DashboardConfig;
use crate::ids::{IdGenerator, MonotonicIds};
use crate::poller::{spawn_poller, PollerHandle, PollerSlot, MIN_POLL_INTERVAL};
use crate::registry::SubscriptionRegistry;

/// Polls the telemetry source for the union of every subscriber's metric
/// ids and publishes each returned state on a shared broadcast channel.
///
/// Cloning yields another handle to the same manager.
///
/// # Example
///
/// ```rust,no_run
/// use std::collections::BTreeSet;
/// use std::sync::Arc;
/// use fibersight_client::HttpTelemetryClient;
/// use fibersight_core::MetricsManager;
///
/// #[tokio::main]
/// async fn main() {
///     let client = Arc::new(HttpTelemetryClient::builder().build());
///     let manager = MetricsManager::builder(client).build();
///
///     let mut updates = manager.updates();
///     manager.create_subscription(BTreeSet::from(["requests".to_string()]));
///
///     let _poller = manager.start();
///     while let Some(state) = updates.recv().await {
///         println!("{} -> {:?}", state.key.name, state.value);
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MetricsManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    client: Arc<dyn TelemetryClient>,
    registry: SubscriptionRegistry<String>,
    updates: BoundedBroadcast<MetricState>,
    interval: Duration,
    shutdown: CancellationToken,
    poller: PollerSlot,
}

impl MetricsManager {
    /// Create a builder for configuring the manager.
    pub fn builder(client: Arc<dyn TelemetryClient>) -> MetricsManagerBuilder {
        MetricsManagerBuilder::new(client)
    }

    /// Register an interest set and return its id.
    pub fn create_subscription(&self, keys: BTreeSet<String>) -> String {
        let id = self.inner.registry.create(keys);
        debug!(subscription_id = %id, "Metrics subscription created");
        id
    }

    /// Remove a subscription. Removing an unknown id is a no-op.
    pub fn remove_subscription(&self, id: &str) {
        if self.inner.registry.remove(id) {
            debug!(subscription_id = %id, "Metrics subscription removed");
        }
    }

    /// Replace a subscription's interest set with `f(current)`.
    pub fn modify_subscription<F>(&self, id: &str, f: F)
    where
        F: FnOnce(BTreeSet<String>) -> BTreeSet<String>,
    {
        self.inner.registry.modify(id, f);
    }

    /// Like [`modify_subscription`](Self::modify_subscription), but only for
    /// a subscription that is still registered. Returns `false` and leaves
    /// the registry untouched otherwise.
    pub fn update_subscription<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(BTreeSet<String>) -> BTreeSet<String>,
    {
        self.inner.registry.modify_existing(id, f)
    }

    /// Union of every subscription's metric ids; the next poll's query.
    pub fn registered_keys(&self) -> BTreeSet<String> {
        self.inner.registry.registered_keys()
    }

    /// A token cancelled once the subscription is removed or the manager
    /// is reset.
    pub fn subscription_closed(&self, id: &str) -> Option<CancellationToken> {
        self.inner.registry.closed_signal(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Subscribe to every metric state published from now on.
    pub fn updates(&self) -> Updates<MetricState> {
        self.inner.updates.subscribe()
    }

    /// Run one poll tick and return the number of states published.
    ///
    /// With no registered keys nothing is fetched. Fetch failures are
    /// logged and count as an empty result.
    pub async fn poll(&self) -> usize {
        let keys = self.registered_keys();
        if keys.is_empty() {
            return 0;
        }

        let ids: Vec<String> = keys.into_iter().collect();
        let states = match self.inner.client.fetch_metric_states(&ids).await {
            Ok(states) => states,
            Err(e) => {
                warn!(error = %e, keys = ids.len(), "Metrics poll failed");
                Vec::new()
            }
        };

        let published = states.len();
        for state in states {
            self.inner.updates.publish(state);
        }

        debug!(requested = ids.len(), published, "Published metric states");
        published
    }

    /// Metric keys the telemetry source offers. Failures yield an empty list.
    pub async fn available_keys(&self) -> Vec<MetricKey> {
        match self.inner.client.fetch_metric_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to list metric keys");
                Vec::new()
            }
        }
    }

    /// Drop every subscription.
    pub fn reset(&self) {
        self.inner.registry.reset();
        info!("Metrics subscriptions reset");
    }

    /// Spawn the poll daemon.
    ///
    /// It runs until stopped through the returned handle or until the
    /// manager's shutdown token is cancelled. Returns `None` if a daemon
    /// started earlier is still running.
    pub fn start(&self) -> Option<PollerHandle> {
        self.inner.poller.start_with(|| {
            let manager = self.clone();
            spawn_poller(
                "metrics",
                self.inner.interval,
                &self.inner.shutdown,
                move || {
                    let manager = manager.clone();
                    async move { manager.poll().await }
                },
            )
        })
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }
}

/// Builder for MetricsManager.
#[derive(Debug)]
pub struct MetricsManagerBuilder {
    client: Arc<dyn TelemetryClient>,
    ids: Option<Arc<dyn IdGenerator>>,
    interval: Option<Duration>,
    capacity: Option<usize>,
    shutdown: Option<CancellationToken>,
}

impl MetricsManagerBuilder {
    pub fn new(client: Arc<dyn TelemetryClient>) -> Self {
        Self {
            client,
            ids: None,
            interval: None,
            capacity: None,
            shutdown: None,
        }
    }

    /// Take interval and channel capacity from a dashboard config.
    pub fn config(self, config: &DashboardConfig) -> Self {
        self.interval(config.metrics_poll_interval())
            .capacity(config.broadcast_capacity)
    }

    /// Set the subscription id generator (default: [`MonotonicIds`]).
    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Set the poll interval (default: 3 seconds, minimum: 1 millisecond).
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval.max(MIN_POLL_INTERVAL));
        self
    }

    /// Set the broadcast channel capacity (default: 128).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Stop the poll daemon when `token` is cancelled.
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn build(self) -> MetricsManager {
        let ids = self.ids.unwrap_or_else(|| Arc::new(MonotonicIds::new()));

        MetricsManager {
            inner: Arc::new(Inner {
                client: self.client,
                registry: SubscriptionRegistry::new("metrics", ids),
                updates: BoundedBroadcast::new(self.capacity.unwrap_or(128)),
                interval: self.interval.unwrap_or(Duration::from_millis(3000)),
                shutdown: self.shutdown.unwrap_or_default(),
                poller: PollerSlot::default(),
            }),
        }
    }
}
