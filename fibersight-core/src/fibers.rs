//! The fiber data service: trace-filtered polling of fiber infos.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use fibersight_client::TelemetryClient;
use fibersight_types::{FiberInfo, FiberTraceRequest};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::broadcast::{BoundedBroadcast, Updates};
use crate::config::DashboardConfig;
use crate::ids::{IdGenerator, MonotonicIds};
use crate::poller::{spawn_poller, PollerHandle, PollerSlot, MIN_POLL_INTERVAL};
use crate::registry::SubscriptionRegistry;

/// Polls the telemetry source for fiber infos while anyone is subscribed.
///
/// The [`FiberTraceRequest`] is read at the start of every tick, so
/// changing it takes effect on the next poll without restarting the
/// daemon. Cloning yields another handle to the same service.
#[derive(Debug, Clone)]
pub struct FiberDataService {
    inner: Arc<FiberInner>,
}

#[derive(Debug)]
struct FiberInner {
    client: Arc<dyn TelemetryClient>,
    registry: SubscriptionRegistry<u64>,
    request: RwLock<FiberTraceRequest>,
    updates: BoundedBroadcast<Vec<FiberInfo>>,
    interval: Duration,
    shutdown: CancellationToken,
    poller: PollerSlot,
}

/// A registered interest in fiber batches.
///
/// The stream ends once the subscription is removed from its service.
#[derive(Debug)]
pub struct FiberSubscription {
    id: String,
    updates: Updates<Vec<FiberInfo>>,
}

impl FiberSubscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next batch. `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Vec<FiberInfo>> {
        self.updates.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Vec<FiberInfo>> {
        self.updates.try_recv()
    }
}

impl FiberDataService {
    pub fn builder(client: Arc<dyn TelemetryClient>) -> FiberDataServiceBuilder {
        FiberDataServiceBuilder::new(client)
    }

    /// The filter the next poll will send.
    pub fn trace_request(&self) -> FiberTraceRequest {
        self.inner.request.read().clone()
    }

    pub fn set_trace_request(&self, request: FiberTraceRequest) {
        debug!(?request, "Trace request replaced");
        *self.inner.request.write() = request;
    }

    /// Mutate the filter in place.
    pub fn update_trace_request<F>(&self, f: F)
    where
        F: FnOnce(&mut FiberTraceRequest),
    {
        let mut request = self.inner.request.write();
        f(&mut request);
        debug!(request = ?*request, "Trace request updated");
    }

    /// Register interest in fiber batches. Any live subscription enables
    /// polling.
    pub fn create_subscription(&self) -> FiberSubscription {
        // Subscribe first so the first batch after registration is seen.
        let updates = self.inner.updates.subscribe();
        let id = self.inner.registry.create(BTreeSet::new());
        let closed = self
            .inner
            .registry
            .closed_signal(&id)
            .unwrap_or_default();

        debug!(subscription_id = %id, "Fiber subscription created");
        FiberSubscription {
            id,
            updates: updates.take_until(closed),
        }
    }

    /// Remove a subscription, ending its stream.
    ///
    /// Returns `true` if it existed.
    pub fn remove_subscription(&self, id: &str) -> bool {
        let removed = self.inner.registry.remove(id);
        if removed {
            debug!(subscription_id = %id, "Fiber subscription removed");
        }
        removed
    }

    pub fn subscription_ids(&self) -> Vec<String> {
        self.inner.registry.subscription_ids()
    }

    /// Run one poll tick and return the number of fibers published.
    ///
    /// Does nothing without subscribers. Fetch failures are logged and
    /// count as an empty result; empty batches are not published.
    pub async fn poll(&self) -> usize {
        if self.inner.registry.is_empty() {
            return 0;
        }

        let request = self.trace_request();
        let fibers = match self.inner.client.fetch_fibers(&request).await {
            Ok(fibers) => fibers,
            Err(e) => {
                warn!(error = %e, "Fiber poll failed");
                Vec::new()
            }
        };

        if fibers.is_empty() {
            return 0;
        }

        let count = fibers.len();
        self.inner.updates.publish(fibers);
        debug!(fibers = count, "Published fiber batch");
        count
    }

    /// Spawn the poll daemon. See [`MetricsManager::start`](crate::MetricsManager::start).
    pub fn start(&self) -> Option<PollerHandle> {
        self.inner.poller.start_with(|| {
            let service = self.clone();
            spawn_poller(
                "fibers",
                self.inner.interval,
                &self.inner.shutdown,
                move || {
                    let service = service.clone();
                    async move { service.poll().await }
                },
            )
        })
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }
}

/// Builder for FiberDataService.
#[derive(Debug)]
pub struct FiberDataServiceBuilder {
    client: Arc<dyn TelemetryClient>,
    ids: Option<Arc<dyn IdGenerator>>,
    request: FiberTraceRequest,
    interval: Option<Duration>,
    capacity: Option<usize>,
    shutdown: Option<CancellationToken>,
}

impl FiberDataServiceBuilder {
    pub fn new(client: Arc<dyn TelemetryClient>) -> Self {
        Self {
            client,
            ids: None,
            request: FiberTraceRequest::default(),
            interval: None,
            capacity: None,
            shutdown: None,
        }
    }

    /// Take interval and channel capacity from a dashboard config.
    pub fn config(self, config: &DashboardConfig) -> Self {
        self.interval(config.fiber_poll_interval())
            .capacity(config.broadcast_capacity)
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Set the initial trace request.
    pub fn request(mut self, request: FiberTraceRequest) -> Self {
        self.request = request;
        self
    }

    /// Set the poll interval (default: 3 seconds, minimum: 1 millisecond).
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval.max(MIN_POLL_INTERVAL));
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn build(self) -> FiberDataService {
        let ids = self.ids.unwrap_or_else(|| Arc::new(MonotonicIds::new()));

        FiberDataService {
            inner: Arc::new(FiberInner {
                client: self.client,
                registry: SubscriptionRegistry::new("fibers", ids),
                request: RwLock::new(self.request),
                updates: BoundedBroadcast::new(self.capacity.unwrap_or(128)),
                interval: self.interval.unwrap_or(Duration::from_millis(3000)),
                shutdown: self.shutdown.unwrap_or_default(),
                poller: PollerSlot::default(),
            }),
        }
    }
}
