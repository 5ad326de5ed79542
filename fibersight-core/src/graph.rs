//! Per-panel derived time series.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use fibersight_types::{MetricKey, MetricState};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::broadcast::{BoundedBroadcast, Updates};
use crate::metrics::MetricsManager;
use crate::series::{entries_from_state, GraphData, TimeSeries, TimeSeriesKey};

/// Unread snapshots retained per subscriber of a panel's channel.
const SNAPSHOT_CAPACITY: usize = 16;

/// Mutable state shared between the service handle and its consumer task.
#[derive(Debug)]
struct GraphState {
    /// Observed keys by metric id.
    metrics: BTreeMap<String, MetricKey>,
    series: BTreeMap<TimeSeriesKey, TimeSeries>,
    max_entries: usize,
}

impl GraphState {
    fn snapshot(&self) -> GraphData {
        self.series.values().collect()
    }

    /// Fold one state into the series. Returns a fresh snapshot if the
    /// state belonged to an observed metric.
    fn apply(&mut self, state: &MetricState) -> Option<GraphData> {
        if !self.metrics.contains_key(&state.id) {
            return None;
        }

        let max_entries = self.max_entries;
        for entry in entries_from_state(state) {
            self.series
                .entry(entry.series.clone())
                .or_insert_with(|| TimeSeries::new(entry.series.clone(), max_entries))
                .record(entry);
        }

        Some(self.snapshot())
    }
}

/// Maintains one panel's time series from the manager's shared stream.
///
/// Each service holds a subscription in the manager's registry so the poll
/// query includes the panel's metrics, filters the shared stream for those
/// metrics, and republishes a [`GraphData`] snapshot on its own channel
/// after every relevant update.
#[derive(Debug)]
pub struct GraphDataService {
    panel_id: String,
    subscription_id: String,
    manager: MetricsManager,
    state: Arc<Mutex<GraphState>>,
    data: BoundedBroadcast<GraphData>,
    closed: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl GraphDataService {
    /// Create a service and spawn its consumer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(panel_id: impl Into<String>, manager: &MetricsManager, max_entries: usize) -> Self {
        let panel_id = panel_id.into();
        let subscription_id = manager.create_subscription(BTreeSet::new());
        let closed = manager
            .subscription_closed(&subscription_id)
            .unwrap_or_default();

        let state = Arc::new(Mutex::new(GraphState {
            metrics: BTreeMap::new(),
            series: BTreeMap::new(),
            max_entries: max_entries.max(1),
        }));
        let data = BoundedBroadcast::new(SNAPSHOT_CAPACITY);

        // Subscribe before spawning so nothing published in between is missed.
        let updates = manager.updates().take_until(closed.clone());
        let task = tokio::spawn(consume(
            panel_id.clone(),
            updates,
            state.clone(),
            data.clone(),
        ));

        info!(panel_id = %panel_id, subscription_id = %subscription_id, "Graph data service started");

        Self {
            panel_id,
            subscription_id,
            manager: manager.clone(),
            state,
            data,
            closed,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn panel_id(&self) -> &str {
        &self.panel_id
    }

    /// The id of this service's subscription in the manager's registry.
    pub fn id(&self) -> &str {
        &self.subscription_id
    }

    /// Replace the observed metrics.
    ///
    /// Updates the manager's registry to match and drops series whose
    /// metric is no longer observed.
    pub fn set_metrics<I>(&self, keys: I)
    where
        I: IntoIterator<Item = MetricKey>,
    {
        let metrics: BTreeMap<String, MetricKey> =
            keys.into_iter().map(|key| (key.id.clone(), key)).collect();
        let ids: BTreeSet<String> = metrics.keys().cloned().collect();

        {
            let mut state = self.state.lock();
            state
                .series
                .retain(|key, _| metrics.contains_key(&key.metric_id));
            state.metrics = metrics;
        }

        let count = ids.len();
        // A closed service's subscription is gone and must stay gone.
        if self
            .manager
            .update_subscription(&self.subscription_id, move |_| ids)
        {
            debug!(panel_id = %self.panel_id, metrics = count, "Panel metrics updated");
        }
    }

    /// Currently observed metrics, ordered by id.
    pub fn metrics(&self) -> Vec<MetricKey> {
        self.state.lock().metrics.values().cloned().collect()
    }

    /// Observe one more metric.
    pub fn add_metric(&self, key: MetricKey) {
        let mut keys = self.metrics();
        keys.retain(|k| k.id != key.id);
        keys.push(key);
        self.set_metrics(keys);
    }

    /// Stop observing a metric by id.
    pub fn remove_metric(&self, id: &str) {
        let keys = self.metrics().into_iter().filter(|k| k.id != id);
        self.set_metrics(keys);
    }

    /// Change the capacity of every tracked series and of series created
    /// from now on.
    pub fn set_max_entries(&self, max_entries: usize) {
        let max_entries = max_entries.max(1);
        let mut state = self.state.lock();
        state.max_entries = max_entries;
        for series in state.series.values_mut() {
            series.update_max_entries(max_entries);
        }
    }

    pub fn max_entries(&self) -> usize {
        self.state.lock().max_entries
    }

    /// Snapshot of every tracked series.
    pub fn current(&self) -> GraphData {
        self.state.lock().snapshot()
    }

    /// Subscribe to the snapshots published after each relevant update.
    pub fn data(&self) -> Updates<GraphData> {
        self.data.subscribe()
    }

    /// Stop the consumer task, leave the manager's registry and close the
    /// snapshot channel. Safe to call more than once.
    pub fn close(&self) {
        let task = self.task.lock().take();
        let Some(task) = task else {
            return;
        };

        self.closed.cancel();
        self.manager.remove_subscription(&self.subscription_id);
        self.data.close();
        task.abort();

        info!(panel_id = %self.panel_id, "Graph data service closed");
    }

    /// Whether the service was closed or its subscription removed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl Drop for GraphDataService {
    fn drop(&mut self) {
        self.close();
    }
}

async fn consume(
    panel_id: String,
    mut updates: Updates<MetricState>,
    state: Arc<Mutex<GraphState>>,
    data: BoundedBroadcast<GraphData>,
) {
    while let Some(metric) = updates.recv().await {
        let snapshot = state.lock().apply(&metric);
        if let Some(snapshot) = snapshot {
            data.publish(snapshot);
        }
    }

    debug!(panel_id = %panel_id, "Graph consumer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibersight_types::{MetricType, MetricValue, Timestamp};

    fn state_with(metrics: &[&str]) -> GraphState {
        GraphState {
            metrics: metrics
                .iter()
                .map(|id| (id.to_string(), MetricKey::new(*id, *id, MetricType::Gauge)))
                .collect(),
            series: BTreeMap::new(),
            max_entries: 2,
        }
    }

    fn gauge(id: &str, when: u64, value: f64) -> MetricState {
        MetricState::new(
            MetricKey::new(id, id, MetricType::Gauge),
            MetricValue::Gauge { value },
            Timestamp(when),
        )
    }

    #[test]
    fn apply_ignores_unobserved_metrics() {
        let mut state = state_with(&["a"]);
        assert!(state.apply(&gauge("b", 1, 1.0)).is_none());
        assert!(state.series.is_empty());
    }

    #[test]
    fn apply_creates_series_lazily_at_current_capacity() {
        let mut state = state_with(&["a"]);
        let snapshot = state.apply(&gauge("a", 1, 1.0)).unwrap();

        assert_eq!(snapshot.len(), 1);
        let series = state.series.get(&TimeSeriesKey::new("a")).unwrap();
        assert_eq!(series.max_entries(), 2);
    }

    #[test]
    fn apply_keeps_series_bounded() {
        let mut state = state_with(&["a"]);
        for when in 1..=5 {
            state.apply(&gauge("a", when, when as f64));
        }

        let snapshot = state.snapshot();
        let entries = snapshot.get(&TimeSeriesKey::new("a")).unwrap();
        let values: Vec<f64> = entries.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![4.0, 5.0]);
    }
}
