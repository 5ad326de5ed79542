//! Registry of graph data services keyed by panel id.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::error::PanelError;
use crate::graph::GraphDataService;
use crate::metrics::MetricsManager;

/// Owns the lifecycle of every panel's [`GraphDataService`].
///
/// At most one live service exists per panel id.
#[derive(Debug)]
pub struct GraphDataManager {
    metrics: MetricsManager,
    max_entries: usize,
    services: Mutex<BTreeMap<String, Arc<GraphDataService>>>,
}

impl GraphDataManager {
    /// Create a manager whose services subscribe to `metrics` and start
    /// with `max_entries` per series.
    pub fn new(metrics: MetricsManager, max_entries: usize) -> Self {
        Self {
            metrics,
            max_entries,
            services: Mutex::new(BTreeMap::new()),
        }
    }

    /// Create and store a service for `panel_id`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `PanelError::AlreadyRegistered` if the panel already has a
    /// service.
    pub fn register(&self, panel_id: &str) -> Result<Arc<GraphDataService>, PanelError> {
        let mut services = self.services.lock();
        if services.contains_key(panel_id) {
            return Err(PanelError::AlreadyRegistered(panel_id.to_string()));
        }

        let service = Arc::new(GraphDataService::new(
            panel_id,
            &self.metrics,
            self.max_entries,
        ));
        services.insert(panel_id.to_string(), service.clone());

        info!(panel_id, panels = services.len(), "Panel registered");
        Ok(service)
    }

    /// The service for `panel_id`.
    ///
    /// # Errors
    ///
    /// Returns `PanelError::NotFound` if the panel is not registered.
    pub fn lookup(&self, panel_id: &str) -> Result<Arc<GraphDataService>, PanelError> {
        self.services
            .lock()
            .get(panel_id)
            .cloned()
            .ok_or_else(|| PanelError::NotFound(panel_id.to_string()))
    }

    /// Close and remove the service for `panel_id`.
    ///
    /// Returns `true` if the panel was registered, `false` otherwise.
    pub fn deregister(&self, panel_id: &str) -> bool {
        let removed = self.services.lock().remove(panel_id);
        match removed {
            Some(service) => {
                service.close();
                info!(panel_id, "Panel deregistered");
                true
            }
            None => false,
        }
    }

    /// Close and remove every service.
    pub fn close_all(&self) {
        let drained = std::mem::take(&mut *self.services.lock());
        for service in drained.into_values() {
            service.close();
        }
    }

    pub fn panels(&self) -> Vec<String> {
        self.services.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.services.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.lock().is_empty()
    }

    /// Capacity handed to newly registered services.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn metrics(&self) -> &MetricsManager {
        &self.metrics
    }
}
