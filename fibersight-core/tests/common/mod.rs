//! A scripted in-memory telemetry source.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fibersight_client::{ClientError, TelemetryClient};
use fibersight_types::{
    FiberId, FiberInfo, FiberStatus, FiberTraceRequest, MetricKey, MetricState, MetricType,
    MetricValue, Timestamp,
};

#[derive(Debug, Default)]
pub struct FakeTelemetry {
    keys: Mutex<Vec<MetricKey>>,
    states: Mutex<Vec<MetricState>>,
    fibers: Mutex<Vec<FiberInfo>>,
    state_requests: Mutex<Vec<Vec<String>>>,
    fiber_requests: Mutex<Vec<FiberTraceRequest>>,
    failing: AtomicBool,
}

impl FakeTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_keys(&self, keys: Vec<MetricKey>) {
        *self.keys.lock().unwrap() = keys;
    }

    /// States served to every fetch; only requested ids are returned.
    pub fn set_states(&self, states: Vec<MetricState>) {
        *self.states.lock().unwrap() = states;
    }

    /// Fibers served to every fetch; `active_only` requests get the
    /// running ones.
    pub fn set_fibers(&self, fibers: Vec<FiberInfo>) {
        *self.fibers.lock().unwrap() = fibers;
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The id lists of every state fetch, in call order.
    pub fn state_requests(&self) -> Vec<Vec<String>> {
        self.state_requests.lock().unwrap().clone()
    }

    pub fn fiber_requests(&self) -> Vec<FiberTraceRequest> {
        self.fiber_requests.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ClientError::Connection("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TelemetryClient for FakeTelemetry {
    async fn fetch_metric_keys(&self) -> Result<Vec<MetricKey>, ClientError> {
        self.check()?;
        Ok(self.keys.lock().unwrap().clone())
    }

    async fn fetch_metric_states(&self, ids: &[String]) -> Result<Vec<MetricState>, ClientError> {
        self.state_requests.lock().unwrap().push(ids.to_vec());
        self.check()?;
        Ok(self
            .states
            .lock()
            .unwrap()
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn fetch_fibers(&self, request: &FiberTraceRequest) -> Result<Vec<FiberInfo>, ClientError> {
        self.fiber_requests.lock().unwrap().push(request.clone());
        self.check()?;
        Ok(self
            .fibers
            .lock()
            .unwrap()
            .iter()
            .filter(|f| !request.active_only || f.status == FiberStatus::Running)
            .cloned()
            .collect())
    }
}

pub fn gauge_key(id: &str) -> MetricKey {
    MetricKey::new(id, id, MetricType::Gauge)
}

pub fn gauge(id: &str, value: f64, at: u64) -> MetricState {
    MetricState::new(gauge_key(id), MetricValue::Gauge { value }, Timestamp(at))
}

pub fn fiber(id: u64, status: FiberStatus) -> FiberInfo {
    FiberInfo::new(FiberId::new(id, Timestamp(id), "main.rs:1"), status)
}
