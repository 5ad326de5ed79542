//! Fiber (execution unit) trace data.

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;

use crate::Timestamp;

/// Identity of a fiber as reported by the telemetry source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct FiberId {
    pub id: u64,
    pub start_time: Timestamp,
    /// Source location the fiber was forked from.
    #[cfg_attr(feature = "serde", serde(default))]
    pub location: String,
}

impl FiberId {
    pub fn new(id: u64, start_time: Timestamp, location: impl Into<String>) -> Self {
        Self {
            id,
            start_time,
            location: location.into(),
        }
    }
}

/// Lifecycle state of a fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum FiberStatus {
    Running,
    Suspended,
    Succeeded,
    Errored,
}

impl FiberStatus {
    /// Running or suspended; the fiber has not completed.
    pub fn is_alive(&self) -> bool {
        matches!(self, FiberStatus::Running | FiberStatus::Suspended)
    }

    /// Succeeded or errored.
    pub fn is_done(&self) -> bool {
        !self.is_alive()
    }
}

/// One fiber's trace information. Supplied wholesale by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct FiberInfo {
    pub id: FiberId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<FiberId>,
    pub status: FiberStatus,
    #[cfg_attr(feature = "serde", serde(default))]
    pub stacktrace: Option<Vec<String>>,
}

impl FiberInfo {
    pub fn new(id: FiberId, status: FiberStatus) -> Self {
        Self {
            id,
            parent: None,
            status,
            stacktrace: None,
        }
    }

    pub fn with_parent(mut self, parent: FiberId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_stacktrace(mut self, frames: Vec<String>) -> Self {
        self.stacktrace = Some(frames);
        self
    }
}

/// Which fibers the telemetry source should return.
///
/// Filtering happens at the source; this value is only passed through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct FiberTraceRequest {
    /// Restrict results to the tree rooted at this fiber.
    #[cfg_attr(feature = "serde", serde(default))]
    pub root_fiber_id: Option<u64>,
    /// Only return fibers that are currently running.
    #[cfg_attr(feature = "serde", serde(default))]
    pub active_only: bool,
    /// Fibers whose stack traces should be captured.
    #[cfg_attr(feature = "serde", serde(default))]
    pub traced_ids: BTreeSet<u64>,
}

impl FiberTraceRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, fiber: u64) -> Self {
        self.root_fiber_id = Some(fiber);
        self
    }

    pub fn active_only(mut self, active_only: bool) -> Self {
        self.active_only = active_only;
        self
    }

    pub fn trace(mut self, fiber: u64) -> Self {
        self.traced_ids.insert(fiber);
        self
    }

    /// Start tracing `fiber` if it is not traced, stop otherwise.
    ///
    /// Returns whether the fiber is traced afterwards.
    pub fn toggle_trace(&mut self, fiber: u64) -> bool {
        if self.traced_ids.remove(&fiber) {
            false
        } else {
            self.traced_ids.insert(fiber);
            true
        }
    }
}
