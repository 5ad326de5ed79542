//! Periodic background polling.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shortest interval a poll daemon runs at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running poll daemon.
///
/// The daemon also stops when the shutdown token it was started under is
/// cancelled. Dropping the handle leaves the daemon running.
#[derive(Debug)]
pub struct PollerHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Ask the daemon to stop. It exits at its next suspension point.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Stop the daemon and wait for it to exit.
    pub async fn join(self) {
        self.stop.cancel();
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a task that runs `tick` every `interval`, starting immediately.
///
/// A slow tick delays the following ones rather than bursting to catch up.
/// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
pub(crate) fn spawn_poller<F, Fut>(
    name: &'static str,
    interval: Duration,
    shutdown: &CancellationToken,
    mut tick: F,
) -> PollerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = usize> + Send + 'static,
{
    let interval = interval.max(MIN_POLL_INTERVAL);
    let stop = shutdown.child_token();
    let token = stop.clone();

    let task = tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poller = name,
            interval_ms = interval.as_millis() as u64,
            "Poller started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = timer.tick() => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        published = tick() => debug!(poller = name, published, "Poll tick"),
                    }
                }
            }
        }

        info!(poller = name, "Poller stopped");
    });

    PollerHandle { stop, task }
}

/// Holds the stop token of an owner's running daemon so that at most one
/// runs at a time.
#[derive(Debug, Default)]
pub(crate) struct PollerSlot {
    active: Mutex<Option<CancellationToken>>,
}

impl PollerSlot {
    /// Run `spawn` unless a daemon started here is still running.
    ///
    /// A daemon counts as running until its handle is stopped or its
    /// shutdown token is cancelled; dropping the handle does not free the
    /// slot.
    pub(crate) fn start_with<S>(&self, spawn: S) -> Option<PollerHandle>
    where
        S: FnOnce() -> PollerHandle,
    {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return None;
        }

        let handle = spawn();
        *active = Some(handle.stop.clone());
        Some(handle)
    }
}
