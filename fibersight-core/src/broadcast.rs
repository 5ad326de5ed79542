//! Bounded multi-subscriber channel with drop-oldest overflow.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A fixed-capacity broadcast channel.
///
/// Every subscriber sees every published item in publish order, at its own
/// pace. When a subscriber falls more than `capacity` items behind, the
/// oldest items it has not read are dropped; the publisher never waits.
///
/// Cloning yields another handle to the same channel.
#[derive(Debug, Clone)]
pub struct BoundedBroadcast<T> {
    sender: broadcast::Sender<T>,
    closed: CancellationToken,
    capacity: usize,
}

impl<T: Clone> BoundedBroadcast<T> {
    /// Create a channel retaining at most `capacity` unread items per
    /// subscriber. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            closed: CancellationToken::new(),
            capacity,
        }
    }

    /// Publish an item to every current subscriber.
    ///
    /// Returns the number of subscribers the item was delivered to. Items
    /// published with no subscribers, or after `close`, are discarded.
    pub fn publish(&self, item: T) -> usize {
        if self.closed.is_cancelled() {
            return 0;
        }
        self.sender.send(item).unwrap_or(0)
    }

    /// Subscribe to items published from now on.
    pub fn subscribe(&self) -> Updates<T> {
        Updates {
            receiver: self.sender.subscribe(),
            closed: self.closed.clone(),
            until: None,
            capacity: self.capacity,
        }
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close the channel. Subscribers observe end-of-stream on their next read.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// One subscriber's read cursor into a [`BoundedBroadcast`].
#[derive(Debug)]
pub struct Updates<T> {
    receiver: broadcast::Receiver<T>,
    closed: CancellationToken,
    until: Option<CancellationToken>,
    /// Most unread items this reader may fall behind by. The underlying
    /// tokio channel rounds its buffer up to a power of two; reads trim
    /// the excess.
    capacity: usize,
}

impl<T: Clone> Updates<T> {
    /// End this stream as soon as `guard` is cancelled, regardless of what
    /// is still buffered.
    pub fn take_until(mut self, guard: CancellationToken) -> Self {
        self.until = Some(guard);
        self
    }

    /// Wait for the next item.
    ///
    /// Items lost to overflow are skipped and reading resumes at the oldest
    /// retained item. Returns `None` once the channel is closed or the
    /// stream's guard is cancelled.
    pub async fn recv(&mut self) -> Option<T> {
        let Updates {
            receiver,
            closed,
            until,
            capacity,
        } = self;

        loop {
            let result = {
                let guard = async {
                    match until.as_ref() {
                        Some(token) => token.cancelled().await,
                        None => std::future::pending().await,
                    }
                };

                tokio::select! {
                    biased;
                    _ = closed.cancelled() => return None,
                    _ = guard => return None,
                    result = receiver.recv() => result,
                }
            };

            match result {
                Ok(item) if receiver.len() >= *capacity => {
                    debug!(capacity = *capacity, "Subscriber over capacity, oldest update dropped");
                    drop(item);
                }
                Ok(item) => return Some(item),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Subscriber lagged, oldest updates dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next buffered item without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        if self.is_terminated() {
            return None;
        }

        loop {
            match self.receiver.try_recv() {
                Ok(item) if self.receiver.len() >= self.capacity => {
                    debug!(capacity = self.capacity, "Subscriber over capacity, oldest update dropped");
                    drop(item);
                }
                Ok(item) => return Some(item),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Subscriber lagged, oldest updates dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Whether the channel was closed or the guard cancelled.
    pub fn is_terminated(&self) -> bool {
        self.closed.is_cancelled()
            || self
                .until
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
    }
}
