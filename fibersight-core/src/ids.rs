//! Subscription id generation.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use fibersight_types::Timestamp;

/// Mints subscription ids.
///
/// Ids must be unique for the lifetime of the process.
pub trait IdGenerator: Send + Sync + Debug {
    fn next_id(&self, prefix: &str) -> String;
}

/// `<prefix>-<unix millis>-<counter>`.
#[derive(Debug, Default)]
pub struct MonotonicIds {
    counter: AtomicU64,
}

impl MonotonicIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for MonotonicIds {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}", prefix, Timestamp::now().as_millis(), n)
    }
}
