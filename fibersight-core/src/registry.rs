//! Thread-safe subscription registry.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::ids::IdGenerator;

/// One registered interest set.
#[derive(Debug)]
struct Entry<K> {
    keys: BTreeSet<K>,
    /// Cancelled when the entry leaves the registry.
    closed: CancellationToken,
}

impl<K> Entry<K> {
    fn new(keys: BTreeSet<K>) -> Self {
        Self {
            keys,
            closed: CancellationToken::new(),
        }
    }
}

/// A map of subscription id to interest set, mutated under a single lock so
/// that [`registered_keys`](Self::registered_keys) always sees a consistent
/// view.
#[derive(Debug)]
pub struct SubscriptionRegistry<K> {
    prefix: &'static str,
    ids: Arc<dyn IdGenerator>,
    entries: Mutex<BTreeMap<String, Entry<K>>>,
}

impl<K: Ord + Clone> SubscriptionRegistry<K> {
    /// Create an empty registry minting ids with `prefix`.
    pub fn new(prefix: &'static str, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            prefix,
            ids,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a new interest set and return its fresh id.
    pub fn create(&self, initial: BTreeSet<K>) -> String {
        let id = self.ids.next_id(self.prefix);
        self.entries.lock().insert(id.clone(), Entry::new(initial));
        id
    }

    /// Remove a subscription. Returns `false` if it was not registered.
    pub fn remove(&self, id: &str) -> bool {
        match self.entries.lock().remove(id) {
            Some(entry) => {
                entry.closed.cancel();
                true
            }
            None => false,
        }
    }

    /// Replace a subscription's interest set with `f(current)`.
    ///
    /// An unknown id starts from the empty set and is registered. `f` runs
    /// under the registry lock and must not call back into the registry.
    pub fn modify<F>(&self, id: &str, f: F)
    where
        F: FnOnce(BTreeSet<K>) -> BTreeSet<K>,
    {
        let mut entries = self.entries.lock();
        match entries.get_mut(id) {
            Some(entry) => {
                let current = std::mem::take(&mut entry.keys);
                entry.keys = f(current);
            }
            None => {
                entries.insert(id.to_string(), Entry::new(f(BTreeSet::new())));
            }
        }
    }

    /// Replace the interest set of a registered subscription with
    /// `f(current)`.
    ///
    /// Returns `false` without calling `f` if `id` is not registered, so a
    /// concurrently removed subscription is never brought back.
    pub fn modify_existing<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(BTreeSet<K>) -> BTreeSet<K>,
    {
        let mut entries = self.entries.lock();
        match entries.get_mut(id) {
            Some(entry) => {
                let current = std::mem::take(&mut entry.keys);
                entry.keys = f(current);
                true
            }
            None => false,
        }
    }

    /// Union of every subscription's interest set.
    pub fn registered_keys(&self) -> BTreeSet<K> {
        self.entries
            .lock()
            .values()
            .flat_map(|entry| entry.keys.iter().cloned())
            .collect()
    }

    /// The interest set of one subscription.
    pub fn keys_of(&self, id: &str) -> Option<BTreeSet<K>> {
        self.entries.lock().get(id).map(|entry| entry.keys.clone())
    }

    /// A token cancelled once `id` is removed or the registry is reset.
    pub fn closed_signal(&self, id: &str) -> Option<CancellationToken> {
        self.entries.lock().get(id).map(|entry| entry.closed.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn subscription_ids(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every subscription.
    pub fn reset(&self) {
        let drained = std::mem::take(&mut *self.entries.lock());
        for entry in drained.into_values() {
            entry.closed.cancel();
        }
    }
}
