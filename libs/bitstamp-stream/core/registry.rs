//! Acknowledged channel subscriptions
//!
//! A channel name is present here if and only if the server acknowledged a
//! subscribe request for it and no later unsubscribe ack arrived. Only the
//! client's driver task mutates the set; handles and tests get a shared
//! read view by cloning.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Set of channels the server has acknowledged
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an acknowledged subscription. Idempotent.
    pub(crate) fn add(&self, channel: &str) -> bool {
        self.inner.write().insert(channel.to_string())
    }

    /// Record an acknowledged unsubscription. Idempotent.
    pub(crate) fn remove(&self, channel: &str) -> bool {
        self.inner.write().remove(channel)
    }

    /// Drop every subscription. Used when the connection is rebuilt.
    pub(crate) fn clear(&self) {
        self.inner.write().clear();
    }

    /// Whether the channel is currently subscribed
    pub fn contains(&self, channel: &str) -> bool {
        self.inner.read().contains(channel)
    }

    /// Snapshot of all subscribed channel names
    pub fn all(&self) -> Vec<String> {
        self.inner.read().iter().cloned().collect()
    }

    /// Number of subscribed channels
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether no channel is subscribed
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
