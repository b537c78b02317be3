//! In-process cluster substrate.
//!
//! Several dispatchers attached to one [`MemoryCluster`] behave like nodes
//! sharing a distributed topic: every published message reaches every
//! subscriber, the publisher included. Used for single-process deployments
//! and tests.

use crate::cluster::{ClusterHandle, MessageListener, SubscriptionId, Topic, TopicMessage};
use crate::error::{NotifyError, Result};
use arc_swap::ArcSwap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

type Subscribers = Vec<(SubscriptionId, Arc<dyn MessageListener>)>;

/// A topic that delivers synchronously on the publishing thread.
pub struct MemoryTopic {
    name: String,
    subscribers: ArcSwap<Subscribers>,
    next_id: AtomicU64,
    published: AtomicU64,
    connected: AtomicBool,
}

impl MemoryTopic {
    /// Create a connected topic with no subscribers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
            connected: AtomicBool::new(true),
        }
    }

    /// Number of messages accepted by `publish`.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load().len()
    }

    /// Make subsequent publishes fail, as if the broker went away.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Undo [`disconnect`](Self::disconnect).
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }
}

impl Topic for MemoryTopic {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, message: TopicMessage) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(NotifyError::TransportUnavailable(format!(
                "topic '{}' is disconnected",
                self.name
            )));
        }
        self.published.fetch_add(1, Ordering::SeqCst);
        for (_, subscriber) in self.subscribers.load().iter() {
            subscriber.on_message(&message);
        }
        Ok(())
    }

    fn add_message_listener(&self, listener: Arc<dyn MessageListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.rcu(|current| {
            let mut next = Subscribers::clone(current);
            next.push((id, Arc::clone(&listener)));
            next
        });
        id
    }

    fn remove_message_listener(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.subscribers.rcu(|current| {
            let mut next = Subscribers::clone(current);
            let before = next.len();
            next.retain(|(sub, _)| *sub != id);
            removed = next.len() != before;
            next
        });
        removed
    }
}

/// Membership provider backed by in-process [`MemoryTopic`]s.
///
/// # Examples
///
/// ```rust
/// use cluster_notify::cluster::{ClusterHandle, MemoryCluster};
///
/// let cluster = MemoryCluster::new();
/// assert!(cluster.topic("resourceWatcher").is_some());
///
/// cluster.set_enabled(false);
/// assert!(cluster.topic("resourceWatcher").is_none());
/// ```
pub struct MemoryCluster {
    enabled: AtomicBool,
    topics: RwLock<HashMap<String, Arc<MemoryTopic>>>,
}

impl MemoryCluster {
    /// Create an enabled cluster with no topics.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            enabled: AtomicBool::new(true),
            topics: RwLock::new(HashMap::new()),
        })
    }

    /// Toggle membership. While disabled, `topic` returns `None`.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// The concrete topic for `name`, created on first use.
    pub fn memory_topic(&self, name: &str) -> Arc<MemoryTopic> {
        if let Some(topic) = self.topics.read().get(name) {
            return Arc::clone(topic);
        }
        let mut topics = self.topics.write();
        Arc::clone(
            topics
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryTopic::new(name))),
        )
    }
}

impl ClusterHandle for MemoryCluster {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn topic(&self, name: &str) -> Option<Arc<dyn Topic>> {
        if !self.is_enabled() {
            return None;
        }
        Some(self.memory_topic(name) as Arc<dyn Topic>)
    }
}
