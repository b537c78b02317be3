//! Cluster-aware dispatcher: publish to peers, relay peers' changes locally.

use crate::cluster::codec;
use crate::cluster::{
    ClusterDispatcherBuilder, ClusterHandle, DedupWindow, MessageListener, SubscriptionId, Topic,
    TopicMessage,
};
use crate::core::{
    ClusterSettings, LocalDispatcher, ResourceListener, ResourceNotification,
    ResourceNotificationDispatcher, SelfDelivery,
};
use crate::error::{NotifyError, Result};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::DispatchMetrics;

/// Whether a dispatcher has a cluster to publish to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// No cluster handle; every change is delivered locally only.
    Unbound,
    /// Changes are published to the cluster topic.
    Bound,
}

/// Result of [`ClusterDispatcher::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The dispatcher subscribed to the topic and is now bound.
    Bound,
    /// A cluster was already bound; nothing changed.
    AlreadyBound,
}

/// Why a broadcast was delivered on this node only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// No cluster has been bound yet.
    Unbound,
    /// The bound cluster reports that membership is disabled.
    ClusterDisabled,
    /// The cluster could not provide the topic.
    TopicUnavailable,
    /// The notification could not be encoded.
    EncodeFailed,
    /// The topic rejected the message.
    PublishFailed,
}

impl Fallback {
    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Fallback::Unbound => "unbound",
            Fallback::ClusterDisabled => "cluster_disabled",
            Fallback::TopicUnavailable => "topic_unavailable",
            Fallback::EncodeFailed => "encode_failed",
            Fallback::PublishFailed => "publish_failed",
        }
    }
}

/// Result of [`ClusterDispatcher::broadcast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the cluster topic. Under [`SelfDelivery::Echo`] this node's
    /// listeners hear about it when the topic delivers it back.
    Published,
    /// Delivered to this node's listeners only.
    LocalOnly(Fallback),
}

struct Binding {
    cluster: Arc<dyn ClusterHandle>,
    topic: Arc<dyn Topic>,
    subscription: SubscriptionId,
}

/// Receives notifications from the cluster topic and delivers them to local
/// listeners.
///
/// The relay only holds the [`LocalDispatcher`], so nothing it receives can
/// be published again.
pub struct InboundRelay {
    local: Arc<LocalDispatcher>,
    node_id: String,
    incarnation: String,
    self_delivery: SelfDelivery,
    dedup: Mutex<DedupWindow>,
    #[cfg(feature = "metrics")]
    metrics: Option<DispatchMetrics>,
}

impl MessageListener for InboundRelay {
    fn on_message(&self, message: &TopicMessage) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_received();
        }

        let notification = match codec::decode(message) {
            Ok(notification) => notification,
            Err(err) => {
                warn!(
                    node_id = %self.node_id,
                    bytes = message.payload.len(),
                    error = %err,
                    "Dropping malformed cluster message"
                );
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.metrics {
                    metrics.record_malformed();
                }
                return;
            }
        };

        if let Some(origin) = notification.origin() {
            let incarnation = notification.incarnation().unwrap_or_default();
            if self.self_delivery == SelfDelivery::Immediate
                && origin == self.node_id
                && incarnation == self.incarnation
            {
                debug!(notification = %notification, "Skipping own broadcast, already delivered");
                return;
            }
            if notification.sequence() > 0
                && !self
                    .dedup
                    .lock()
                    .insert(origin, incarnation, notification.sequence())
            {
                debug!(notification = %notification, "Dropping duplicate cluster message");
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.metrics {
                    metrics.record_duplicate();
                }
                return;
            }
        }

        self.local.notify_local(&notification);
    }
}

/// Dispatcher that fans resource changes out to every node in a cluster.
///
/// Starts [`Unbound`](DispatcherState::Unbound): changes are delivered to
/// local listeners only. After [`bind`](Self::bind) succeeds, changes are
/// published to the shared topic and every node, this one included, delivers
/// them from its [`InboundRelay`]. If the topic becomes unreachable later,
/// changes fall back to local delivery again. The transition to `Bound` is
/// permanent. When the cluster starts handing out a different topic instance,
/// the relay is moved to it before publishing. Dropping the dispatcher removes
/// its subscription.
///
/// # Examples
///
/// ```rust
/// use cluster_notify::cluster::{ClusterDispatcher, Delivery, MemoryCluster};
/// use cluster_notify::core::{ClusterSettings, Kind, ResourceNotification};
///
/// let cluster = MemoryCluster::new();
/// let node = ClusterDispatcher::new(ClusterSettings::default());
/// node.bind(cluster.clone()).unwrap();
///
/// let change = ResourceNotification::new("styles/foo.sld", Kind::EntryModify);
/// assert_eq!(node.broadcast(&change), Delivery::Published);
/// ```
pub struct ClusterDispatcher {
    settings: ClusterSettings,
    node_id: String,
    incarnation: String,
    local: Arc<LocalDispatcher>,
    relay: Arc<InboundRelay>,
    binding: ArcSwapOption<Binding>,
    bind_lock: Mutex<()>,
    sequence: AtomicU64,
    #[cfg(feature = "metrics")]
    metrics: Option<DispatchMetrics>,
}

impl ClusterDispatcher {
    /// Create an unbound dispatcher with its own local dispatcher.
    pub fn new(settings: ClusterSettings) -> Self {
        Self::with_local(settings, Arc::new(LocalDispatcher::new()))
    }

    /// Create an unbound dispatcher around an existing local dispatcher.
    pub fn with_local(settings: ClusterSettings, local: Arc<LocalDispatcher>) -> Self {
        Self::assemble(
            settings,
            local,
            #[cfg(feature = "metrics")]
            None,
        )
    }

    /// Create a builder that loads settings from files and the environment.
    pub fn builder() -> ClusterDispatcherBuilder {
        ClusterDispatcherBuilder::new()
    }

    pub(crate) fn assemble(
        settings: ClusterSettings,
        local: Arc<LocalDispatcher>,
        #[cfg(feature = "metrics")] metrics: Option<DispatchMetrics>,
    ) -> Self {
        let node_id = settings.resolved_node_id();
        let incarnation = uuid::Uuid::new_v4().to_string();
        let relay = Arc::new(InboundRelay {
            local: Arc::clone(&local),
            node_id: node_id.clone(),
            incarnation: incarnation.clone(),
            self_delivery: settings.self_delivery,
            dedup: Mutex::new(DedupWindow::new(settings.dedup_window)),
            #[cfg(feature = "metrics")]
            metrics: metrics.clone(),
        });
        Self {
            settings,
            node_id,
            incarnation,
            local,
            relay,
            binding: ArcSwapOption::empty(),
            bind_lock: Mutex::new(()),
            sequence: AtomicU64::new(0),
            #[cfg(feature = "metrics")]
            metrics,
        }
    }

    /// Attach a cluster and subscribe to its topic.
    ///
    /// Only the first successful call has an effect; later calls return
    /// [`BindOutcome::AlreadyBound`] without subscribing again.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::TransportUnavailable`] if the cluster is
    /// disabled or cannot provide the topic. The dispatcher stays unbound.
    pub fn bind(&self, cluster: Arc<dyn ClusterHandle>) -> Result<BindOutcome> {
        let _guard = self.bind_lock.lock();

        if let Some(existing) = self.binding.load_full() {
            if !Arc::ptr_eq(&existing.cluster, &cluster) {
                warn!(
                    node_id = %self.node_id,
                    "Ignoring a second cluster handle, dispatcher is already bound"
                );
            }
            return Ok(BindOutcome::AlreadyBound);
        }

        if !cluster.is_enabled() {
            return Err(NotifyError::TransportUnavailable(
                "cluster membership is not enabled".to_string(),
            ));
        }
        let topic = cluster.topic(&self.settings.topic).ok_or_else(|| {
            NotifyError::TransportUnavailable(format!(
                "topic '{}' is not available",
                self.settings.topic
            ))
        })?;

        let subscription = topic.add_message_listener(self.inbound());
        info!(
            node_id = %self.node_id,
            topic = topic.name(),
            subscription = %subscription,
            "Resource notifications bound to cluster topic"
        );
        self.binding.store(Some(Arc::new(Binding {
            cluster,
            topic,
            subscription,
        })));
        Ok(BindOutcome::Bound)
    }

    /// Current state.
    pub fn state(&self) -> DispatcherState {
        if self.binding.load().is_some() {
            DispatcherState::Bound
        } else {
            DispatcherState::Unbound
        }
    }

    /// Subscription held on the bound topic.
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.binding.load_full().map(|b| b.subscription)
    }

    /// Announce a local change to the whole cluster.
    ///
    /// The notification is stamped with this node's id, this dispatcher's
    /// incarnation and the next sequence number. When the cluster cannot take
    /// it, it is delivered to local listeners instead; the caller never sees
    /// an error.
    pub fn broadcast(&self, notification: &ResourceNotification) -> Delivery {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let stamped = notification.stamped(&self.node_id, &self.incarnation, sequence);
        let immediate = self.settings.self_delivery == SelfDelivery::Immediate;

        if immediate {
            self.local.notify_local(&stamped);
        }

        match self.publish(&stamped) {
            Ok(()) => {
                debug!(notification = %stamped, "Published resource notification");
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.metrics {
                    metrics.record_published();
                }
                Delivery::Published
            }
            Err(fallback) => {
                if fallback == Fallback::Unbound {
                    debug!(notification = %stamped, "No cluster bound, delivering locally");
                } else {
                    warn!(
                        notification = %stamped,
                        reason = fallback.as_str(),
                        "Cluster unavailable, delivering resource notification locally"
                    );
                }
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.metrics {
                    metrics.record_local_fallback(fallback.as_str());
                }
                if !immediate {
                    self.local.notify_local(&stamped);
                }
                Delivery::LocalOnly(fallback)
            }
        }
    }

    /// Deliver to this node's listeners without touching the cluster.
    pub fn notify_local(&self, notification: &ResourceNotification) {
        self.local.notify_local(notification);
    }

    fn publish(&self, notification: &ResourceNotification) -> std::result::Result<(), Fallback> {
        let guard = self.binding.load();
        let Some(binding) = &*guard else {
            return Err(Fallback::Unbound);
        };
        if !binding.cluster.is_enabled() {
            return Err(Fallback::ClusterDisabled);
        }
        let Some(topic) = binding.cluster.topic(&self.settings.topic) else {
            return Err(Fallback::TopicUnavailable);
        };
        let topic = if Arc::ptr_eq(&topic, &binding.topic) {
            topic
        } else {
            self.resubscribe(topic)
        };

        let message = codec::encode(notification).map_err(|err| {
            warn!(
                notification = %notification,
                error = %err,
                "Failed to encode resource notification"
            );
            Fallback::EncodeFailed
        })?;

        topic.publish(message).map_err(|err| {
            warn!(
                topic = topic.name(),
                error = %err,
                "Cluster topic rejected resource notification"
            );
            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.metrics {
                metrics.record_publish_failure();
            }
            Fallback::PublishFailed
        })
    }

    /// Move the relay onto `topic` and make it the bound topic.
    ///
    /// Returns the topic bound once the lock is released, which may already
    /// have been swapped by a concurrent caller.
    fn resubscribe(&self, topic: Arc<dyn Topic>) -> Arc<dyn Topic> {
        let _guard = self.bind_lock.lock();
        let Some(current) = self.binding.load_full() else {
            return topic;
        };
        if Arc::ptr_eq(&current.topic, &topic) {
            return topic;
        }

        current.topic.remove_message_listener(current.subscription);
        let subscription = topic.add_message_listener(self.inbound());
        info!(
            node_id = %self.node_id,
            topic = topic.name(),
            previous = %current.subscription,
            subscription = %subscription,
            "Cluster topic instance changed, relay re-subscribed"
        );
        self.binding.store(Some(Arc::new(Binding {
            cluster: Arc::clone(&current.cluster),
            topic: Arc::clone(&topic),
            subscription,
        })));
        topic
    }

    /// Listener for transports that push inbound messages themselves.
    pub fn inbound(&self) -> Arc<dyn MessageListener> {
        Arc::clone(&self.relay) as Arc<dyn MessageListener>
    }

    /// The local dispatcher that inbound messages are delivered through.
    pub fn local(&self) -> &Arc<LocalDispatcher> {
        &self.local
    }

    /// Identity stamped on outgoing notifications.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Random id of this dispatcher instance, stamped next to the node id.
    pub fn incarnation(&self) -> &str {
        &self.incarnation
    }

    /// Effective settings.
    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }
}

impl Drop for ClusterDispatcher {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.swap(None) {
            binding.topic.remove_message_listener(binding.subscription);
            debug!(
                node_id = %self.node_id,
                subscription = %binding.subscription,
                "Resource notification dispatcher unsubscribed"
            );
        }
    }
}

impl ResourceNotificationDispatcher for ClusterDispatcher {
    fn add_listener(&self, path: &str, listener: Arc<dyn ResourceListener>) -> bool {
        self.local.add_listener(path, listener)
    }

    fn remove_listener(&self, path: &str, listener: &Arc<dyn ResourceListener>) -> bool {
        self.local.remove_listener(path, listener)
    }

    fn changed(&self, notification: &ResourceNotification) {
        self.broadcast(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MemoryCluster;
    use crate::core::Kind;
    use crate::error::ListenerError;
    use std::sync::atomic::AtomicUsize;

    fn settings(node: &str) -> ClusterSettings {
        ClusterSettings {
            node_id: Some(node.to_string()),
            ..Default::default()
        }
    }

    fn counter(dispatcher: &ClusterDispatcher, path: &str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        dispatcher.add_listener(
            path,
            Arc::new(move |_: &ResourceNotification| -> std::result::Result<(), ListenerError> {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        count
    }

    #[test]
    fn test_unbound_delivers_locally() {
        let node = ClusterDispatcher::new(settings("a"));
        let count = counter(&node, "styles/foo.sld");

        let delivery = node.broadcast(&ResourceNotification::new("styles/foo.sld", Kind::EntryModify));

        assert_eq!(delivery, Delivery::LocalOnly(Fallback::Unbound));
        assert_eq!(node.state(), DispatcherState::Unbound);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bind_is_idempotent() {
        let cluster = MemoryCluster::new();
        let node = ClusterDispatcher::new(settings("a"));

        assert_eq!(node.bind(cluster.clone()).unwrap(), BindOutcome::Bound);
        let first = node.subscription();
        assert_eq!(node.bind(cluster.clone()).unwrap(), BindOutcome::AlreadyBound);

        assert_eq!(node.subscription(), first);
        assert_eq!(cluster.memory_topic("resourceWatcher").subscriber_count(), 1);
    }

    #[test]
    fn test_bind_fails_on_disabled_cluster() {
        let cluster = MemoryCluster::new();
        cluster.set_enabled(false);
        let node = ClusterDispatcher::new(settings("a"));

        assert!(matches!(
            node.bind(cluster.clone()),
            Err(NotifyError::TransportUnavailable(_))
        ));
        assert_eq!(node.state(), DispatcherState::Unbound);

        cluster.set_enabled(true);
        assert_eq!(node.bind(cluster).unwrap(), BindOutcome::Bound);
    }

    #[test]
    fn test_echo_delivers_once_through_topic() {
        let cluster = MemoryCluster::new();
        let node = ClusterDispatcher::new(settings("a"));
        node.bind(cluster.clone()).unwrap();
        let count = counter(&node, "styles/foo.sld");

        let delivery = node.broadcast(&ResourceNotification::new("styles/foo.sld", Kind::EntryModify));

        assert_eq!(delivery, Delivery::Published);
        assert_eq!(cluster.memory_topic("resourceWatcher").published_count(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_immediate_skips_own_echo() {
        let cluster = MemoryCluster::new();
        let node = ClusterDispatcher::new(ClusterSettings {
            self_delivery: SelfDelivery::Immediate,
            ..settings("a")
        });
        node.bind(cluster.clone()).unwrap();
        let count = counter(&node, "styles/foo.sld");

        node.broadcast(&ResourceNotification::new("styles/foo.sld", Kind::EntryModify));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        cluster.memory_topic("resourceWatcher").disconnect();
        let delivery = node.broadcast(&ResourceNotification::new("styles/foo.sld", Kind::EntryModify));
        assert_eq!(delivery, Delivery::LocalOnly(Fallback::PublishFailed));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sequence_increments() {
        let cluster = MemoryCluster::new();
        let node = ClusterDispatcher::new(settings("a"));
        node.bind(cluster.clone()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        node.add_listener(
            "",
            Arc::new(move |n: &ResourceNotification| -> std::result::Result<(), ListenerError> {
                sink.lock().push((n.origin().map(str::to_string), n.sequence()));
                Ok(())
            }),
        );

        node.broadcast(&ResourceNotification::new("a", Kind::EntryCreate));
        node.broadcast(&ResourceNotification::new("b", Kind::EntryCreate));

        assert_eq!(
            *seen.lock(),
            vec![(Some("a".to_string()), 1), (Some("a".to_string()), 2)]
        );
    }

    #[test]
    fn test_incarnation_differs_per_instance() {
        let first = ClusterDispatcher::new(settings("a"));
        let second = ClusterDispatcher::new(settings("a"));

        assert_eq!(first.node_id(), second.node_id());
        assert_ne!(first.incarnation(), second.incarnation());
    }

    #[test]
    fn test_drop_removes_subscription() {
        let cluster = MemoryCluster::new();
        let node = ClusterDispatcher::new(settings("a"));
        node.bind(cluster.clone()).unwrap();
        assert_eq!(cluster.memory_topic("resourceWatcher").subscriber_count(), 1);

        drop(node);
        assert_eq!(cluster.memory_topic("resourceWatcher").subscriber_count(), 0);
    }

    #[test]
    fn test_fallback_labels() {
        assert_eq!(Fallback::Unbound.as_str(), "unbound");
        assert_eq!(Fallback::PublishFailed.as_str(), "publish_failed");
    }
}
