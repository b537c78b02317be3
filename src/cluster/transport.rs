//! Seams between the dispatcher and a cluster pub/sub substrate.

use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// A serialized notification as it travels over a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMessage {
    /// Encoded payload, see [`codec`](crate::cluster::codec).
    pub payload: Vec<u8>,
}

impl TopicMessage {
    /// Wrap raw bytes.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Identifies one subscription on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receives messages from a topic.
///
/// Called on threads owned by the transport, concurrently with local
/// dispatch. Implementations must not panic or block for long.
pub trait MessageListener: Send + Sync {
    /// Handle one inbound message.
    fn on_message(&self, message: &TopicMessage);
}

/// A named publish/subscribe channel shared by every node in the cluster.
///
/// Delivery guarantees (ordering, at-least-once) are whatever the underlying
/// substrate provides.
pub trait Topic: Send + Sync {
    /// Topic name.
    fn name(&self) -> &str;

    /// Hand a message to the substrate without waiting for acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns an error if the substrate refuses the message.
    fn publish(&self, message: TopicMessage) -> Result<()>;

    /// Start delivering messages to `listener`.
    fn add_message_listener(&self, listener: Arc<dyn MessageListener>) -> SubscriptionId;

    /// Stop delivering to a subscription. Returns `false` if it was unknown.
    fn remove_message_listener(&self, id: SubscriptionId) -> bool;
}

/// Cluster membership provider.
///
/// Hands out topics once membership is established. Both methods are called
/// on every broadcast, so they should be cheap.
pub trait ClusterHandle: Send + Sync {
    /// Whether this node currently participates in the cluster.
    fn is_enabled(&self) -> bool;

    /// Look up a topic by name. `None` when the cluster cannot provide it.
    ///
    /// Return the same instance for as long as it stays live. A different
    /// instance makes the dispatcher move its subscription over.
    fn topic(&self, name: &str) -> Option<Arc<dyn Topic>>;
}
