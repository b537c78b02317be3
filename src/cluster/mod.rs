//! Cluster fan-out of resource notifications.
//!
//! A [`ClusterDispatcher`] publishes local changes on a shared topic and
//! relays changes received from that topic to local listeners. Transports
//! plug in through the [`ClusterHandle`], [`Topic`] and [`MessageListener`]
//! traits; [`MemoryCluster`] provides an in-process implementation.

mod builder;
pub mod codec;
mod dedup;
mod dispatcher;
mod memory;
mod transport;

pub use builder::ClusterDispatcherBuilder;
pub use dedup::DedupWindow;
pub use dispatcher::{
    BindOutcome, ClusterDispatcher, Delivery, DispatcherState, Fallback, InboundRelay,
};
pub use memory::{MemoryCluster, MemoryTopic};
pub use transport::{ClusterHandle, MessageListener, SubscriptionId, Topic, TopicMessage};
