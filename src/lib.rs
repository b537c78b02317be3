//! # cluster-notify
//!
//! Cluster-wide resource change notifications for nodes sharing a resource
//! store.
//!
//! ## Overview
//!
//! When one node changes a resource (a style, a layer definition, any file in
//! a shared data directory), listeners on every node need to hear about it.
//! `cluster-notify` provides:
//! - A local dispatcher that delivers notifications to listeners registered
//!   per path, with ancestor and descendant propagation
//! - A cluster dispatcher that publishes notifications on a cluster topic and
//!   re-dispatches inbound messages locally, without ever re-publishing them
//! - Automatic local-only fallback while no cluster transport is available
//! - Layered settings (files, then environment variables)
//!
//! ## Quick Start
//!
//! ```rust
//! use cluster_notify::prelude::*;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<()> {
//! let cluster = MemoryCluster::new();
//! let dispatcher = ClusterDispatcher::builder()
//!     .with_cluster(cluster)
//!     .build()?;
//!
//! dispatcher.add_listener(
//!     "styles/roads.sld",
//!     Arc::new(|n: &ResourceNotification| -> std::result::Result<(), ListenerError> {
//!         println!("{}", n);
//!         Ok(())
//!     }),
//! );
//!
//! // Published to the cluster, echoed back and delivered once locally.
//! dispatcher.changed(&ResourceNotification::new("styles/roads.sld", Kind::EntryModify));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Features
//!
//! - **Loop-free re-dispatch**: inbound messages only ever reach local listeners
//! - **Degraded mode**: publishing failures fall back to local delivery
//! - **Listener isolation**: a failing or panicking listener never affects others
//! - **File watching**: announce changes under a data directory (`file-watch`)
//! - **Validation**: reject invalid settings at build time (`validation`)
//! - **Metrics**: OpenTelemetry counters for dispatch outcomes (`metrics`)

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod cluster;
pub mod core;
pub mod error;
pub mod sources;

#[cfg(feature = "file-watch")]
pub mod watch;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::cluster::{ClusterDispatcher, ClusterDispatcherBuilder, Delivery, MemoryCluster};
    pub use crate::core::{
        ClusterSettings, Kind, LocalDispatcher, ResourceListener, ResourceNotification,
        ResourceNotificationDispatcher, SelfDelivery,
    };
    pub use crate::error::{ListenerError, NotifyError, Result, ValidationError};

    #[cfg(feature = "validation")]
    pub use crate::core::Validate;
}
