//! Built-in metrics for notification dispatch.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Notifications published to the cluster topic
//! - Publish failures and local-only fallbacks
//! - Inbound messages received, duplicates and malformed payloads dropped
//! - Listener failures
//! - Registered listeners
//!
//! # Examples
//!
//! ```rust,no_run
//! use cluster_notify::prelude::*;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let meter = global::meter("my-app");
//!
//! let dispatcher = ClusterDispatcher::builder()
//!     .with_metrics(meter)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod dispatch_metrics;

pub use dispatch_metrics::DispatchMetrics;
