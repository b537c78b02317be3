//! Dispatch metrics tracking using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Meter};

/// Metrics collector for notification dispatch.
///
/// Cheap to clone; every clone records into the same instruments.
///
/// # Examples
///
/// ```rust,no_run
/// use cluster_notify::metrics::DispatchMetrics;
/// use opentelemetry::global;
///
/// let metrics = DispatchMetrics::new(global::meter("cluster-notify"));
/// metrics.record_published();
/// metrics.record_local_fallback("publish_failed");
/// ```
#[derive(Clone)]
pub struct DispatchMetrics {
    published: Counter<u64>,
    publish_failures: Counter<u64>,
    local_fallbacks: Counter<u64>,
    received: Counter<u64>,
    duplicates_dropped: Counter<u64>,
    malformed_dropped: Counter<u64>,
    listener_failures: Counter<u64>,
    registered_listeners: Gauge<i64>,
}

impl DispatchMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let published = meter
            .u64_counter("cluster_notify.published")
            .with_description("Notifications published to the cluster topic")
            .build();

        let publish_failures = meter
            .u64_counter("cluster_notify.publish.failures")
            .with_description("Publish attempts rejected by the transport")
            .build();

        let local_fallbacks = meter
            .u64_counter("cluster_notify.local_fallbacks")
            .with_description("Notifications delivered locally because the cluster was unavailable")
            .build();

        let received = meter
            .u64_counter("cluster_notify.received")
            .with_description("Inbound messages taken from the cluster topic")
            .build();

        let duplicates_dropped = meter
            .u64_counter("cluster_notify.duplicates_dropped")
            .with_description("Inbound notifications dropped as already delivered")
            .build();

        let malformed_dropped = meter
            .u64_counter("cluster_notify.malformed_dropped")
            .with_description("Inbound messages that could not be decoded")
            .build();

        let listener_failures = meter
            .u64_counter("cluster_notify.listener.failures")
            .with_description("Listener invocations that returned an error or panicked")
            .build();

        let registered_listeners = meter
            .i64_gauge("cluster_notify.listeners.registered")
            .with_description("Number of registered resource listeners")
            .build();

        Self {
            published,
            publish_failures,
            local_fallbacks,
            received,
            duplicates_dropped,
            malformed_dropped,
            listener_failures,
            registered_listeners,
        }
    }

    /// Record a successful publish.
    pub fn record_published(&self) {
        self.published.add(1, &[]);
    }

    /// Record a publish rejected by the transport.
    pub fn record_publish_failure(&self) {
        self.publish_failures.add(1, &[]);
    }

    /// Record a local-only delivery, labelled with why the cluster was skipped.
    pub fn record_local_fallback(&self, reason: &'static str) {
        self.local_fallbacks.add(1, &[KeyValue::new("reason", reason)]);
    }

    /// Record an inbound message.
    pub fn record_received(&self) {
        self.received.add(1, &[]);
    }

    /// Record a dropped duplicate.
    pub fn record_duplicate(&self) {
        self.duplicates_dropped.add(1, &[]);
    }

    /// Record a dropped undecodable message.
    pub fn record_malformed(&self) {
        self.malformed_dropped.add(1, &[]);
    }

    /// Record failed listener invocations.
    pub fn record_listener_failures(&self, count: u64) {
        if count > 0 {
            self.listener_failures.add(count, &[]);
        }
    }

    /// Update the number of registered listeners.
    pub fn update_listener_count(&self, count: i64) {
        self.registered_listeners.record(count, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::global;

    #[test]
    fn test_metrics_creation() {
        let metrics = DispatchMetrics::new(global::meter("test"));

        // Test basic operations don't panic
        metrics.record_published();
        metrics.record_publish_failure();
        metrics.record_local_fallback("unbound");
        metrics.record_received();
        metrics.record_duplicate();
        metrics.record_malformed();
        metrics.record_listener_failures(0);
        metrics.record_listener_failures(2);
        metrics.update_listener_count(5);
    }

    #[test]
    fn test_metrics_clone() {
        let metrics = DispatchMetrics::new(global::meter("test"));
        let metrics2 = metrics.clone();

        metrics.record_published();
        metrics2.record_published();
    }
}
