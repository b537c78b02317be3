//! Local, single-process delivery of resource notifications.

use crate::core::registry::ListenerMap;
use crate::core::{
    Kind, ListenerHandle, ListenerRegistry, ResourceListener, ResourceNotification, paths,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

#[cfg(feature = "metrics")]
use crate::metrics::DispatchMetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

/// Delivers resource notifications to registered listeners.
///
/// Implemented by [`LocalDispatcher`] for single-node use and by
/// [`ClusterDispatcher`](crate::cluster::ClusterDispatcher), which fans
/// notifications out to every node first.
pub trait ResourceNotificationDispatcher: Send + Sync {
    /// Register `listener` for changes on `path`. Returns `false` if it was
    /// already registered there.
    fn add_listener(&self, path: &str, listener: Arc<dyn ResourceListener>) -> bool;

    /// Unregister `listener` from `path`. Returns `false` if it was not
    /// registered there.
    fn remove_listener(&self, path: &str, listener: &Arc<dyn ResourceListener>) -> bool;

    /// Announce a change. Never fails: delivery problems are logged.
    fn changed(&self, notification: &ResourceNotification);
}

/// Outcome of one local delivery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalDelivery {
    /// Listener invocations that returned `Ok`.
    pub delivered: usize,
    /// Listener invocations that returned an error or panicked.
    pub failed: usize,
}

/// Single-process dispatcher over a [`ListenerRegistry`].
///
/// A notification reaches, in order:
/// 1. listeners registered on its own path;
/// 2. for deletions, listeners registered below that path, each receiving an
///    `EntryDelete` for its own path;
/// 3. listeners on every ancestor, nearest first, each receiving an
///    `EntryModify` for the ancestor carrying the original events.
///
/// # Examples
///
/// ```rust
/// use cluster_notify::core::{Kind, LocalDispatcher, ResourceNotification};
/// use cluster_notify::core::ResourceNotificationDispatcher;
/// use cluster_notify::error::ListenerError;
/// use std::sync::Arc;
///
/// let dispatcher = LocalDispatcher::new();
/// dispatcher.add_listener(
///     "styles",
///     Arc::new(|n: &ResourceNotification| -> Result<(), ListenerError> {
///         assert_eq!(n.kind(), Kind::EntryModify);
///         Ok(())
///     }),
/// );
///
/// let created = ResourceNotification::new("styles/foo.sld", Kind::EntryCreate);
/// let report = dispatcher.notify_local(&created);
/// assert_eq!(report.delivered, 1);
/// ```
pub struct LocalDispatcher {
    registry: ListenerRegistry,
    #[cfg(feature = "metrics")]
    metrics: OnceLock<DispatchMetrics>,
}

impl LocalDispatcher {
    /// Create a dispatcher with an empty registry.
    pub fn new() -> Self {
        Self::with_registry(ListenerRegistry::new())
    }

    /// Create a dispatcher over an existing registry.
    pub fn with_registry(registry: ListenerRegistry) -> Self {
        Self {
            registry,
            #[cfg(feature = "metrics")]
            metrics: OnceLock::new(),
        }
    }

    /// Attach a metrics collector.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(self, metrics: DispatchMetrics) -> Self {
        self.attach_metrics(metrics);
        self
    }

    /// Attach a metrics collector to a shared dispatcher.
    ///
    /// Returns `false` if one is already attached; the first one is kept.
    #[cfg(feature = "metrics")]
    pub fn attach_metrics(&self, metrics: DispatchMetrics) -> bool {
        let attached = self.metrics.set(metrics).is_ok();
        if attached {
            self.record_listener_count();
        }
        attached
    }

    /// Whether a metrics collector is attached.
    #[cfg(feature = "metrics")]
    pub fn has_metrics(&self) -> bool {
        self.metrics.get().is_some()
    }

    /// The underlying listener registry.
    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Register `listener` on `path` for as long as the handle lives.
    pub fn subscribe(&self, path: &str, listener: Arc<dyn ResourceListener>) -> ListenerHandle {
        let handle = self.registry.subscribe(path, listener);
        self.record_listener_count();
        handle
    }

    /// Deliver `notification` to local listeners only.
    ///
    /// Listener errors and panics are logged and counted; they never stop
    /// delivery to the remaining listeners and never reach the caller.
    pub fn notify_local(&self, notification: &ResourceNotification) -> LocalDelivery {
        let snapshot = self.registry.snapshot();
        let mut report = LocalDelivery::default();

        self.deliver_to_path(&snapshot, notification, &mut report);

        if notification.kind() == Kind::EntryDelete {
            let mut below: Vec<&String> = snapshot
                .keys()
                .filter(|p| paths::is_descendant(p.as_str(), notification.path()))
                .collect();
            below.sort();
            for path in below {
                let derived = notification.derive(path, Kind::EntryDelete);
                self.deliver_to_path(&snapshot, &derived, &mut report);
            }
        }

        for ancestor in paths::ancestors(notification.path()) {
            if snapshot.contains_key(ancestor) {
                let derived = notification.derive(ancestor, Kind::EntryModify);
                self.deliver_to_path(&snapshot, &derived, &mut report);
            }
        }

        debug!(
            notification = %notification,
            delivered = report.delivered,
            failed = report.failed,
            "Delivered resource notification locally"
        );

        #[cfg(feature = "metrics")]
        if let Some(metrics) = self.metrics.get() {
            metrics.record_listener_failures(report.failed as u64);
        }

        report
    }

    fn deliver_to_path(
        &self,
        snapshot: &ListenerMap,
        notification: &ResourceNotification,
        report: &mut LocalDelivery,
    ) {
        let Some(listeners) = snapshot.get(notification.path()) else {
            return;
        };
        for listener in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.changed(notification))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(path = notification.path(), error = %err, "Resource listener failed");
                }
                Err(payload) => {
                    report.failed += 1;
                    warn!(
                        path = notification.path(),
                        panic = panic_message(payload.as_ref()),
                        "Resource listener panicked"
                    );
                }
            }
        }
    }

    fn record_listener_count(&self) {
        #[cfg(feature = "metrics")]
        if let Some(metrics) = self.metrics.get() {
            metrics.update_listener_count(self.registry.listener_count() as i64);
        }
    }
}

impl ResourceNotificationDispatcher for LocalDispatcher {
    fn add_listener(&self, path: &str, listener: Arc<dyn ResourceListener>) -> bool {
        let added = self.registry.add(path, listener);
        self.record_listener_count();
        added
    }

    fn remove_listener(&self, path: &str, listener: &Arc<dyn ResourceListener>) -> bool {
        let removed = self.registry.remove(path, listener);
        self.record_listener_count();
        removed
    }

    fn changed(&self, notification: &ResourceNotification) {
        self.notify_local(notification);
    }
}

impl Default for LocalDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ListenerError;
    use parking_lot::Mutex;

    type Seen = Arc<Mutex<Vec<(String, Kind)>>>;

    fn recorder(seen: &Seen) -> Arc<dyn ResourceListener> {
        let seen = Arc::clone(seen);
        Arc::new(move |n: &ResourceNotification| -> Result<(), ListenerError> {
            seen.lock().push((n.path().to_string(), n.kind()));
            Ok(())
        })
    }

    #[test]
    fn test_delivers_to_path_listeners() {
        let dispatcher = LocalDispatcher::new();
        let seen = Seen::default();
        dispatcher.add_listener("styles/foo.sld", recorder(&seen));
        dispatcher.add_listener("styles/bar.sld", recorder(&seen));

        let report =
            dispatcher.notify_local(&ResourceNotification::new("styles/foo.sld", Kind::EntryModify));

        assert_eq!(report, LocalDelivery { delivered: 1, failed: 0 });
        assert_eq!(
            *seen.lock(),
            vec![("styles/foo.sld".to_string(), Kind::EntryModify)]
        );
    }

    #[test]
    fn test_ancestors_receive_modify() {
        let dispatcher = LocalDispatcher::new();
        let seen = Seen::default();
        dispatcher.add_listener("", recorder(&seen));
        dispatcher.add_listener("workspaces", recorder(&seen));
        dispatcher.add_listener("workspaces/topp", recorder(&seen));

        dispatcher.notify_local(&ResourceNotification::new(
            "workspaces/topp/states.xml",
            Kind::EntryCreate,
        ));

        assert_eq!(
            *seen.lock(),
            vec![
                ("workspaces/topp".to_string(), Kind::EntryModify),
                ("workspaces".to_string(), Kind::EntryModify),
                ("".to_string(), Kind::EntryModify),
            ]
        );
    }

    #[test]
    fn test_delete_reaches_descendants() {
        let dispatcher = LocalDispatcher::new();
        let seen = Seen::default();
        dispatcher.add_listener("styles", recorder(&seen));
        dispatcher.add_listener("styles/foo.sld", recorder(&seen));
        dispatcher.add_listener("stylesheets/x", recorder(&seen));

        dispatcher.notify_local(&ResourceNotification::new("styles", Kind::EntryDelete));

        assert_eq!(
            *seen.lock(),
            vec![
                ("styles".to_string(), Kind::EntryDelete),
                ("styles/foo.sld".to_string(), Kind::EntryDelete),
            ]
        );
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        let dispatcher = LocalDispatcher::new();
        let seen = Seen::default();

        dispatcher.add_listener(
            "styles",
            Arc::new(|_: &ResourceNotification| -> Result<(), ListenerError> {
                Err(ListenerError::new("boom"))
            }),
        );
        dispatcher.add_listener(
            "styles",
            Arc::new(|_: &ResourceNotification| -> Result<(), ListenerError> {
                panic!("listener exploded")
            }),
        );
        dispatcher.add_listener("styles", recorder(&seen));

        let report = dispatcher.notify_local(&ResourceNotification::new("styles", Kind::EntryModify));

        assert_eq!(report, LocalDelivery { delivered: 1, failed: 2 });
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_subscription_handle() {
        let dispatcher = LocalDispatcher::new();
        let seen = Seen::default();
        let handle = dispatcher.subscribe("styles", recorder(&seen));

        dispatcher.changed(&ResourceNotification::new("styles", Kind::EntryModify));
        drop(handle);
        dispatcher.changed(&ResourceNotification::new("styles", Kind::EntryModify));

        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_subscription_handle_keeps_existing_listener() {
        let dispatcher = LocalDispatcher::new();
        let seen = Seen::default();
        let listener = recorder(&seen);
        assert!(dispatcher.add_listener("styles", Arc::clone(&listener)));

        drop(dispatcher.subscribe("styles", Arc::clone(&listener)));
        dispatcher.changed(&ResourceNotification::new("styles", Kind::EntryModify));

        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("bad"));
        assert_eq!(panic_message(payload.as_ref()), "bad");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
