//! Copy-on-write registry of path-scoped resource listeners.

use crate::core::ResourceListener;
use crate::core::paths;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

/// Listeners keyed by normalized resource path, in registration order.
pub(crate) type ListenerMap = HashMap<String, Vec<Arc<dyn ResourceListener>>>;

/// Handle for a registration that can be dropped to unsubscribe.
///
/// When the handle is dropped, the listener is removed from the path it was
/// registered on. A handle for a listener that was already registered there
/// does not own that registration and leaves it in place.
pub struct ListenerHandle {
    path: String,
    listener: Arc<dyn ResourceListener>,
    registry: Arc<ArcSwap<ListenerMap>>,
    owned: bool,
}

impl ListenerHandle {
    /// Path the listener is registered on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether dropping this handle removes the registration.
    pub fn is_owned(&self) -> bool {
        self.owned
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.owned {
            remove_from(&self.registry, &self.path, &self.listener);
        }
    }
}

/// Registry for resource listeners.
///
/// Every mutation publishes a fresh map through `arc-swap`, so delivery
/// iterates a stable snapshot while other threads add or remove listeners.
/// A listener registered during a delivery is picked up by the next one.
///
/// # Examples
///
/// ```rust
/// use cluster_notify::core::{ListenerRegistry, ResourceListener, ResourceNotification};
/// use cluster_notify::error::ListenerError;
/// use std::sync::Arc;
///
/// let registry = ListenerRegistry::new();
/// let listener: Arc<dyn ResourceListener> =
///     Arc::new(|_: &ResourceNotification| -> Result<(), ListenerError> { Ok(()) });
///
/// assert!(registry.add("styles", Arc::clone(&listener)));
/// assert!(!registry.add("styles", Arc::clone(&listener)));
/// assert_eq!(registry.listener_count(), 1);
///
/// assert!(registry.remove("styles", &listener));
/// assert_eq!(registry.listener_count(), 0);
/// ```
pub struct ListenerRegistry {
    inner: Arc<ArcSwap<ListenerMap>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(ListenerMap::new())),
        }
    }

    /// Register `listener` on `path`.
    ///
    /// Returns `false` if that exact listener is already registered there.
    pub fn add(&self, path: &str, listener: Arc<dyn ResourceListener>) -> bool {
        let path = paths::normalize(path);
        let mut added = false;
        self.inner.rcu(|current| {
            let mut next = ListenerMap::clone(current);
            let entry = next.entry(path.clone()).or_default();
            added = !entry.iter().any(|l| Arc::ptr_eq(l, &listener));
            if added {
                entry.push(Arc::clone(&listener));
            }
            next
        });
        added
    }

    /// Unregister `listener` from `path`.
    ///
    /// Returns `false` if it was not registered there.
    pub fn remove(&self, path: &str, listener: &Arc<dyn ResourceListener>) -> bool {
        remove_from(&self.inner, &paths::normalize(path), listener)
    }

    /// Register `listener` on `path` and tie the registration to a handle.
    pub fn subscribe(&self, path: &str, listener: Arc<dyn ResourceListener>) -> ListenerHandle {
        let path = paths::normalize(path);
        let owned = self.add(&path, Arc::clone(&listener));
        ListenerHandle {
            path,
            listener,
            registry: Arc::clone(&self.inner),
            owned,
        }
    }

    /// Listeners currently registered on `path`.
    pub fn listeners(&self, path: &str) -> Vec<Arc<dyn ResourceListener>> {
        self.inner
            .load()
            .get(&paths::normalize(path))
            .cloned()
            .unwrap_or_default()
    }

    /// Paths that have at least one listener.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.inner.load().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Total number of registrations across all paths.
    pub fn listener_count(&self) -> usize {
        self.inner.load().values().map(Vec::len).sum()
    }

    /// Consistent view of every registration, used for a single delivery pass.
    pub(crate) fn snapshot(&self) -> Arc<ListenerMap> {
        self.inner.load_full()
    }
}

fn remove_from(
    registry: &ArcSwap<ListenerMap>,
    path: &str,
    listener: &Arc<dyn ResourceListener>,
) -> bool {
    let mut removed = false;
    registry.rcu(|current| {
        let mut next = ListenerMap::clone(current);
        removed = false;
        if let Some(entry) = next.get_mut(path) {
            let before = entry.len();
            entry.retain(|l| !Arc::ptr_eq(l, listener));
            removed = entry.len() != before;
            if entry.is_empty() {
                next.remove(path);
            }
        }
        next
    });
    removed
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ListenerRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
