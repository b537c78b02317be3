//! Listener capability for resource change notifications.

use crate::core::ResourceNotification;
use crate::error::ListenerError;

/// Something that wants to hear about resource changes.
///
/// Implemented for any `Fn(&ResourceNotification) -> Result<(), ListenerError>`
/// closure, so most callers never write an impl by hand.
///
/// # Examples
///
/// ```rust
/// use cluster_notify::core::{Kind, ResourceListener, ResourceNotification};
/// use cluster_notify::error::ListenerError;
///
/// let listener = |n: &ResourceNotification| -> Result<(), ListenerError> {
///     println!("{} changed", n.path());
///     Ok(())
/// };
/// listener
///     .changed(&ResourceNotification::new("styles/foo.sld", Kind::EntryModify))
///     .unwrap();
/// ```
pub trait ResourceListener: Send + Sync {
    /// Called once per delivered notification.
    ///
    /// # Errors
    ///
    /// An error is logged by the dispatcher and does not stop delivery to
    /// other listeners.
    fn changed(&self, notification: &ResourceNotification) -> Result<(), ListenerError>;
}

impl<F> ResourceListener for F
where
    F: Fn(&ResourceNotification) -> Result<(), ListenerError> + Send + Sync,
{
    fn changed(&self, notification: &ResourceNotification) -> Result<(), ListenerError> {
        self(notification)
    }
}
