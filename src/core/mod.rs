//! Core notification types and local delivery.

mod dispatcher;
mod listener;
mod loader;
mod notification;
pub mod paths;
mod registry;
mod settings;

#[cfg(feature = "validation")]
mod validation;

pub use dispatcher::{LocalDelivery, LocalDispatcher, ResourceNotificationDispatcher};
pub use listener::ResourceListener;
pub use loader::SettingsLoader;
pub use notification::{Event, Kind, ResourceNotification};
pub use registry::{ListenerHandle, ListenerRegistry};
pub use settings::{ClusterSettings, DEFAULT_TOPIC, SelfDelivery};

#[cfg(feature = "validation")]
pub use validation::Validate;
