//! Filesystem watching for a resource store directory.
//!
//! Turns changes under a data directory into resource notifications and
//! hands them to a dispatcher.

pub mod watcher;

pub use watcher::ResourceWatcher;
