//! Settings source trait.

use crate::error::Result;
use std::collections::HashMap;

/// A place dispatcher settings can be read from.
///
/// Implement this to pull settings from somewhere other than files or the
/// environment, such as a cluster-wide key-value store.
pub trait ConfigSource: Send + Sync {
    /// Load settings as a flat key-value map.
    ///
    /// The returned map is merged with other sources by priority.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    fn load(&self) -> Result<HashMap<String, config::Value>>;

    /// Human-readable name for logs.
    fn name(&self) -> String;

    /// Priority of this source (higher wins).
    ///
    /// Default priorities:
    /// - Environment variables: 300
    /// - Files: 100, 110, 120, ... in the order added
    fn priority(&self) -> i32 {
        100
    }
}
