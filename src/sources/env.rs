//! Environment variable settings source.

use super::ConfigSource;
use crate::error::{NotifyError, Result};
use config::Environment;
use std::collections::HashMap;

/// Reads settings from environment variables sharing a prefix.
///
/// # Examples
///
/// ```rust
/// use cluster_notify::sources::EnvSource;
///
/// // CLUSTER_NOTIFY_TOPIC=configEvents -> topic = "configEvents"
/// let source = EnvSource::new("CLUSTER_NOTIFY", "__");
/// ```
pub struct EnvSource {
    prefix: String,
    separator: String,
    priority: i32,
}

impl EnvSource {
    /// Create a source for variables named `<prefix>_<key>`.
    ///
    /// `separator` splits nested keys.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            priority: 300,
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        let env_source = Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(&self.separator)
            .try_parsing(true);

        config::Config::builder()
            .add_source(env_source)
            .build()
            .map_err(|e| {
                NotifyError::LoadError(format!("Failed to load environment variables: {}", e))
            })?
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| {
                NotifyError::DeserializationError(format!(
                    "Failed to parse environment variables: {}",
                    e
                ))
            })
    }

    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
