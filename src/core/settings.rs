//! Dispatcher settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(feature = "validation")]
use crate::core::Validate;
#[cfg(feature = "validation")]
use crate::error::ValidationError;

/// Topic that carries resource notifications between nodes.
pub const DEFAULT_TOPIC: &str = "resourceWatcher";

/// How the publishing node's own listeners learn about a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelfDelivery {
    /// Publish only; local listeners are notified when the topic echoes the
    /// message back to this node.
    #[default]
    Echo,
    /// Notify local listeners first, then publish; inbound copies of this
    /// node's own messages are skipped.
    Immediate,
}

/// Settings for a [`ClusterDispatcher`](crate::cluster::ClusterDispatcher).
///
/// Every field has a default, so a partial file or a handful of environment
/// variables is enough.
///
/// ```yaml
/// node_id: node-a
/// topic: resourceWatcher
/// self_delivery: echo
/// dedup_window: 1024
/// watch_debounce_ms: 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    /// Identity stamped on outgoing notifications. Generated when absent.
    pub node_id: Option<String>,
    /// Name of the shared topic.
    pub topic: String,
    /// Local delivery policy for broadcasts.
    pub self_delivery: SelfDelivery,
    /// How many `(origin, sequence)` pairs to remember for duplicate drops.
    pub dedup_window: usize,
    /// Coalescing window for filesystem events, in milliseconds.
    pub watch_debounce_ms: u64,
}

impl ClusterSettings {
    /// Node identity, falling back to a fresh random id.
    pub fn resolved_node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    /// Filesystem event coalescing window.
    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            node_id: None,
            topic: DEFAULT_TOPIC.to_string(),
            self_delivery: SelfDelivery::Echo,
            dedup_window: 1024,
            watch_debounce_ms: 500,
        }
    }
}

#[cfg(feature = "validation")]
impl Validate for ClusterSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if self.topic.trim().is_empty() {
            errors.push(ValidationError::invalid_field("topic", "must not be empty"));
        } else if self.topic.chars().any(char::is_whitespace) {
            errors.push(ValidationError::invalid_field(
                "topic",
                "must not contain whitespace",
            ));
        }

        if self.dedup_window == 0 {
            errors.push(ValidationError::invalid_field(
                "dedup_window",
                "must be greater than 0",
            ));
        }

        if let Some(node_id) = &self.node_id {
            if node_id.trim().is_empty() {
                errors.push(ValidationError::invalid_field("node_id", "must not be blank"));
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}
