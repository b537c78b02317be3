//! Settings loader that merges multiple sources.

use crate::error::{NotifyError, Result};
use crate::sources::ConfigSource;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Loads and merges settings from multiple sources.
///
/// Sources are applied lowest priority first, so a key set by a higher
/// priority source (environment variables, by default) wins.
pub struct SettingsLoader {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsLoader {
    /// Create a loader with no sources.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Add a settings source.
    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) {
        self.sources.push(source);
    }

    /// Whether any source has been added.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Load and merge settings from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if no source was added, any source fails to load, or
    /// the merged values do not deserialize into `T`.
    pub fn load<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if self.sources.is_empty() {
            return Err(NotifyError::LoadError(
                "No settings sources specified".to_string(),
            ));
        }

        let mut builder = config::Config::builder();

        for source in self.sorted() {
            let values = source.load().map_err(|e| {
                NotifyError::LoadError(format!("Failed to load source '{}': {}", source.name(), e))
            })?;
            debug!(source = %source.name(), keys = values.len(), "Merging settings source");

            for (key, value) in values {
                builder = builder.set_override(&key, value).map_err(|e| {
                    NotifyError::LoadError(format!(
                        "Failed to merge source '{}': {}",
                        source.name(),
                        e
                    ))
                })?;
            }
        }

        let merged = builder
            .build()
            .map_err(|e| NotifyError::LoadError(format!("Failed to build settings: {}", e)))?;

        merged.try_deserialize::<T>().map_err(|e| {
            NotifyError::DeserializationError(format!("Failed to deserialize settings: {}", e))
        })
    }

    /// Source names in the order they are merged.
    pub fn source_names(&self) -> Vec<String> {
        self.sorted().iter().map(|s| s.name()).collect()
    }

    fn sorted(&self) -> Vec<&dyn ConfigSource> {
        let mut sorted: Vec<&dyn ConfigSource> = self.sources.iter().map(|s| s.as_ref()).collect();
        sorted.sort_by_key(|s| s.priority());
        sorted
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}
