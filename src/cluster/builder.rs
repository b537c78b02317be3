//! Builder for constructing ClusterDispatcher instances.

use crate::cluster::{ClusterDispatcher, ClusterHandle};
use crate::core::{ClusterSettings, LocalDispatcher, SettingsLoader};
use crate::error::Result;
use crate::sources::{ConfigSource, EnvSource, FileSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(feature = "validation")]
use crate::core::Validate;
#[cfg(feature = "validation")]
use crate::error::NotifyError;

#[cfg(feature = "metrics")]
use crate::metrics::DispatchMetrics;
#[cfg(feature = "metrics")]
use tracing::debug;

/// Builder for a [`ClusterDispatcher`].
///
/// Settings come from, in increasing priority: files (in the order added),
/// custom sources, then environment variables. Explicit settings passed to
/// [`with_settings`](Self::with_settings) skip loading altogether.
///
/// # Examples
///
/// ```rust,no_run
/// use cluster_notify::prelude::*;
///
/// # fn example() -> Result<()> {
/// let cluster = MemoryCluster::new();
/// let dispatcher = ClusterDispatcher::builder()
///     .with_file("config/cluster.yaml")
///     .with_env_overrides("CLUSTER_NOTIFY", "__")
///     .with_cluster(cluster)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClusterDispatcherBuilder {
    file_paths: Vec<PathBuf>,
    env_prefix: Option<String>,
    env_separator: Option<String>,
    custom_sources: Vec<Box<dyn ConfigSource>>,
    settings: Option<ClusterSettings>,
    local: Option<Arc<LocalDispatcher>>,
    cluster: Option<Arc<dyn ClusterHandle>>,
    #[cfg(feature = "metrics")]
    metrics: Option<DispatchMetrics>,
}

impl ClusterDispatcherBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            file_paths: Vec::new(),
            env_prefix: None,
            env_separator: None,
            custom_sources: Vec::new(),
            settings: None,
            local: None,
            cluster: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Add a settings file (`.yaml`, `.yml`, `.toml` or `.json`).
    ///
    /// Later files override earlier ones.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_paths.push(path.into());
        self
    }

    /// Read overrides from environment variables.
    ///
    /// With prefix `CLUSTER_NOTIFY`, `CLUSTER_NOTIFY_TOPIC=configEvents` sets
    /// `topic`.
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.env_separator = Some(separator.to_string());
        self
    }

    /// Add a custom settings source.
    pub fn with_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.custom_sources.push(Box::new(source));
        self
    }

    /// Use these settings instead of loading any source.
    pub fn with_settings(mut self, settings: ClusterSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Deliver through an existing local dispatcher (and its listeners).
    ///
    /// With [`with_metrics`](Self::with_metrics) the collector is attached to
    /// this dispatcher too, unless it already carries one.
    pub fn with_local(mut self, local: Arc<LocalDispatcher>) -> Self {
        self.local = Some(local);
        self
    }

    /// Bind this cluster once the dispatcher is built.
    ///
    /// A cluster that cannot provide the topic yet does not fail the build:
    /// the dispatcher starts unbound and can be bound later.
    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterHandle>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Record dispatch metrics with the provided meter.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(DispatchMetrics::new(meter));
        self
    }

    /// Build the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings source fails to load or deserialize, or
    /// if the settings do not validate.
    pub fn build(self) -> Result<ClusterDispatcher> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => {
                let mut loader = SettingsLoader::new();

                for (index, path) in self.file_paths.iter().enumerate() {
                    let priority = 100 + (index as i32 * 10);
                    loader.add_source(Box::new(FileSource::new(path).with_priority(priority)));
                }

                for source in self.custom_sources {
                    loader.add_source(source);
                }

                if let (Some(prefix), Some(separator)) = (self.env_prefix, self.env_separator) {
                    loader.add_source(Box::new(EnvSource::new(prefix, separator)));
                }

                if loader.is_empty() {
                    ClusterSettings::default()
                } else {
                    loader.load::<ClusterSettings>()?
                }
            }
        };

        #[cfg(feature = "validation")]
        settings
            .validate()
            .map_err(|e| NotifyError::ValidationError(e.to_string()))?;

        let local = self
            .local
            .unwrap_or_else(|| Arc::new(LocalDispatcher::new()));

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            if !local.attach_metrics(metrics.clone()) {
                debug!("Local dispatcher already records metrics, keeping its collector");
            }
        }

        let dispatcher = ClusterDispatcher::assemble(
            settings,
            local,
            #[cfg(feature = "metrics")]
            self.metrics,
        );

        info!(
            node_id = dispatcher.node_id(),
            topic = %dispatcher.settings().topic,
            self_delivery = ?dispatcher.settings().self_delivery,
            "Resource notification dispatcher created"
        );

        if let Some(cluster) = self.cluster {
            if let Err(err) = dispatcher.bind(cluster) {
                warn!(error = %err, "Cluster not ready, dispatcher starts unbound");
            }
        }

        Ok(dispatcher)
    }
}

impl Default for ClusterDispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{DispatcherState, MemoryCluster};
    use crate::core::SelfDelivery;

    #[test]
    fn test_builder_accumulates_files() {
        let builder = ClusterDispatcherBuilder::new()
            .with_file("cluster1.yaml")
            .with_file("cluster2.yaml");

        assert_eq!(builder.file_paths.len(), 2);
    }

    #[test]
    fn test_builder_env_overrides() {
        let builder = ClusterDispatcherBuilder::new().with_env_overrides("APP", "__");

        assert_eq!(builder.env_prefix, Some("APP".to_string()));
        assert_eq!(builder.env_separator, Some("__".to_string()));
    }

    #[test]
    fn test_build_without_sources_uses_defaults() {
        let dispatcher = ClusterDispatcherBuilder::new().build().unwrap();
        assert_eq!(dispatcher.settings().topic, "resourceWatcher");
        assert_eq!(dispatcher.state(), DispatcherState::Unbound);
    }

    #[test]
    fn test_build_binds_cluster() {
        let cluster = MemoryCluster::new();
        let dispatcher = ClusterDispatcherBuilder::new()
            .with_settings(ClusterSettings {
                node_id: Some("node-a".to_string()),
                self_delivery: SelfDelivery::Immediate,
                ..Default::default()
            })
            .with_cluster(cluster)
            .build()
            .unwrap();

        assert_eq!(dispatcher.node_id(), "node-a");
        assert_eq!(dispatcher.state(), DispatcherState::Bound);
    }

    #[test]
    fn test_build_tolerates_unready_cluster() {
        let cluster = MemoryCluster::new();
        cluster.set_enabled(false);

        let dispatcher = ClusterDispatcherBuilder::new()
            .with_cluster(cluster)
            .build()
            .unwrap();
        assert_eq!(dispatcher.state(), DispatcherState::Unbound);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_metrics_reach_provided_local_dispatcher() {
        let local = Arc::new(LocalDispatcher::new());
        assert!(!local.has_metrics());

        let dispatcher = ClusterDispatcherBuilder::new()
            .with_local(Arc::clone(&local))
            .with_metrics(opentelemetry::global::meter("test_provided_local"))
            .build()
            .unwrap();

        assert!(local.has_metrics());
        assert!(Arc::ptr_eq(dispatcher.local(), &local));
    }

    #[cfg(feature = "validation")]
    #[test]
    fn test_build_rejects_invalid_settings() {
        let result = ClusterDispatcherBuilder::new()
            .with_settings(ClusterSettings {
                dedup_window: 0,
                ..Default::default()
            })
            .build();

        assert!(matches!(result, Err(NotifyError::ValidationError(_))));
    }
}
