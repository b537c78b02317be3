//! File-based settings source.

use super::ConfigSource;
use crate::error::{NotifyError, Result};
use config::File;
use std::collections::HashMap;
use std::path::PathBuf;

/// Reads settings from a YAML, TOML or JSON file.
///
/// The format is picked from the extension.
///
/// # Examples
///
/// ```rust,no_run
/// use cluster_notify::sources::FileSource;
///
/// let source = FileSource::new("config/cluster.yaml");
/// ```
pub struct FileSource {
    path: PathBuf,
    priority: i32,
}

impl FileSource {
    /// Create a file source with priority 100.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            priority: 100,
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn validate_extension(&self) -> Result<()> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                NotifyError::LoadError(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })?;

        match extension {
            "yaml" | "yml" | "toml" | "json" => Ok(()),
            _ => Err(NotifyError::LoadError(format!(
                "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                extension
            ))),
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        self.validate_extension()?;

        if !self.path.exists() {
            return Err(NotifyError::LoadError(format!(
                "Settings file not found: {}",
                self.path.display()
            )));
        }

        config::Config::builder()
            .add_source(File::from(self.path.clone()).required(true))
            .build()
            .map_err(|e| NotifyError::LoadError(format!("Failed to load file: {}", e)))?
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| NotifyError::DeserializationError(format!("Failed to parse file: {}", e)))
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_supported_extensions() {
        for name in ["cluster.yaml", "cluster.yml", "cluster.toml", "cluster.json"] {
            assert!(FileSource::new(name).validate_extension().is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(FileSource::new("cluster.properties").validate_extension().is_err());
        assert!(FileSource::new("cluster").validate_extension().is_err());
    }

    #[test]
    fn test_load_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cluster.toml");
        fs::write(&path, "node_id = \"node-a\"\ndedup_window = 16\n").unwrap();

        let map = FileSource::new(&path).load().unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("node_id"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = FileSource::new("/nonexistent/cluster.yaml").load();
        assert!(matches!(result, Err(NotifyError::LoadError(_))));
    }

    #[test]
    fn test_name_and_priority() {
        let source = FileSource::new("cluster.yaml").with_priority(200);
        assert_eq!(source.priority(), 200);
        assert!(source.name().contains("cluster.yaml"));
    }
}
