//! Configuration types for Recall.
//!
//! Configuration is loaded from a YAML file (`recall.yaml`) and combined
//! with a small set of environment overrides. Every field has a default so
//! an empty (or absent) file yields a working configuration.

pub mod recipes;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub use recipes::RecipeConfig;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Complete Recall configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecallConfig {
    /// Optional project name, used only for log context.
    #[serde(default)]
    pub project: Option<String>,

    /// Recipe cache settings.
    #[serde(default)]
    pub recipes: RecipeConfig,
}

impl RecallConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&text)
    }

    /// Parse configuration from YAML text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        let config: RecallConfig = serde_yaml::from_str(text)?;
        Ok(config)
    }

    /// Load from a file when one is given, otherwise start from defaults;
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `RECALL_*` environment overrides.
    ///
    /// Supported: `RECALL_RECIPES_ENABLED` (bool-ish) and
    /// `RECALL_RECIPE_CACHE_SIZE` (usize). Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RECALL_RECIPES_ENABLED") {
            match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => self.recipes.enabled = true,
                "false" | "0" | "no" => self.recipes.enabled = false,
                _ => {}
            }
        }
        if let Ok(v) = std::env::var("RECALL_RECIPE_CACHE_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                if n > 0 {
                    self.recipes.capacity = n;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = RecallConfig::from_str("{}").unwrap();
        assert!(config.recipes.enabled);
        assert_eq!(config.recipes.capacity, 64);
        assert_eq!(config.recipes.suggest_limit, 3);
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let config = RecallConfig::from_str(
            "project: demo\nrecipes:\n  capacity: 8\n",
        )
        .unwrap();
        assert_eq!(config.project.as_deref(), Some("demo"));
        assert_eq!(config.recipes.capacity, 8);
        assert_eq!(config.recipes.suggest_limit, 3);
    }

    #[test]
    fn from_file_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recall.yaml");
        std::fs::write(&path, "recipes:\n  enabled: false\n").unwrap();

        let config = RecallConfig::from_file(&path).unwrap();
        assert!(!config.recipes.enabled);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = RecallConfig::from_file("/nonexistent/recall.yaml");
        assert!(matches!(err, Err(ConfigError::Io { .. })));
    }
}
