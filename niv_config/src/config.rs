use crate::error::{ConfigError, ConfigResult};
use crate::settings::IoSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure for niv editor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File load/save settings
    pub io: IoSettings,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file, creating the parent directory.
    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Validation(format!("cannot serialize config: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get configuration file search paths in priority order
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // User-specific config
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".niv").join("config.yaml"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("niv").join("config.yaml"));
        }

        // System-wide config
        paths.push(PathBuf::from("/etc/niv/config.yaml"));

        // Current directory
        if let Ok(current_dir) = std::env::current_dir() {
            paths.push(current_dir.join(".niv.yaml"));
        }

        paths
    }

    /// Load configuration with automatic path discovery
    pub fn load() -> ConfigResult<Self> {
        Self::load_with_paths(&Self::config_paths())
    }

    /// Load configuration from the first existing path
    pub fn load_with_paths(paths: &[PathBuf]) -> ConfigResult<Self> {
        for path in paths {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.io.chunk_size == 0 {
            return Err(ConfigError::Validation("chunk_size must be greater than 0".to_string()));
        }
        if self.io.max_buffers == 0 {
            return Err(ConfigError::Validation("max_buffers must be greater than 0".to_string()));
        }
        if self.io.default_encoding.trim().is_empty() {
            return Err(ConfigError::Validation("default_encoding must not be empty".to_string()));
        }
        Ok(())
    }
}
