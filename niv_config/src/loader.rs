use crate::config::Config;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Configuration loader with hot-reload capabilities
pub struct ConfigLoader {
    /// Current configuration
    config: Config,
    /// Configuration file paths
    paths: Vec<PathBuf>,
    /// Last modification times for each path
    last_modified: Vec<Option<SystemTime>>,
    /// Minimum time between reload checks
    reload_interval: Duration,
    /// Last reload time
    last_reload: Option<Instant>,
}

impl ConfigLoader {
    /// Create a new configuration loader with default paths
    pub fn new() -> Self {
        Self::with_paths(Config::config_paths())
    }

    /// Create a new configuration loader with custom paths
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        let len = paths.len();
        Self {
            config: Config::default(),
            paths,
            last_modified: vec![None; len],
            reload_interval: Duration::from_secs(1),
            last_reload: None,
        }
    }

    /// Set auto-reload interval
    pub fn with_reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }

    /// Load configuration from the first available path
    pub fn load(&mut self) -> ConfigResult<()> {
        self.config = Config::load_with_paths(&self.paths)?;
        self.last_modified = self.paths.iter().map(|path| modified_time(path)).collect();
        self.last_reload = Some(Instant::now());
        Ok(())
    }

    /// Current configuration
    pub fn get(&self) -> &Config {
        &self.config
    }

    /// Path of the file the configuration came from, if any
    pub fn source(&self) -> Option<&Path> {
        self.paths.iter().find(|path| path.exists()).map(PathBuf::as_path)
    }

    /// Check if configuration files have been modified and reload if necessary
    pub fn check_reload(&mut self) -> ConfigResult<bool> {
        if self.last_reload.is_some_and(|at| at.elapsed() < self.reload_interval) {
            return Ok(false);
        }

        let needs_reload = self
            .paths
            .iter()
            .zip(&self.last_modified)
            .any(|(path, last)| match (modified_time(path), last) {
                (Some(now), Some(last)) => now > *last,
                // Appeared or was deleted
                (Some(_), None) | (None, Some(_)) => true,
                (None, None) => false,
            });

        if needs_reload {
            tracing::info!("Configuration changed on disk, reloading");
            self.load()?;
        }
        Ok(needs_reload)
    }

    /// Save current configuration to the first path
    pub fn save(&self) -> ConfigResult<()> {
        match self.paths.first() {
            Some(path) => self.config.save_to_file(path),
            None => Err(ConfigError::Path("No configuration paths available".to_string())),
        }
    }

    /// Get all configuration paths
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}
