use std::path::PathBuf;

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// YAML parsing errors
    #[error("YAML parsing error in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    /// Configuration validation errors
    #[error("Configuration validation error: {0}")]
    Validation(String),
    /// Path resolution errors
    #[error("Path error: {0}")]
    Path(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
