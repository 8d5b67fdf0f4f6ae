//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse failure.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Referenced environment variable is not set.
    #[error("environment variable not set: {0}")]
    EnvVarNotSet(String),

    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
