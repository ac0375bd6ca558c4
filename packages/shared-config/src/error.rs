//! Errors raised while loading Playhead settings from the environment

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Variable name, then why its value was rejected
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("invalid URL format for {0}: {1}")]
    InvalidUrl(String, String),

    /// The Apple Music signing key file could not be read
    #[error("cannot read private key at {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Settings that parse individually but don't make sense together
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
