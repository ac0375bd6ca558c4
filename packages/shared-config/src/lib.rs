//! Shared configuration types for Playhead services
//!
//! Every external dependency of the chat backend (Postgres, the language
//! model server, the Apple Music catalog, Minimax speech) is configured here
//! from environment variables so the API binary and the client crates agree
//! on names and defaults.

mod apple_music;
mod database;
mod error;
mod llm;
mod speech;

pub use apple_music::{
    clamp_token_ttl, AppleMusicConfig, AppleMusicCredentials, MAX_TOKEN_TTL_SECS,
    MIN_TOKEN_TTL_SECS,
};
pub use database::DatabaseConfig;
pub use error::{ConfigError, ConfigResult};
pub use llm::{LlmConfig, LlmProvider};
pub use speech::SpeechConfig;

use std::env;

/// Configuration shared by every Playhead service
#[derive(Debug, Clone)]
pub struct CommonConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Language model configuration
    pub llm: LlmConfig,

    /// Apple Music catalog (optional)
    pub apple_music: Option<AppleMusicConfig>,

    /// Minimax speech synthesis (optional)
    pub speech: Option<SpeechConfig>,

    /// Environment mode (development, staging, production)
    pub environment: Environment,

    /// Log level (from RUST_LOG or LOG_LEVEL)
    pub log_level: String,
}

/// Application environment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        })
    }
}

impl Environment {
    /// Read `ENVIRONMENT`, defaulting to development
    pub fn from_env() -> Self {
        get_env_or_default("ENVIRONMENT", "development")
            .parse()
            .unwrap_or_default()
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl CommonConfig {
    /// Load common configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            database: DatabaseConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            apple_music: AppleMusicConfig::from_env()?,
            speech: SpeechConfig::from_env()?,
            environment: Environment::from_env(),
            log_level: env::var("RUST_LOG")
                .or_else(|_| env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Whether tools can resolve tracks against the catalog
    pub fn has_catalog(&self) -> bool {
        self.apple_music.is_some()
    }

    /// Whether replies can be voiced
    pub fn has_speech(&self) -> bool {
        self.speech.is_some()
    }
}

/// Helper function to get a required environment variable
pub fn get_required_env(name: &str) -> ConfigResult<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("stage".parse::<Environment>().unwrap(), Environment::Staging);
        assert_eq!(
            "anything".parse::<Environment>().unwrap(),
            Environment::Development
        );
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Production.to_string(), "production");
        assert_eq!(Environment::Development.to_string(), "development");
    }

    #[test]
    fn test_parse_env_reports_variable_name() {
        temp_env::with_var("PLAYHEAD_TEST_NUMBER", Some("twelve"), || {
            let err = parse_env::<u32>("PLAYHEAD_TEST_NUMBER", 1).unwrap_err();
            assert!(err.to_string().contains("PLAYHEAD_TEST_NUMBER"));
        });
    }

    #[test]
    fn test_required_env_rejects_empty() {
        temp_env::with_var("PLAYHEAD_TEST_REQUIRED", Some(""), || {
            assert!(matches!(
                get_required_env("PLAYHEAD_TEST_REQUIRED"),
                Err(ConfigError::MissingEnvVar(_))
            ));
        });
    }
}
