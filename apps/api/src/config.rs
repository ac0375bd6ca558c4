//! API server configuration

use std::env;

use anyhow::{bail, Context, Result};
use playhead_shared_config::{
    AppleMusicConfig, CommonConfig, DatabaseConfig, Environment, LlmConfig, LlmProvider,
    SpeechConfig,
};

/// Most past messages the agent ever sees
const MAX_CHAT_HISTORY_WINDOW: usize = 10;

/// API server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with the client crates
    pub common: CommonConfig,

    /// Server port (default: 8000)
    pub port: u16,

    /// CORS allowed origins (optional)
    pub cors_allowed_origins: Option<Vec<String>>,

    /// Bound on one title generation, in seconds (default: 5)
    pub title_timeout_secs: u64,

    /// Past messages sent to the agent (default and maximum: 10)
    pub chat_history_window: usize,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// In production mode, this function requires:
    /// - `DATABASE_URL`: Must be explicitly set (no insecure defaults)
    /// - `LLM_API_KEY` (or `OPENAI_API_KEY`) when the provider is OpenAI
    pub fn from_env() -> Result<Self> {
        let environment = Environment::from_env();

        if environment.is_production() {
            Self::validate_database_url()?;
        }

        let common = CommonConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        if environment.is_production() {
            Self::validate_llm_credentials(&common.llm)?;
        }

        let chat_history_window: usize = env::var("CHAT_HISTORY_WINDOW")
            .unwrap_or_else(|_| MAX_CHAT_HISTORY_WINDOW.to_string())
            .parse()
            .context("Invalid CHAT_HISTORY_WINDOW value")?;

        Ok(Self {
            common,

            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("Invalid PORT value")?,

            cors_allowed_origins: env::var("CORS_ORIGINS").ok().map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),

            title_timeout_secs: env::var("TITLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid TITLE_TIMEOUT_SECS value")?,

            chat_history_window: chat_history_window.min(MAX_CHAT_HISTORY_WINDOW),
        })
    }

    /// Validate that DATABASE_URL is explicitly set in production
    fn validate_database_url() -> Result<()> {
        match env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => Ok(()),
            _ => {
                bail!(
                    "DATABASE_URL environment variable is required in production. \
                     Please set your PostgreSQL connection string."
                );
            }
        }
    }

    /// Hosted OpenAI-compatible servers need a key; local Ollama does not
    fn validate_llm_credentials(llm: &LlmConfig) -> Result<()> {
        if llm.provider == LlmProvider::OpenAi && llm.api_key.is_none() {
            bail!(
                "LLM_API_KEY environment variable is required in production \
                 when LLM_PROVIDER is openai."
            );
        }
        Ok(())
    }

    // Convenience accessors for common config fields

    pub fn database(&self) -> &DatabaseConfig {
        &self.common.database
    }

    pub fn llm(&self) -> &LlmConfig {
        &self.common.llm
    }

    pub fn apple_music(&self) -> Option<&AppleMusicConfig> {
        self.common.apple_music.as_ref()
    }

    pub fn speech(&self) -> Option<&SpeechConfig> {
        self.common.speech.as_ref()
    }

    pub fn environment(&self) -> Environment {
        self.common.environment
    }

    pub fn is_production(&self) -> bool {
        self.common.environment.is_production()
    }
}
