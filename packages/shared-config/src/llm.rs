//! Language model endpoint configuration

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::{get_env_or_default, parse_env, ConfigError, ConfigResult};

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Wire protocol spoken by the model server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// OpenAI-compatible Chat Completions (SSE streaming)
    #[default]
    OpenAi,
    /// Ollama `/api/chat` (NDJSON streaming)
    Ollama,
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai-compatible" | "openai_compat" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::InvalidValue(
                "LLM_PROVIDER".to_string(),
                format!("unknown provider '{}'", other),
            )),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Language model configuration
#[derive(Clone)]
pub struct LlmConfig {
    /// Which protocol the server speaks
    pub provider: LlmProvider,

    /// Base URL (`.../v1` for OpenAI-compatible servers, host root for Ollama)
    pub url: String,

    /// Bearer token; Ollama usually runs without one
    pub api_key: Option<String>,

    /// Model used for the chat agent
    pub model: String,

    /// Model used for conversation titles
    pub title_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens per completion
    pub max_tokens: u32,

    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("title_model", &self.title_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    /// Load model configuration from environment variables
    ///
    /// `LLM_*` variables take precedence; `OPENAI_BASE_URL` and
    /// `OPENAI_API_KEY` are accepted as fallbacks.
    pub fn from_env() -> ConfigResult<Self> {
        let provider: LlmProvider = get_env_or_default("LLM_PROVIDER", "openai").parse()?;

        let url = std::env::var("LLM_BASE_URL")
            .or_else(|_| std::env::var("OPENAI_BASE_URL"))
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Self::default_url(provider).to_string());

        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|s| !s.is_empty());

        let model = get_env_or_default("LLM_MODEL", DEFAULT_MODEL);
        let title_model = std::env::var("LLM_TITLE_MODEL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| model.clone());

        let config = Self {
            provider,
            url,
            api_key,
            model,
            title_model,
            timeout_secs: parse_env("LLM_TIMEOUT", 60)?,
            max_tokens: parse_env("LLM_MAX_TOKENS", 2048)?,
            temperature: parse_env("LLM_TEMPERATURE", 0.7)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration pointing at a custom URL (useful for testing)
    pub fn with_url(provider: LlmProvider, url: impl Into<String>) -> Self {
        Self {
            provider,
            url: url.into(),
            ..Self::default()
        }
    }

    fn default_url(provider: LlmProvider) -> &'static str {
        match provider {
            LlmProvider::OpenAi => OPENAI_DEFAULT_URL,
            LlmProvider::Ollama => OLLAMA_DEFAULT_URL,
        }
    }

    /// Check the URL parses and the temperature is in range
    pub fn validate(&self) -> ConfigResult<()> {
        Url::parse(&self.url)
            .map_err(|e| ConfigError::InvalidUrl("LLM_BASE_URL".to_string(), e.to_string()))?;

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue(
                "LLM_TEMPERATURE".to_string(),
                format!("{} is outside 0.0..=2.0", self.temperature),
            ));
        }

        Ok(())
    }

    /// Full URL of the chat endpoint for the configured provider
    pub fn chat_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        match self.provider {
            LlmProvider::OpenAi => format!("{}/chat/completions", base),
            LlmProvider::Ollama => format!("{}/api/chat", base),
        }
    }

    /// Cheap endpoint used for reachability checks
    pub fn models_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        match self.provider {
            LlmProvider::OpenAi => format!("{}/models", base),
            LlmProvider::Ollama => format!("{}/api/tags", base),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            url: OPENAI_DEFAULT_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            title_model: DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}
