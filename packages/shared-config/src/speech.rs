//! Minimax text-to-speech configuration

use std::fmt;

use crate::{get_env_or_default, parse_env, ConfigResult};

/// Minimax speech synthesis settings
#[derive(Clone)]
pub struct SpeechConfig {
    pub api_key: String,

    /// Optional account group, sent as the `GroupId` query parameter
    pub group_id: Option<String>,

    pub base_url: String,
    pub model: String,
    pub voice_id: String,

    /// Upper bound on one synthesis call, in seconds
    pub timeout_secs: u64,
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("api_key", &"[REDACTED]")
            .field("group_id", &self.group_id)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("voice_id", &self.voice_id)
            .finish()
    }
}

impl SpeechConfig {
    /// Load from environment; `Ok(None)` when `MINIMAX_API_KEY` is unset
    pub fn from_env() -> ConfigResult<Option<Self>> {
        let api_key = match std::env::var("MINIMAX_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => return Ok(None),
        };

        Ok(Some(Self {
            api_key,
            group_id: std::env::var("MINIMAX_GROUP_ID")
                .ok()
                .filter(|s| !s.is_empty()),
            base_url: get_env_or_default("MINIMAX_BASE_URL", "https://api.minimax.io"),
            model: get_env_or_default("MINIMAX_MODEL", "speech-2.6-hd"),
            voice_id: get_env_or_default("MINIMAX_VOICE_ID", "English_expressive_narrator"),
            timeout_secs: parse_env("MINIMAX_TIMEOUT", 20)?,
        }))
    }

    /// Configuration against a custom URL (useful for testing)
    pub fn with_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            group_id: None,
            base_url: base_url.into(),
            model: "speech-2.6-hd".to_string(),
            voice_id: "English_expressive_narrator".to_string(),
            timeout_secs: 20,
        }
    }

    /// Full synthesis endpoint, including the group query when set
    pub fn synthesis_url(&self) -> String {
        let base = format!("{}/v1/t2a_v2", self.base_url.trim_end_matches('/'));
        match &self.group_id {
            Some(group) => format!("{}?GroupId={}", base, group),
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_url_with_group() {
        let mut config = SpeechConfig::with_url("https://api.minimax.io/", "k");
        assert_eq!(config.synthesis_url(), "https://api.minimax.io/v1/t2a_v2");

        config.group_id = Some("1890".to_string());
        assert_eq!(
            config.synthesis_url(),
            "https://api.minimax.io/v1/t2a_v2?GroupId=1890"
        );
    }

    #[test]
    fn test_missing_key_disables_speech() {
        temp_env::with_var_unset("MINIMAX_API_KEY", || {
            assert!(SpeechConfig::from_env().unwrap().is_none());
        });
    }
}
