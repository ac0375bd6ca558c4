//! Minimax text-to-speech
//!
//! Synthesis is best-effort: every failure is logged and reported as `None`
//! so a chat turn never fails because audio could not be produced.

use std::time::Duration;

use playhead_shared_config::SpeechConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

const USER_AGENT: &str = "Playhead/1.0";

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    model: &'a str,
    text: &'a str,
    stream: bool,
    voice_setting: VoiceSetting<'a>,
    audio_setting: AudioSetting,
    output_format: &'static str,
}

#[derive(Debug, Serialize)]
struct VoiceSetting<'a> {
    voice_id: &'a str,
    speed: f32,
    vol: f32,
    pitch: i32,
}

#[derive(Debug, Serialize)]
struct AudioSetting {
    sample_rate: u32,
    bitrate: u32,
    format: &'static str,
    channel: u8,
}

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    data: Option<SynthesisData>,
    base_resp: Option<BaseResponse>,
}

#[derive(Debug, Deserialize)]
struct SynthesisData {
    audio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BaseResponse {
    status_code: i64,
    #[serde(default)]
    status_msg: String,
}

/// Client for the `t2a_v2` endpoint
#[derive(Debug, Clone)]
pub struct SpeechService {
    client: Client,
    config: SpeechConfig,
}

impl SpeechService {
    pub fn new(config: SpeechConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, config })
    }

    /// Hex-encoded mp3 audio, or `None` on any failure
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn synthesize(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let payload = SynthesisRequest {
            model: &self.config.model,
            text,
            stream: false,
            voice_setting: VoiceSetting {
                voice_id: &self.config.voice_id,
                speed: 1.0,
                vol: 1.0,
                pitch: 0,
            },
            audio_setting: AudioSetting {
                sample_rate: 32000,
                bitrate: 128000,
                format: "mp3",
                channel: 1,
            },
            output_format: "hex",
        };

        let response = match self
            .client
            .post(self.config.synthesis_url())
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(timeout_secs = self.config.timeout_secs, "Speech synthesis timed out");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Speech synthesis request failed");
                return None;
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Speech synthesis returned an error status");
            return None;
        }

        let parsed: SynthesisResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Speech synthesis response was not valid JSON");
                return None;
            }
        };

        match parsed.base_resp {
            Some(base) if base.status_code == 0 => {}
            Some(base) => {
                warn!(
                    status_code = base.status_code,
                    message = %base.status_msg,
                    "Minimax rejected the synthesis request"
                );
                return None;
            }
            None => {
                warn!("Speech synthesis response had no base_resp");
                return None;
            }
        }

        let audio = parsed.data.and_then(|d| d.audio).filter(|a| !a.is_empty());
        match &audio {
            Some(hex) => debug!(audio_len = hex.len(), "Speech synthesized"),
            None => warn!("Speech synthesis response carried no audio"),
        }
        audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playhead_test_utils::MockSpeechServer;

    fn service_for(server: &MockSpeechServer) -> SpeechService {
        SpeechService::new(SpeechConfig::with_url(server.url(), "test-key")).unwrap()
    }

    #[tokio::test]
    async fn test_synthesize_returns_hex_audio() {
        let server = MockSpeechServer::start().await;
        server.mock_audio("49443304").await;

        let audio = service_for(&server).synthesize("Playing B by Band").await;
        assert_eq!(audio.as_deref(), Some("49443304"));
    }

    #[tokio::test]
    async fn test_api_error_yields_none() {
        let server = MockSpeechServer::start().await;
        server.mock_api_error(1004, "authentication failed").await;

        assert!(service_for(&server).synthesize("hello").await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_yields_none() {
        let server = MockSpeechServer::start().await;
        server.mock_slow(2_000).await;

        let mut config = SpeechConfig::with_url(server.url(), "test-key");
        config.timeout_secs = 1;
        let service = SpeechService::new(config).unwrap();

        assert!(service.synthesize("hello").await.is_none());
    }

    #[tokio::test]
    async fn test_empty_text_skips_request() {
        let server = MockSpeechServer::start().await;
        assert!(service_for(&server).synthesize("   ").await.is_none());
    }
}
