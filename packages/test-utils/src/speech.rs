//! Mock Minimax text-to-speech server

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock Minimax `t2a_v2` endpoint
pub struct MockSpeechServer {
    server: MockServer,
}

impl MockSpeechServer {
    /// Start a new mock speech server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL (use as `MINIMAX_BASE_URL`)
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Return this hex audio for every synthesis request
    pub async fn mock_audio(&self, hex_audio: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/t2a_v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"audio": hex_audio, "status": 2},
                "extra_info": {"audio_format": "mp3", "audio_sample_rate": 32000},
                "base_resp": {"status_code": 0, "status_msg": "success"}
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer 200 with a non-zero `base_resp.status_code`
    pub async fn mock_api_error(&self, status_code: i64, message: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/t2a_v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "base_resp": {"status_code": status_code, "status_msg": message}
            })))
            .mount(&self.server)
            .await;
    }

    /// Respond only after a delay, for timeout tests
    pub async fn mock_slow(&self, delay_ms: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/t2a_v2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_millis(delay_ms))
                    .set_body_json(json!({
                        "data": {"audio": "ff", "status": 2},
                        "base_resp": {"status_code": 0, "status_msg": "success"}
                    })),
            )
            .mount(&self.server)
            .await;
    }
}
