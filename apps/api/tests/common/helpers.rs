//! Test helper functions for API integration tests
//!
//! Builds the application router against a mock model server and the
//! in-memory conversation store, and decodes streamed chat responses.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use playhead_api::services::{ChatService, HealthService, SessionStore, SpeechService, TitleGenerator};
use playhead_api::{build_router, AppState, HealthState};
use playhead_llm_client::LlmClient;
use playhead_shared_config::{LlmConfig, LlmProvider, SpeechConfig};
use playhead_test_utils::MockLlmServer;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use super::memory_repo::MemoryConversationRepository;

/// Model client against the mock server, failing fast
pub fn test_llm(url: &str) -> LlmClient {
    let mut config = LlmConfig::with_url(LlmProvider::OpenAi, url);
    config.api_key = Some("test-key".to_string());
    config.timeout_secs = 5;
    LlmClient::new(&config)
        .expect("llm client")
        .with_retry_config(0, 0)
}

/// Ollama client against the mock server's `/api/chat`
pub fn test_ollama(url: &str) -> LlmClient {
    let mut config = LlmConfig::with_url(LlmProvider::Ollama, url);
    config.timeout_secs = 5;
    LlmClient::new(&config)
        .expect("ollama client")
        .with_retry_config(0, 0)
}

/// A running app wired to mocks
pub struct TestApp {
    pub llm: MockLlmServer,
    pub repo: Arc<MemoryConversationRepository>,
    pub chat: ChatService,
    pub router: Router,
    pub owner: Uuid,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::build(LlmProvider::OpenAi, None, false).await
    }

    /// Title generation enabled against the same mock server
    pub async fn with_titles() -> Self {
        Self::build(LlmProvider::OpenAi, None, true).await
    }

    /// Model rounds served as Ollama NDJSON
    pub async fn with_ollama() -> Self {
        Self::build(LlmProvider::Ollama, None, false).await
    }

    /// Speech synthesis against a mock Minimax server
    pub async fn with_speech(speech_url: &str) -> Self {
        let speech = SpeechService::new(SpeechConfig::with_url(speech_url, "speech-key"))
            .expect("speech client");
        Self::build(LlmProvider::OpenAi, Some(speech), false).await
    }

    async fn build(provider: LlmProvider, speech: Option<SpeechService>, titles: bool) -> Self {
        let llm = MockLlmServer::start().await;
        let repo = Arc::new(MemoryConversationRepository::new());
        let client = match provider {
            LlmProvider::OpenAi => test_llm(&llm.url()),
            LlmProvider::Ollama => test_ollama(&llm.url()),
        };

        let mut sessions = SessionStore::new(repo.clone());
        if titles {
            sessions = sessions
                .with_title_generator(TitleGenerator::new(client.clone(), Duration::from_secs(2)));
        }

        let mut chat = ChatService::new(client, sessions);
        if let Some(speech) = &speech {
            chat = chat.with_speech(speech.clone());
        }

        let mut state = AppState::new(chat.clone());
        if let Some(speech) = speech {
            state = state.with_speech(speech);
        }

        let router = build_router(state, HealthState::new(HealthService::default()));

        Self {
            llm,
            repo,
            chat,
            router,
            owner: Uuid::new_v4(),
        }
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Run one chat turn to completion and return its events
    pub async fn chat(&self, session_id: Uuid, message: &str) -> Vec<Value> {
        let response = self
            .post(
                "/chat",
                serde_json::json!({
                    "message": message,
                    "session_id": session_id,
                    "owner_id": self.owner,
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        sse_events(response).await
    }
}

/// Collect a response body as JSON
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Decode every `data:` payload of a finished event stream
///
/// Asserts that each SSE event name matches the payload's `event` field.
pub async fn sse_events(response: Response) -> Vec<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    text.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    name = Some(value.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data = Some(value.trim().to_string());
                }
            }
            let payload: Value = serde_json::from_str(&data?).unwrap();
            assert_eq!(Some(payload["event"].as_str().unwrap().to_string()), name);
            Some(payload)
        })
        .collect()
}

/// Names of the events, in order
pub fn event_names(events: &[Value]) -> Vec<&str> {
    events.iter().filter_map(|e| e["event"].as_str()).collect()
}

/// Concatenated text deltas
pub fn streamed_text(events: &[Value]) -> String {
    events
        .iter()
        .filter(|e| e["event"] == "text")
        .filter_map(|e| e["content"].as_str())
        .collect()
}
