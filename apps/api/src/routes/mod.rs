//! HTTP route handlers for the Playhead API
//!
//! - Chat turns streamed as server-sent events
//! - Player state read, sync and direct actions
//! - Conversation lifecycle
//! - Speech synthesis
//! - Health checks

pub mod chat;
pub mod conversations;
pub mod health;
pub mod playback;
pub mod speech;

pub use health::{health_router, HealthState};

use axum::Router;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::services::{ChatService, SessionStore, SpeechService};

/// Shared state for the application routes
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
    pub speech: Option<SpeechService>,
}

impl AppState {
    pub fn new(chat: ChatService) -> Self {
        Self { chat, speech: None }
    }

    pub fn with_speech(mut self, speech: SpeechService) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        self.chat.sessions()
    }
}

/// Every route except health, merged at the root
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .merge(chat::chat_router(state.clone()))
        .merge(playback::playback_router(state.clone()))
        .nest("/conversations", conversations::conversations_router(state.clone()))
        .merge(speech::speech_router(state))
}

/// Owner ids are mandatory wherever state is written
fn require_owner(raw: Option<&str>) -> ApiResult<Uuid> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::MissingField("owner_id"))?;

    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidBody("owner_id must be a UUID".to_string()))
}

/// Optional owner id; a malformed one is rejected rather than ignored
fn optional_owner(raw: Option<&str>) -> ApiResult<Option<Uuid>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| ApiError::InvalidQueryParam {
                name: "owner_id",
                reason: "must be a UUID".to_string(),
            }),
        None => Ok(None),
    }
}
