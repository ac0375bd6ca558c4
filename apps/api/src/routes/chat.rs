//! Chat endpoint
//!
//! `POST /chat` answers with `text/event-stream`. Each event's name matches
//! the `event` field of its JSON payload and the stream always ends with
//! `done`.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use super::{require_owner, AppState};
use crate::error::{ApiError, ApiResult};
use crate::services::TurnEvent;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Attach synthesized audio to `done`
    #[serde(default)]
    pub speak: bool,
}

pub fn chat_router(state: AppState) -> Router {
    Router::new().route("/chat", post(chat)).with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let owner_id = require_owner(request.owner_id.as_deref())?;

    let session_id = match request.session_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Uuid::parse_str(raw)
            .map_err(|_| ApiError::InvalidBody("session_id must be a UUID".to_string()))?,
        _ => Uuid::new_v4(),
    };

    info!(session_id = %session_id, owner_id = %owner_id, "Chat turn requested");

    let events = state
        .chat
        .start_turn(session_id, owner_id, request.message, request.speak)
        .await?;

    let stream = ReceiverStream::new(events).map(|event| Ok(to_sse(&event)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &TurnEvent) -> Event {
    let payload = serde_json::to_string(event).unwrap_or_else(|e| {
        warn!(event = event.name(), error = %e, "Failed to encode stream event");
        "{}".to_string()
    });
    Event::default().event(event.name()).data(payload)
}
