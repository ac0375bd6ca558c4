//! Standalone speech synthesis
//!
//! `POST /speech` answers `{"audio": "<hex mp3>"}`, or `{"audio": null}` when
//! synthesis is unconfigured or fails.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SpeechResponse {
    pub audio: Option<String>,
}

pub fn speech_router(state: AppState) -> Router {
    Router::new().route("/speech", post(speak)).with_state(state)
}

async fn speak(
    State(state): State<AppState>,
    Json(request): Json<SpeechRequest>,
) -> Json<SpeechResponse> {
    let audio = match &state.speech {
        Some(speech) => speech.synthesize(&request.text).await,
        None => None,
    };
    Json(SpeechResponse { audio })
}
