//! Player state endpoints
//!
//! - `GET /state` - Session snapshot with the last 20 messages
//! - `POST /state/sync` - Client player pushes its state back
//! - `POST /action/{action}` - Direct play / skip without the agent

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::{optional_owner, AppState};
use crate::error::{ApiError, ApiResult};
use crate::models::{ChatMessage, PlaybackUpdate, SessionState, Track};
use crate::services::session_store::parse_id;

/// Messages returned by `GET /state`
const STATE_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct StateQuery {
    pub session_id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub session_id: Uuid,
    pub current_track: Option<Track>,
    pub playlist: Vec<Track>,
    pub is_playing: bool,
    pub playback_position: f64,
    pub chat_history: Vec<ChatMessage>,
    pub last_sync: DateTime<Utc>,
}

impl From<SessionState> for StateResponse {
    fn from(session: SessionState) -> Self {
        let chat_history = session.recent_history(STATE_HISTORY_LIMIT).to_vec();
        Self {
            session_id: session.session_id,
            current_track: session.current_track,
            playlist: session.playlist,
            is_playing: session.is_playing,
            playback_position: session.playback_position,
            chat_history,
            last_sync: session.last_sync,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(flatten)]
    pub update: PlaybackUpdate,
}

/// Outcome of a sync; never an HTTP error
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncResponse {
    Synced {
        session_id: Uuid,
        last_sync: DateTime<Utc>,
    },
    NoSession,
    Error {
        message: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub index: Option<i64>,
}

pub fn playback_router(state: AppState) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/state/sync", post(sync_state))
        .route("/action/:action", post(execute_action))
        .with_state(state)
}

async fn get_state(
    State(state): State<AppState>,
    Query(query): Query<StateQuery>,
) -> ApiResult<Json<StateResponse>> {
    let owner = optional_owner(query.owner_id.as_deref())?;
    let session_id =
        parse_id(&query.session_id).ok_or_else(|| ApiError::not_found("session", &query.session_id))?;

    let session = state
        .sessions()
        .get(session_id, owner)
        .await
        .ok_or_else(|| ApiError::not_found("session", session_id.to_string()))?;

    Ok(Json(session.into()))
}

async fn sync_state(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> Json<SyncResponse> {
    let Some(session_id) = request.session_id.as_deref().and_then(parse_id) else {
        return Json(SyncResponse::NoSession);
    };
    let owner = request
        .owner_id
        .as_deref()
        .and_then(parse_id);

    let Some(mut session) = state.sessions().get(session_id, owner).await else {
        return Json(SyncResponse::NoSession);
    };

    let Some(owner) = owner else {
        return Json(SyncResponse::Error {
            message: "owner_id is required to sync state".to_string(),
        });
    };

    session.apply_update(request.update);

    match state.sessions().save_playback(&session, owner).await {
        Ok(()) => {
            info!(session_id = %session_id, owner_id = %owner, "Player state synced");
            Json(SyncResponse::Synced {
                session_id,
                last_sync: session.last_sync,
            })
        }
        Err(e) => {
            warn!(session_id = %session_id, owner_id = %owner, error = %e, "State sync not saved");
            Json(SyncResponse::Error {
                message: "Failed to save state".to_string(),
            })
        }
    }
}

async fn execute_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Query(query): Query<ActionQuery>,
) -> ApiResult<Json<Value>> {
    let owner = optional_owner(query.owner_id.as_deref())?;

    // Unknown sessions act on an empty player
    let session = match query.session_id.as_deref().and_then(parse_id) {
        Some(id) => state
            .sessions()
            .get(id, owner)
            .await
            .unwrap_or_else(|| SessionState::new(id)),
        None => SessionState::new(Uuid::nil()),
    };

    Ok(Json(direct_action(&session, &action, query.index)))
}

/// Resolve a direct action against the session's playlist
pub fn direct_action(session: &SessionState, action: &str, index: Option<i64>) -> Value {
    match action {
        "play" => {
            let track = index
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| session.playlist.get(i).map(|t| (i, t)));
            match track {
                Some((i, track)) => json!({"action": "play", "index": i, "track": track}),
                None => json!({"error": "Invalid index"}),
            }
        }
        "skip_next" => {
            let next = session.current_position() + 1;
            let index = if (next as usize) < session.playlist.len() {
                next as usize
            } else {
                0
            };
            json!({"action": "play", "index": index})
        }
        "skip_prev" => {
            let index = (session.current_position() - 1).max(0);
            json!({"action": "play", "index": index})
        }
        other => json!({"error": format!("Unknown action: {}", other)}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn session(current: Option<usize>) -> SessionState {
        let mut session = SessionState::new(Uuid::new_v4());
        session.playlist = ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, name)| Track {
                id: (i + 1).to_string(),
                name: name.to_string(),
                artist: "Band".to_string(),
                album: None,
                artwork_url: None,
                duration_seconds: None,
            })
            .collect();
        session.current_track = current.map(|i| session.playlist[i].clone());
        session
    }

    #[rstest]
    #[case("skip_next", Some(0), 1)]
    #[case("skip_next", Some(2), 0)]
    #[case("skip_next", None, 0)]
    #[case("skip_prev", Some(2), 1)]
    #[case("skip_prev", Some(0), 0)]
    #[case("skip_prev", None, 0)]
    fn test_skip_actions(
        #[case] action: &str,
        #[case] current: Option<usize>,
        #[case] expected: usize,
    ) {
        let result = direct_action(&session(current), action, None);
        assert_eq!(result, json!({"action": "play", "index": expected}));
    }

    #[test]
    fn test_play_validates_index() {
        let result = direct_action(&session(None), "play", Some(1));
        assert_eq!(result["index"], 1);
        assert_eq!(result["track"]["name"], "B");

        for bad in [Some(3), Some(-1), None] {
            assert_eq!(
                direct_action(&session(None), "play", bad),
                json!({"error": "Invalid index"})
            );
        }
    }

    #[test]
    fn test_unknown_action() {
        assert_eq!(
            direct_action(&session(None), "pause", None),
            json!({"error": "Unknown action: pause"})
        );
    }

    #[test]
    fn test_sync_request_flattens_update() {
        let request: SyncRequest = serde_json::from_value(json!({
            "session_id": "x",
            "is_playing": true,
            "playback_position": 42.5
        }))
        .unwrap();
        assert_eq!(request.update.is_playing, Some(true));
        assert_eq!(request.update.playback_position, Some(42.5));
        assert!(request.update.playlist.is_none());
    }

    #[test]
    fn test_sync_response_shape() {
        assert_eq!(
            serde_json::to_value(SyncResponse::NoSession).unwrap(),
            json!({"status": "no_session"})
        );
    }
}
