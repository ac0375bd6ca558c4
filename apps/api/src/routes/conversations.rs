//! Conversation lifecycle routes
//!
//! - `POST /conversations` - Get-or-create a conversation with its state
//! - `GET /conversations` - Owner's conversations, pinned first
//! - `PATCH /conversations/{id}` - Rename, pin or archive
//! - `DELETE /conversations/{id}` - Delete with its state

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{require_owner, AppState};
use crate::error::{ApiError, ApiResult};
use crate::models::{Conversation, ConversationPatch, PlaybackState};

/// Most conversations returned by one listing
const LIST_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationWithState {
    pub conversation: Conversation,
    pub state: PlaybackState,
    pub message_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Serialize)]
pub struct ConversationList {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
pub struct PatchRequest {
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(flatten)]
    pub patch: ConversationPatch,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    #[serde(default)]
    pub owner_id: Option<String>,
}

pub fn conversations_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_conversations).post(create_conversation))
        .route("/:id", patch(update_conversation).delete(delete_conversation))
        .with_state(state)
}

async fn create_conversation(
    State(state): State<AppState>,
    Json(request): Json<CreateConversationRequest>,
) -> ApiResult<Json<ConversationWithState>> {
    let owner = require_owner(request.owner_id.as_deref())?;
    let id = match request.session_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Uuid::parse_str(raw)
            .map_err(|_| ApiError::InvalidBody("session_id must be a UUID".to_string()))?,
        _ => Uuid::new_v4(),
    };

    let session = state.sessions().get_or_create(id, owner).await?;

    let conversation = state
        .sessions()
        .repository()
        .find(id, owner)
        .await?
        .ok_or_else(|| ApiError::not_found("conversation", id.to_string()))?;

    info!(conversation_id = %id, owner_id = %owner, "Conversation opened");

    Ok(Json(ConversationWithState {
        conversation,
        message_count: session.chat_history.len(),
        state: session.playback(),
    }))
}

async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ConversationList>> {
    let owner = require_owner(query.owner_id.as_deref())?;

    let conversations = state
        .sessions()
        .repository()
        .list(owner, query.include_archived, LIST_LIMIT)
        .await?;

    Ok(Json(ConversationList { conversations }))
}

async fn update_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PatchRequest>,
) -> ApiResult<Json<Conversation>> {
    let owner = require_owner(request.owner_id.as_deref())?;
    let id = parse_path_id(&id)?;

    if request.patch.is_empty() {
        return Err(ApiError::ValidationError(
            "Provide at least one of title, is_pinned, is_archived".to_string(),
        ));
    }

    state
        .sessions()
        .repository()
        .update_metadata(id, owner, &request.patch)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("conversation", id.to_string()))
}

async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<StatusCode> {
    let owner = require_owner(query.owner_id.as_deref())?;
    let id = parse_path_id(&id)?;

    if state.sessions().repository().delete(id, owner).await? {
        info!(conversation_id = %id, owner_id = %owner, "Conversation deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("conversation", id.to_string()))
    }
}

/// A malformed id can never name a stored conversation
fn parse_path_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::not_found("conversation", raw))
}
