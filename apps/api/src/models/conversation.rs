//! Conversation records and their derived metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::message::ChatMessage;
use super::session::PlaybackState;

/// Characters of the last message kept as the list preview
const PREVIEW_CHARS: usize = 100;

/// Title written when generation fails on the first exchange
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Conversation database model
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: i32,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_pinned: bool,
    pub is_archived: bool,
}

/// Owner-editable conversation fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationPatch {
    pub title: Option<String>,
    pub is_pinned: Option<bool>,
    pub is_archived: Option<bool>,
}

impl ConversationPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.is_pinned.is_none() && self.is_archived.is_none()
    }
}

/// Session content as stored for one conversation
#[derive(Debug, Clone, PartialEq)]
pub struct StoredState {
    pub messages: Vec<ChatMessage>,
    pub context: PlaybackState,
    pub last_synced_at: DateTime<Utc>,
}

/// Metadata recomputed from the transcript on every persist
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub message_count: i32,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl ConversationSummary {
    pub fn from_history(history: &[ChatMessage]) -> Self {
        let last = history.last();
        Self {
            message_count: i32::try_from(history.len()).unwrap_or(i32::MAX),
            last_message_preview: last.map(|message| {
                let text = message.text();
                if text.is_empty() {
                    "...".to_string()
                } else {
                    text.chars().take(PREVIEW_CHARS).collect()
                }
            }),
            last_message_at: last.map(|message| message.timestamp),
        }
    }
}
