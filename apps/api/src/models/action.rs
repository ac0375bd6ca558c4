//! Client-directed playback intentions
//!
//! The backend never drives audio. Tools emit an [`Action`], the client
//! executes it and later syncs the resulting player state back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::track::Track;

/// An intention for the client player, delivered once
///
/// Serializes flat, e.g. `{"type":"play_index","index":1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Play the playlist entry at this 0-based index
    PlayIndex { index: usize },
    /// Let the client search for and queue a track
    SearchAndAdd { query: String },
    /// Queue a track already resolved against the catalog
    AddToQueue { track: Track },
    /// Remove the playlist entry at this 0-based index
    RemoveIndex { index: usize },
}

impl Action {
    /// Wire name of the action type
    pub fn kind(&self) -> &'static str {
        match self {
            Action::PlayIndex { .. } => "play_index",
            Action::SearchAndAdd { .. } => "search_and_add",
            Action::AddToQueue { .. } => "add_to_queue",
            Action::RemoveIndex { .. } => "remove_index",
        }
    }

    /// Parameters without the type tag
    pub fn data(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.remove("type");
                Value::Object(map)
            }
            _ => Value::Object(Default::default()),
        }
    }
}
