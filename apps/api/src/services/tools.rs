//! Agent tool surface
//!
//! Tools read the session they are handed and answer with observation text
//! for the model. Playback changes are never applied here: a tool emits an
//! [`Action`] for the client player, which syncs the result back later.
//!
//! Bad arguments, empty playlists and catalog failures all come back as
//! plain text. The caller is a model that should read them as observations.

use std::sync::Arc;

use playhead_llm_client::ToolDefinition;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Action, SessionState, Track};
use crate::services::catalog::{CatalogError, MusicCatalog};

/// Catalog matches returned by `search_music`
pub const SEARCH_RESULT_LIMIT: u32 = 5;

/// Playlist lines returned by `get_playlist`
const PLAYLIST_LISTING_LIMIT: usize = 10;

const INVALID_NUMBER: &str = "Please provide a valid track number.";
const NOTHING_PLAYING: &str = "No track is currently playing";
const EMPTY_PLAYLIST: &str = "The playlist is empty";

/// Everything a tool call may look at during one turn
pub struct ToolContext<'a> {
    pub session: &'a SessionState,
    pub owner_id: Uuid,
    pub catalog: Option<Arc<dyn MusicCatalog>>,
}

/// Observation text plus the intention to forward, if any
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub text: String,
    pub action: Option<Action>,
}

impl ToolOutcome {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: None,
        }
    }

    fn with_action(text: impl Into<String>, action: Action) -> Self {
        Self {
            text: text.into(),
            action: Some(action),
        }
    }
}

/// Tool names, in the order they are offered to the model
pub const TOOL_NAMES: [&str; 7] = [
    "search_music",
    "get_now_playing",
    "get_playlist",
    "play_track",
    "skip_next",
    "add_to_playlist",
    "remove_from_playlist",
];

pub fn is_known_tool(name: &str) -> bool {
    TOOL_NAMES.contains(&name)
}

fn index_parameter(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "index": {"type": "string", "description": description}
        },
        "required": ["index"]
    })
}

/// Definitions offered to the model
pub fn definitions() -> Vec<ToolDefinition> {
    let no_parameters = json!({"type": "object", "properties": {}});

    vec![
        ToolDefinition {
            name: "search_music".to_string(),
            description: "Search for music tracks. Input: search query.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query"}
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "get_now_playing".to_string(),
            description: "Get info about the currently playing track.".to_string(),
            parameters: no_parameters.clone(),
        },
        ToolDefinition {
            name: "get_playlist".to_string(),
            description: "Get the current playlist/queue.".to_string(),
            parameters: no_parameters.clone(),
        },
        ToolDefinition {
            name: "play_track".to_string(),
            description: "Play a track by its position number (1-indexed).".to_string(),
            parameters: index_parameter("Position in the playlist, starting at 1"),
        },
        ToolDefinition {
            name: "skip_next".to_string(),
            description: "Skip to the next track.".to_string(),
            parameters: no_parameters,
        },
        ToolDefinition {
            name: "add_to_playlist".to_string(),
            description: "Add a track to playlist. Input: 'track name - artist' or a catalog id."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "track_info": {
                        "type": "string",
                        "description": "'track name - artist', or a catalog id from search_music"
                    }
                },
                "required": ["track_info"]
            }),
        },
        ToolDefinition {
            name: "remove_from_playlist".to_string(),
            description: "Remove track by position number (1-indexed).".to_string(),
            parameters: index_parameter("Position in the playlist, starting at 1"),
        },
    ]
}

/// Run one tool call
pub async fn execute(ctx: &ToolContext<'_>, name: &str, args: &Value) -> ToolOutcome {
    debug!(tool = %name, owner_id = %ctx.owner_id, args = %args, "Executing tool");

    match name {
        "search_music" => search_music(ctx, string_arg(args, "query")).await,
        "get_now_playing" => get_now_playing(ctx.session),
        "get_playlist" => get_playlist(ctx.session),
        "play_track" => play_track(ctx.session, args.get("index")),
        "skip_next" => skip_next(ctx.session),
        "add_to_playlist" => add_to_playlist(ctx, string_arg(args, "track_info")).await,
        "remove_from_playlist" => remove_from_playlist(ctx.session, args.get("index")),
        other => ToolOutcome::text(format!("Error: unknown tool '{}'", other)),
    }
}

fn string_arg<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or("").trim()
}

/// 1-indexed position from a string or a number
fn parse_position(raw: Option<&Value>) -> Option<i64> {
    match raw? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Validate a 1-indexed position and return the 0-based index
fn playlist_index(session: &SessionState, raw: Option<&Value>) -> Result<usize, String> {
    let position = parse_position(raw).ok_or_else(|| INVALID_NUMBER.to_string())?;

    if session.playlist.is_empty() {
        return Err(EMPTY_PLAYLIST.to_string());
    }

    let len = session.playlist.len();
    if position < 1 || position > len as i64 {
        return Err(format!(
            "Invalid track number. Please choose between 1 and {}.",
            len
        ));
    }

    Ok((position - 1) as usize)
}

async fn search_music(ctx: &ToolContext<'_>, query: &str) -> ToolOutcome {
    if query.is_empty() {
        return ToolOutcome::text("Please tell me what to search for.");
    }

    let Some(catalog) = &ctx.catalog else {
        return ToolOutcome::text(format!(
            "To search for '{}', I'll ask the user's device to search Apple Music. \
             The results will appear in the UI.",
            query
        ));
    };

    match catalog.search(query, SEARCH_RESULT_LIMIT).await {
        Ok(tracks) if tracks.is_empty() => {
            ToolOutcome::text(format!("No tracks found for '{}'.", query))
        }
        Ok(tracks) => ToolOutcome::text(
            tracks
                .iter()
                .take(SEARCH_RESULT_LIMIT as usize)
                .enumerate()
                .map(|(i, t)| format!("{}. {} - {} (id: {})", i + 1, t.name, t.artist, t.id))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Err(e) => ToolOutcome::text(format!("Error searching catalog: {}", e)),
    }
}

fn get_now_playing(session: &SessionState) -> ToolOutcome {
    let Some(track) = &session.current_track else {
        return ToolOutcome::text(NOTHING_PLAYING);
    };

    let album = track
        .album
        .as_deref()
        .map(|a| format!(" from {}", a))
        .unwrap_or_default();
    let status = if session.is_playing { "playing" } else { "paused" };

    ToolOutcome::text(format!(
        "Now playing: {}{} ({})",
        track.describe(),
        album,
        status
    ))
}

fn get_playlist(session: &SessionState) -> ToolOutcome {
    if session.playlist.is_empty() {
        return ToolOutcome::text(EMPTY_PLAYLIST);
    }

    let current = session.current_position();
    let mut lines: Vec<String> = session
        .playlist
        .iter()
        .take(PLAYLIST_LISTING_LIMIT)
        .enumerate()
        .map(|(i, t)| {
            let marker = if i as isize == current { " ▶ now playing" } else { "" };
            format!("{}. {} - {}{}", i + 1, t.name, t.artist, marker)
        })
        .collect();

    if session.playlist.len() > PLAYLIST_LISTING_LIMIT {
        lines.push(format!(
            "...and {} more",
            session.playlist.len() - PLAYLIST_LISTING_LIMIT
        ));
    }

    ToolOutcome::text(lines.join("\n"))
}

fn play_track(session: &SessionState, raw: Option<&Value>) -> ToolOutcome {
    match playlist_index(session, raw) {
        Ok(index) => ToolOutcome::with_action(
            format!("Playing {}", session.playlist[index].describe()),
            Action::PlayIndex { index },
        ),
        Err(message) => {
            debug!(reason = %message, "play_track rejected");
            ToolOutcome::text(message)
        }
    }
}

fn skip_next(session: &SessionState) -> ToolOutcome {
    if session.playlist.is_empty() {
        return ToolOutcome::text(EMPTY_PLAYLIST);
    }

    let next = session.current_position() + 1;
    let Some(track) = session.playlist.get(next as usize) else {
        return ToolOutcome::text("Already at last track");
    };

    ToolOutcome::with_action(
        format!("Skipping to {}", track.describe()),
        Action::PlayIndex {
            index: next as usize,
        },
    )
}

/// Catalog ids are numeric, or `i.` prefixed for library items
fn looks_like_catalog_id(input: &str) -> bool {
    let body = input.strip_prefix("i.").unwrap_or(input);
    !body.is_empty()
        && body.chars().all(|c| c.is_ascii_alphanumeric())
        && body.chars().any(|c| c.is_ascii_digit())
}

async fn add_to_playlist(ctx: &ToolContext<'_>, track_info: &str) -> ToolOutcome {
    if track_info.is_empty() {
        return ToolOutcome::text("Please tell me which track to add.");
    }

    if let Some(catalog) = &ctx.catalog {
        if looks_like_catalog_id(track_info) {
            match catalog.fetch_by_id(track_info).await {
                Ok(track) => return queue_resolved(track),
                // Not an id after all; let the client search for it
                Err(CatalogError::NotFound(_)) => {}
                Err(e) => return ToolOutcome::text(format!("Error adding track: {}", e)),
            }
        }
    }

    ToolOutcome::with_action(
        format!("I'll add '{}' to your playlist.", track_info),
        Action::SearchAndAdd {
            query: track_info.to_string(),
        },
    )
}

fn queue_resolved(track: Track) -> ToolOutcome {
    ToolOutcome::with_action(
        format!("Added {} to your playlist.", track.describe()),
        Action::AddToQueue { track },
    )
}

fn remove_from_playlist(session: &SessionState, raw: Option<&Value>) -> ToolOutcome {
    match playlist_index(session, raw) {
        Ok(index) => ToolOutcome::with_action(
            format!(
                "Removing {} from the playlist",
                session.playlist[index].describe()
            ),
            Action::RemoveIndex { index },
        ),
        Err(message) => {
            debug!(reason = %message, "remove_from_playlist rejected");
            ToolOutcome::text(message)
        }
    }
}
