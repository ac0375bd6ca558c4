//! Per-conversation session state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::action::Action;
use super::message::ChatMessage;
use super::track::Track;

/// Playlist entries listed in the model's state summary
const SUMMARY_PLAYLIST_LINES: usize = 5;

/// Player state as persisted in the `context` column and echoed in `done`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    #[serde(default)]
    pub current_track: Option<Track>,
    #[serde(default)]
    pub playlist: Vec<Track>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub playback_position: f64,
}

/// Fields a client sync may overwrite; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaybackUpdate {
    pub current_track: Option<Track>,
    pub playlist: Option<Vec<Track>>,
    pub is_playing: Option<bool>,
    pub playback_position: Option<f64>,
}

/// The aggregate shared by the client player and the agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub chat_history: Vec<ChatMessage>,
    pub current_track: Option<Track>,
    pub playlist: Vec<Track>,
    pub is_playing: bool,
    pub playback_position: f64,
    /// Drained when the turn answers the client; never persisted
    #[serde(skip)]
    pub pending_actions: Vec<Action>,
    pub last_sync: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: Uuid) -> Self {
        Self::from_stored(session_id, Vec::new(), PlaybackState::default(), Utc::now())
    }

    /// Rebuild from a stored transcript and context blob
    pub fn from_stored(
        session_id: Uuid,
        chat_history: Vec<ChatMessage>,
        playback: PlaybackState,
        last_sync: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            chat_history,
            current_track: playback.current_track,
            playlist: playback.playlist,
            is_playing: playback.is_playing,
            playback_position: playback.playback_position,
            pending_actions: Vec::new(),
            last_sync,
        }
    }

    pub fn playback(&self) -> PlaybackState {
        PlaybackState {
            current_track: self.current_track.clone(),
            playlist: self.playlist.clone(),
            is_playing: self.is_playing,
            playback_position: self.playback_position,
        }
    }

    /// Overwrite only the fields the client sent
    pub fn apply_update(&mut self, update: PlaybackUpdate) {
        if let Some(track) = update.current_track {
            self.current_track = Some(track);
        }
        if let Some(playlist) = update.playlist {
            self.playlist = playlist;
        }
        if let Some(is_playing) = update.is_playing {
            self.is_playing = is_playing;
        }
        if let Some(position) = update.playback_position {
            self.playback_position = position;
        }
        self.last_sync = Utc::now();
    }

    /// Position of the current track in the playlist, matched by id
    ///
    /// `-1` when nothing is playing or the track is not in the playlist, so
    /// "next" from no track is index 0.
    pub fn current_position(&self) -> isize {
        self.current_track
            .as_ref()
            .and_then(|current| self.playlist.iter().position(|t| t.id == current.id))
            .map_or(-1, |i| i as isize)
    }

    /// The last `n` transcript messages
    pub fn recent_history(&self, n: usize) -> &[ChatMessage] {
        let start = self.chat_history.len().saturating_sub(n);
        &self.chat_history[start..]
    }

    /// Plain-text state summary embedded in the system prompt
    pub fn context_summary(&self) -> String {
        let mut lines = Vec::new();

        match &self.current_track {
            Some(track) => lines.push(format!("Currently playing: {}", track.describe())),
            None => lines.push("Nothing is currently playing.".to_string()),
        }

        if self.playlist.is_empty() {
            lines.push("Playlist is empty.".to_string());
        } else {
            lines.push(format!("Playlist has {} tracks:", self.playlist.len()));
            for (i, track) in self.playlist.iter().take(SUMMARY_PLAYLIST_LINES).enumerate() {
                lines.push(format!("  {}. {} - {}", i + 1, track.name, track.artist));
            }
            if self.playlist.len() > SUMMARY_PLAYLIST_LINES {
                lines.push(format!(
                    "  ... and {} more",
                    self.playlist.len() - SUMMARY_PLAYLIST_LINES
                ));
            }
        }

        lines.join("\n")
    }
}
