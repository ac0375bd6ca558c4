//! Test fixtures for API integration tests
//!
//! Provides reusable tracks and player states.

#![allow(dead_code)]

use playhead_api::models::{PlaybackState, Track};

/// A track with only the required fields set
pub fn track(id: &str, name: &str, artist: &str) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        artist: artist.to_string(),
        album: None,
        artwork_url: None,
        duration_seconds: None,
    }
}

/// Three-song playlist, nothing playing
pub fn three_song_playlist() -> PlaybackState {
    PlaybackState {
        current_track: None,
        playlist: vec![
            track("1", "Song A", "Artist A"),
            track("2", "Song B", "Artist B"),
            track("3", "Song C", "Artist C"),
        ],
        is_playing: false,
        playback_position: 0.0,
    }
}

/// Three-song playlist with the given 0-based entry playing
pub fn playing(index: usize) -> PlaybackState {
    let mut state = three_song_playlist();
    state.current_track = Some(state.playlist[index].clone());
    state.is_playing = true;
    state
}
