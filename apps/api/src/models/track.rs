//! Track value objects shared by the session, the tools and the catalog

use playhead_apple_music_client::CatalogTrack;
use serde::{Deserialize, Serialize};

/// A playable track
///
/// Tracks are replaced wholesale, never edited in place; identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    /// Length in seconds; players may report fractional values
    #[serde(default, alias = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl Track {
    /// "{name} by {artist}"
    pub fn describe(&self) -> String {
        format!("{} by {}", self.name, self.artist)
    }
}

impl From<CatalogTrack> for Track {
    fn from(track: CatalogTrack) -> Self {
        Self {
            id: track.id,
            name: track.name,
            artist: track.artist,
            album: track.album,
            artwork_url: track.artwork_url,
            duration_seconds: track.duration_seconds.map(f64::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_duration_field_is_accepted() {
        let track: Track = serde_json::from_value(json!({
            "id": "1", "name": "So What", "artist": "Miles Davis", "duration": 562.5
        }))
        .unwrap();
        assert_eq!(track.duration_seconds, Some(562.5));
        assert!(track.album.is_none());
    }

    #[test]
    fn test_catalog_conversion() {
        let track = Track::from(CatalogTrack {
            id: "42".to_string(),
            name: "Naima".to_string(),
            artist: "John Coltrane".to_string(),
            album: Some("Giant Steps".to_string()),
            artwork_url: None,
            duration_seconds: Some(261),
        });
        assert_eq!(track.duration_seconds, Some(261.0));
        assert_eq!(track.describe(), "Naima by John Coltrane");
    }
}
