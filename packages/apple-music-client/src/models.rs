//! Apple Music catalog response models

use serde::{Deserialize, Serialize};

/// Edge length requested when resolving artwork URL templates
pub const ARTWORK_SIZE: u32 = 300;

/// A song from the Apple Music catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTrack {
    /// Catalog id
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: Option<String>,
    /// Artwork URL with the size template resolved
    pub artwork_url: Option<String>,
    /// Whole seconds
    pub duration_seconds: Option<u32>,
}

// Internal response types for deserialization

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: SearchResults,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchResults {
    #[serde(default)]
    pub songs: Option<ResourcePage>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResourcePage {
    #[serde(default)]
    pub data: Vec<RawSong>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSong {
    pub id: String,
    #[serde(default)]
    pub attributes: Option<SongAttributes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SongAttributes {
    pub name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub duration_in_millis: Option<u64>,
    #[serde(default)]
    pub artwork: Option<Artwork>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Artwork {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ApiErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorResponse {
    /// First error's detail (or title), if any
    pub fn message(&self) -> Option<String> {
        self.errors
            .first()
            .map(|e| e.detail.clone().unwrap_or_else(|| e.title.clone()))
    }
}

/// Replace the `{w}x{h}` template Apple puts in artwork URLs
pub(crate) fn resolve_artwork_url(template: &str) -> String {
    let size = ARTWORK_SIZE.to_string();
    template.replace("{w}", &size).replace("{h}", &size)
}

impl RawSong {
    /// Convert to a track; songs without attributes are unusable and dropped
    pub fn into_track(self) -> Option<CatalogTrack> {
        let attributes = self.attributes?;
        Some(CatalogTrack {
            id: self.id,
            name: attributes.name,
            artist: attributes.artist_name,
            album: attributes.album_name.filter(|a| !a.is_empty()),
            artwork_url: attributes.artwork.map(|a| resolve_artwork_url(&a.url)),
            duration_seconds: attributes
                .duration_in_millis
                .map(|ms| u32::try_from(ms / 1000).unwrap_or(u32::MAX)),
        })
    }
}
