//! Music catalog seam used by the agent tools

use async_trait::async_trait;
use playhead_apple_music_client::{AppleMusicClient, AppleMusicError};
use thiserror::Error;

use crate::models::Track;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("not found in catalog: {0}")]
    NotFound(String),

    #[error("invalid catalog request: {0}")]
    InvalidInput(String),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<AppleMusicError> for CatalogError {
    fn from(err: AppleMusicError) -> Self {
        match err {
            AppleMusicError::NotFound(id) => CatalogError::NotFound(id),
            AppleMusicError::InvalidInput(msg) => CatalogError::InvalidInput(msg),
            other => CatalogError::Unavailable(other.to_string()),
        }
    }
}

/// Song search and lookup
#[async_trait]
pub trait MusicCatalog: Send + Sync {
    async fn search(&self, term: &str, limit: u32) -> Result<Vec<Track>, CatalogError>;

    async fn fetch_by_id(&self, id: &str) -> Result<Track, CatalogError>;
}

#[async_trait]
impl MusicCatalog for AppleMusicClient {
    async fn search(&self, term: &str, limit: u32) -> Result<Vec<Track>, CatalogError> {
        let tracks = AppleMusicClient::search(self, term, limit).await?;
        Ok(tracks.into_iter().map(Track::from).collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Track, CatalogError> {
        Ok(self.song(id).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playhead_shared_config::AppleMusicConfig;
    use playhead_test_utils::{CatalogSongFixture, MockAppleMusicServer};

    #[tokio::test]
    async fn test_apple_music_search_maps_tracks() {
        let server = MockAppleMusicServer::start().await;
        server
            .mock_search(&[CatalogSongFixture::new("1001", "Teardrop", "Massive Attack")])
            .await;

        let client =
            AppleMusicClient::new(&AppleMusicConfig::with_static_token(server.url(), "token")).unwrap();
        let tracks = MusicCatalog::search(&client, "teardrop", 5).await.unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].artist, "Massive Attack");
        assert_eq!(tracks[0].duration_seconds, Some(180.0));
    }

    #[tokio::test]
    async fn test_apple_music_failure_is_unavailable() {
        let server = MockAppleMusicServer::start().await;
        server.mock_failure(500).await;

        let client = AppleMusicClient::new(&AppleMusicConfig::with_static_token(server.url(), "token"))
            .unwrap()
            .with_max_retries(0);
        let err = MusicCatalog::search(&client, "anything", 5).await.unwrap_err();

        assert!(matches!(err, CatalogError::Unavailable(_)));
    }
}
