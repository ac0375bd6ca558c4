//! Mock Apple Music catalog server
//!
//! Provides a [`MockAppleMusicServer`] serving catalog search and song
//! lookup so tool tests can resolve tracks without network access.

use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Storefront the mock answers for
pub const MOCK_STOREFRONT: &str = "us";

/// A catalog song fixture
#[derive(Debug, Clone)]
pub struct CatalogSongFixture {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
}

impl CatalogSongFixture {
    pub fn new(id: &str, name: &str, artist: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            artist: artist.to_string(),
            album: format!("{} (Single)", name),
            duration_ms: 180_000,
        }
    }

    /// Convert to the catalog resource JSON
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "type": "songs",
            "href": format!("/v1/catalog/{}/songs/{}", MOCK_STOREFRONT, self.id),
            "attributes": {
                "name": self.name,
                "artistName": self.artist,
                "albumName": self.album,
                "durationInMillis": self.duration_ms,
                "artwork": {
                    "url": format!("https://is1-ssl.mzstatic.com/image/{}/{{w}}x{{h}}bb.jpg", self.id),
                    "width": 3000,
                    "height": 3000
                }
            }
        })
    }
}

/// Mock Apple Music catalog server
pub struct MockAppleMusicServer {
    server: MockServer,
}

impl MockAppleMusicServer {
    /// Start a new mock catalog server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL (use as `APPLE_MUSIC_BASE_URL`)
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Answer every search with these songs
    pub async fn mock_search(&self, songs: &[CatalogSongFixture]) {
        let data: Vec<Value> = songs.iter().map(CatalogSongFixture::to_json).collect();

        Mock::given(method("GET"))
            .and(path(format!("/v1/catalog/{}/search", MOCK_STOREFRONT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"songs": {"href": "/v1/catalog/us/search", "data": data}}
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer lookups of this song's id
    pub async fn mock_song(&self, song: &CatalogSongFixture) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/catalog/{}/songs/{}", MOCK_STOREFRONT, song.id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [song.to_json()]
            })))
            .mount(&self.server)
            .await;
    }

    /// Fail every catalog request with this status
    pub async fn mock_failure(&self, status_code: u16) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/v1/catalog/.*"))
            .respond_with(ResponseTemplate::new(status_code).set_body_json(json!({
                "errors": [{"status": status_code.to_string(), "title": "Mock Failure", "detail": "catalog unavailable"}]
            })))
            .mount(&self.server)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_search() {
        let server = MockAppleMusicServer::start().await;
        server
            .mock_search(&[CatalogSongFixture::new("1", "So What", "Miles Davis")])
            .await;

        let body: Value = reqwest::get(format!("{}/v1/catalog/us/search?term=x", server.url()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let songs = body["results"]["songs"]["data"].as_array().unwrap();
        assert_eq!(songs[0]["attributes"]["artistName"], "Miles Davis");
    }

    #[test]
    fn test_fixture_artwork_keeps_template() {
        let json = CatalogSongFixture::new("42", "A", "B").to_json();
        let url = json["attributes"]["artwork"]["url"].as_str().unwrap();
        assert!(url.ends_with("/42/{w}x{h}bb.jpg"));
    }
}
