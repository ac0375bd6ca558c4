//! Apple Music catalog client for Playhead
//!
//! Provides song search and lookup against the Apple Music catalog API.
//! Developer tokens are either supplied pre-signed or minted as ES256 JWTs
//! from a MusicKit key and cached until shortly before expiry.
//!
//! # Example
//!
//! ```rust,no_run
//! use playhead_apple_music_client::AppleMusicClient;
//! use playhead_shared_config::AppleMusicConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! if let Some(config) = AppleMusicConfig::from_env()? {
//!     let client = AppleMusicClient::new(&config)?;
//!     for track in client.search("Kind of Blue", 5).await? {
//!         println!("{} - {} ({})", track.name, track.artist, track.id);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! - `APPLE_MUSIC_DEVELOPER_TOKEN`, or `APPLE_MUSIC_TEAM_ID` + `APPLE_MUSIC_KEY_ID` +
//!   `APPLE_MUSIC_PRIVATE_KEY` / `APPLE_MUSIC_PRIVATE_KEY_PATH`
//! - `APPLE_MUSIC_STOREFRONT` (default `us`)

mod client;
mod error;
mod models;
mod token;

pub use client::AppleMusicClient;
pub use error::{AppleMusicError, AppleMusicResult};
pub use models::{CatalogTrack, ARTWORK_SIZE};
