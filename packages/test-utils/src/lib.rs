//! Shared test utilities for the Playhead workspace
//!
//! This crate provides mock implementations of external services for testing
//! without network dependencies.
//!
//! # Mock Services
//!
//! - [`MockLlmServer`] - Mock model server (OpenAI-compatible SSE and Ollama NDJSON)
//! - [`MockAppleMusicServer`] - Mock Apple Music catalog
//! - [`MockSpeechServer`] - Mock Minimax text-to-speech
//!
//! # Example
//!
//! ```rust,ignore
//! use playhead_test_utils::{openai, MockLlmServer};
//!
//! #[tokio::test]
//! async fn test_with_mocks() {
//!     let llm = MockLlmServer::start().await;
//!     llm.mock_stream_text("Hello!").await;
//!
//!     // Use llm.url() as the model base URL
//! }
//! ```

mod apple_music;
mod llm;
mod speech;

pub use apple_music::{CatalogSongFixture, MockAppleMusicServer, MOCK_STOREFRONT};
pub use llm::{ollama, openai, MockLlmServer};
pub use speech::MockSpeechServer;
