//! Business logic services for Playhead
//!
//! - Session store and conversation titles
//! - Agent tools, stream adapter and the chat orchestrator
//! - Catalog and speech collaborators
//! - Health checks

pub mod catalog;
pub mod chat;
pub mod health;
pub mod session_store;
pub mod speech;
pub mod stream_adapter;
pub mod title;
pub mod tools;

pub use catalog::{CatalogError, MusicCatalog};
pub use chat::{ChatError, ChatService};
pub use health::HealthService;
pub use session_store::{SessionError, SessionStore};
pub use speech::SpeechService;
pub use stream_adapter::{StreamAdapter, TurnEvent};
pub use title::TitleGenerator;
