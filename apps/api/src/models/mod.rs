//! Domain and database models for Playhead
//!
//! - Tracks and client-directed actions
//! - Chat transcript messages (plain or multi-part)
//! - Session state and conversation records

pub mod action;
pub mod conversation;
pub mod message;
pub mod session;
pub mod track;

pub use action::Action;
pub use conversation::{
    Conversation, ConversationPatch, ConversationSummary, StoredState, DEFAULT_TITLE,
};
pub use message::{ChatMessage, MessageBody, MessageRole, Segment, ToolCallStatus};
pub use session::{PlaybackState, PlaybackUpdate, SessionState};
pub use track::Track;
