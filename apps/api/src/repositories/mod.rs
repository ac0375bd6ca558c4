//! Database repository layer for Playhead
//!
//! All SQL lives here. Services depend on the [`ConversationRepository`]
//! trait so the session store can run against any implementation.

pub mod conversation;

pub use conversation::{ConversationRepository, PgConversationRepository};
