//! Streaming chat client for the Playhead agent
//!
//! Talks to either an OpenAI-compatible Chat Completions endpoint (SSE) or
//! an Ollama `/api/chat` endpoint (NDJSON) and exposes both as one stream of
//! provider-neutral [`StreamDelta`]s: text, reasoning text, tool-call
//! fragments and a terminal delta.
//!
//! # Thread Safety
//!
//! `LlmClient` is `Clone + Send + Sync` and can be safely shared
//! across tasks. It uses a shared HTTP client connection pool.
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use playhead_llm_client::{ChatMessage, LlmClient};
//! use playhead_shared_config::LlmConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = LlmClient::new(&LlmConfig::from_env()?)?;
//!
//! let messages = vec![
//!     ChatMessage::system("You are a music assistant."),
//!     ChatMessage::user("What's playing?"),
//! ];
//! let mut stream = client.chat_stream(&messages, &[], None).await?;
//! while let Some(delta) = stream.next().await {
//!     if let Some(text) = delta?.content {
//!         print!("{}", text);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;

use futures_util::Stream;

mod client;
mod error;
mod models;
mod ollama;
mod openai;

pub use client::LlmClient;
pub use error::{LlmError, LlmResult};
pub use models::{
    ChatMessage, ChatRole, GenerateOptions, StreamDelta, ToolCall, ToolCallDelta, ToolDefinition,
};

/// Stream of completion deltas; always ends with a delta where `done` is set
/// unless an error is yielded first
pub type DeltaStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;
