//! Chat transcript messages
//!
//! A message body is either plain `content` (older transcripts) or an ordered
//! list of `parts`. Both shapes are read and written; exactly one is set.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    #[serde(alias = "assistant")]
    Agent,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Agent => "agent",
        }
    }
}

/// Outcome of a recorded tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Success,
    Error,
}

/// One typed chunk of a multi-part agent message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Text {
        content: String,
    },
    Thinking {
        content: String,
    },
    ToolCall {
        id: String,
        tool_name: String,
        #[serde(default)]
        args: Value,
        status: ToolCallStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
}

/// Message payload in either of its stored shapes
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Content(String),
    Parts(Vec<Segment>),
}

impl MessageBody {
    /// Visible text of the message; thinking and tool calls are left out
    pub fn preview_text(&self) -> String {
        match self {
            MessageBody::Content(text) => text.clone(),
            MessageBody::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    Segment::Text { content } => Some(content.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// A transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawMessage", into = "RawMessage")]
pub struct ChatMessage {
    pub role: MessageRole,
    pub body: MessageBody,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            body: MessageBody::Content(text.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn agent(body: MessageBody) -> Self {
        Self {
            role: MessageRole::Agent,
            body,
            timestamp: Utc::now(),
        }
    }

    pub fn text(&self) -> String {
        self.body.preview_text()
    }
}

/// Wire shape of a message
#[derive(Serialize, Deserialize)]
struct RawMessage {
    role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parts: Option<Vec<Segment>>,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    timestamp: DateTime<Utc>,
}

impl From<RawMessage> for ChatMessage {
    fn from(raw: RawMessage) -> Self {
        let body = match raw.parts {
            Some(parts) if !parts.is_empty() => MessageBody::Parts(parts),
            _ => MessageBody::Content(raw.content.unwrap_or_default()),
        };
        Self {
            role: raw.role,
            body,
            timestamp: raw.timestamp,
        }
    }
}

impl From<ChatMessage> for RawMessage {
    fn from(message: ChatMessage) -> Self {
        let (content, parts) = match message.body {
            MessageBody::Content(text) => (Some(text), None),
            MessageBody::Parts(parts) => (None, Some(parts)),
        };
        Self {
            role: message.role,
            content,
            parts,
            timestamp: message.timestamp,
        }
    }
}

/// RFC 3339, or a naive timestamp taken as UTC
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}
