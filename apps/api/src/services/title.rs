//! Conversation title generation

use std::time::Duration;

use playhead_llm_client::{ChatMessage as LlmMessage, GenerateOptions, LlmClient, LlmError};
use thiserror::Error;
use tracing::debug;

use crate::models::ChatMessage;

/// Messages from the start of the conversation shown to the model
const TITLE_CONTEXT_MESSAGES: usize = 5;

/// Longest title kept as-is, in characters
const MAX_TITLE_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum TitleError {
    #[error("title generation timed out after {0}s")]
    Timeout(u64),

    #[error("title model failed: {0}")]
    Llm(#[from] LlmError),

    #[error("title model returned an empty title")]
    Empty,

    #[error("title generation is not configured")]
    Disabled,
}

/// Summarizes the opening of a conversation into a short title
#[derive(Debug, Clone)]
pub struct TitleGenerator {
    llm: LlmClient,
    model: String,
    timeout: Duration,
}

impl TitleGenerator {
    /// Uses the configured title model
    pub fn new(llm: LlmClient, timeout: Duration) -> Self {
        let model = llm.config().title_model.clone();
        Self {
            llm,
            model,
            timeout,
        }
    }

    pub async fn generate(&self, history: &[ChatMessage]) -> Result<String, TitleError> {
        let prompt = build_prompt(history);
        let options = GenerateOptions {
            temperature: Some(0.7),
            max_tokens: Some(20),
            top_p: None,
        };

        let raw = tokio::time::timeout(
            self.timeout,
            self.llm
                .complete_with_model(&self.model, vec![LlmMessage::user(prompt)], Some(options)),
        )
        .await
        .map_err(|_| TitleError::Timeout(self.timeout.as_secs()))??;

        debug!(raw_len = raw.len(), "Title model answered");
        clean_title(&raw).ok_or(TitleError::Empty)
    }
}

fn build_prompt(history: &[ChatMessage]) -> String {
    let conversation = history
        .iter()
        .take(TITLE_CONTEXT_MESSAGES)
        .map(|message| format!("{}: {}", message.role.as_str(), message.text()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Based on this music conversation, generate a short, descriptive title (max 5 words).
The title should capture the main topic or vibe.

Examples:
- "Chill Jazz Playlist"
- "90s Rock Recommendations"
- "Study Focus Music"
- "Workout Energy Mix"

Conversation:
{}

Title (5 words max):"#,
        conversation
    )
}

/// Strip quotes and whitespace, then cap the length
pub fn clean_title(raw: &str) -> Option<String> {
    let title = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();

    if title.is_empty() {
        return None;
    }

    if title.chars().count() > MAX_TITLE_CHARS {
        let head: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
        return Some(format!("{}...", head));
    }

    Some(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("\"Chill Jazz Playlist\"", Some("Chill Jazz Playlist"))]
    #[case("  'Study Focus Music'\n", Some("Study Focus Music"))]
    #[case("Workout Energy Mix", Some("Workout Energy Mix"))]
    #[case("\"\"", None)]
    #[case("   ", None)]
    fn test_clean_title(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(clean_title(raw).as_deref(), expected);
    }

    #[test]
    fn test_long_title_is_capped() {
        let title = clean_title(&"x".repeat(80)).unwrap();
        assert_eq!(title.chars().count(), 50);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_prompt_uses_first_five_messages() {
        let history: Vec<_> = (0..8).map(|i| ChatMessage::user(format!("msg {}", i))).collect();
        let prompt = build_prompt(&history);
        assert!(prompt.contains("user: msg 4"));
        assert!(!prompt.contains("msg 5"));
        assert!(prompt.ends_with("Title (5 words max):"));
    }
}
