//! Agent orchestrator
//!
//! One chat turn runs as a spawned task feeding an mpsc channel:
//! load the session, build the prompt, stream model rounds through the
//! [`StreamAdapter`], run tool calls inline, then persist and answer with a
//! single `done` event.
//!
//! Failures inside the turn never end the stream early. Model errors become
//! one apology text, client disconnects stop the model at the next await, and
//! in every case the partial transcript is persisted before the task exits.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use playhead_llm_client::{ChatMessage as LlmMessage, LlmClient, LlmError, ToolCall};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{ChatMessage, MessageRole, SessionState};
use crate::services::catalog::MusicCatalog;
use crate::services::session_store::{SessionError, SessionStore};
use crate::services::speech::SpeechService;
use crate::services::stream_adapter::{normalize, Fragment, StreamAdapter, TurnEvent};
use crate::services::tools::{self, ToolContext};

/// Chat service errors
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("model request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("turn timed out after {0}s")]
    Timeout(u64),

    #[error("client disconnected")]
    Disconnected,
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::InvalidInput(msg) => ApiError::ValidationError(msg),
            ChatError::Session(SessionError::NotFound(id)) => ApiError::NotFound {
                resource_type: "conversation",
                id: id.to_string(),
            },
            ChatError::Session(SessionError::Database(e)) => ApiError::Database(e),
            ChatError::Llm(e) => ApiError::AiService(e.to_string()),
            ChatError::Timeout(secs) => {
                ApiError::AiService(format!("Turn timed out after {}s", secs))
            }
            ChatError::Disconnected => ApiError::Internal("Client disconnected".to_string()),
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Maximum user message length in characters
const MAX_MESSAGE_LENGTH: usize = 10_000;

/// Model rounds per turn; each tool round costs one
pub const MAX_TOOL_ROUNDS: usize = 5;

/// Turn budget as a multiple of the model request timeout
const TOTAL_TIMEOUT_MULTIPLIER: u64 = 2;

/// Channel capacity for turn events
const STREAM_CHANNEL_CAPACITY: usize = 100;

/// Upper bound on the transcript window sent to the model
pub const MAX_HISTORY_WINDOW: usize = 10;

pub const APOLOGY_TEXT: &str = "Sorry, I had a little hiccup. Try again? 🎧";
pub const EMPTY_REPLY_TEXT: &str = "I'm here to help with your music! What would you like to do?";

/// How a turn's model phase ended
enum TurnEnd {
    Completed,
    Failed(ChatError),
    Disconnected,
}

/// Runs chat turns against the model, the tools and the session store
#[derive(Clone)]
pub struct ChatService {
    llm: LlmClient,
    sessions: SessionStore,
    catalog: Option<Arc<dyn MusicCatalog>>,
    speech: Option<SpeechService>,
    history_window: usize,
}

impl ChatService {
    pub fn new(llm: LlmClient, sessions: SessionStore) -> Self {
        Self {
            llm,
            sessions,
            catalog: None,
            speech: None,
            history_window: MAX_HISTORY_WINDOW,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn MusicCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_speech(mut self, speech: SpeechService) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Number of past messages sent to the model, capped at 10
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window.min(MAX_HISTORY_WINDOW);
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Load the session and start the turn in the background
    ///
    /// Errors here happen before any event is produced and map to an HTTP
    /// error; once the receiver is returned the turn always ends with `done`.
    #[instrument(skip(self, message), fields(message_len = message.len()))]
    pub async fn start_turn(
        &self,
        session_id: Uuid,
        owner_id: Uuid,
        message: String,
        speak: bool,
    ) -> ChatResult<mpsc::Receiver<TurnEvent>> {
        let message = message.trim().to_string();
        if message.is_empty() {
            return Err(ChatError::InvalidInput("Message cannot be empty".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::InvalidInput(format!(
                "Message too long (max {} characters)",
                MAX_MESSAGE_LENGTH
            )));
        }

        let session = self.sessions.get_or_create(session_id, owner_id).await?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let service = self.clone();

        tokio::spawn(async move {
            service.run_turn(session, owner_id, message, speak, tx).await;
        });

        Ok(rx)
    }

    async fn run_turn(
        &self,
        mut session: SessionState,
        owner_id: Uuid,
        message: String,
        speak: bool,
        tx: mpsc::Sender<TurnEvent>,
    ) {
        let session_id = session.session_id;
        let mut adapter = StreamAdapter::new();
        let budget_secs = self
            .llm
            .config()
            .timeout_secs
            .saturating_mul(TOTAL_TIMEOUT_MULTIPLIER);

        let end = tokio::select! {
            result = tokio::time::timeout(
                Duration::from_secs(budget_secs),
                self.drive(&mut session, owner_id, &message, &mut adapter, &tx),
            ) => match result {
                Ok(Ok(())) => TurnEnd::Completed,
                Ok(Err(ChatError::Disconnected)) => TurnEnd::Disconnected,
                Ok(Err(e)) => TurnEnd::Failed(e),
                Err(_) => TurnEnd::Failed(ChatError::Timeout(budget_secs)),
            },
            _ = tx.closed() => TurnEnd::Disconnected,
        };

        let disconnected = match end {
            TurnEnd::Completed => false,
            TurnEnd::Disconnected => {
                info!(session_id = %session_id, "Client disconnected mid-turn");
                true
            }
            TurnEnd::Failed(e) => {
                warn!(session_id = %session_id, error = %e, "Turn failed, answering with apology");
                let events = adapter.push(Fragment::Text(APOLOGY_TEXT.to_string()));
                forward(&tx, events).await.is_err()
            }
        };

        if !disconnected && !adapter.has_text() && !adapter.has_tool_calls() {
            let events = adapter.push(Fragment::Text(EMPTY_REPLY_TEXT.to_string()));
            let _ = forward(&tx, events).await;
        }

        let reply = self.finalize(&mut session, owner_id, message, adapter).await;

        if disconnected || tx.is_closed() {
            return;
        }

        let audio = match (&self.speech, speak) {
            (Some(speech), true) => speech.synthesize(&reply).await,
            _ => None,
        };

        let done = TurnEvent::Done {
            session_id,
            actions: std::mem::take(&mut session.pending_actions),
            state: session.playback(),
            audio,
        };
        if tx.send(done).await.is_err() {
            debug!(session_id = %session_id, "Receiver dropped before done");
        }
    }

    /// Model rounds with inline tool execution
    async fn drive(
        &self,
        session: &mut SessionState,
        owner_id: Uuid,
        message: &str,
        adapter: &mut StreamAdapter,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> ChatResult<()> {
        let mut context = self.build_context(session, message);
        let definitions = tools::definitions();

        for round in 1..=MAX_TOOL_ROUNDS {
            let mut stream = self.llm.chat_stream(&context, &definitions, None).await?;
            let mut round_text = String::new();

            while let Some(delta) = stream.next().await {
                let delta = delta?;
                let finished = delta.done;

                for fragment in normalize(delta) {
                    if let Fragment::Text(text) = &fragment {
                        round_text.push_str(text);
                    }
                    forward(tx, adapter.push(fragment)).await?;
                }

                if finished {
                    break;
                }
            }

            let (owed, calls) = adapter.finish_round();
            forward(tx, owed).await?;

            if calls.is_empty() {
                debug!(round, "Model finished without tool calls");
                return Ok(());
            }

            context.push(LlmMessage::assistant_with_tools(
                round_text,
                calls
                    .iter()
                    .map(|call| ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.args.clone(),
                    })
                    .collect(),
            ));

            for call in calls {
                let outcome = {
                    let ctx = ToolContext {
                        session: &*session,
                        owner_id,
                        catalog: self.catalog.clone(),
                    };
                    tools::execute(&ctx, &call.name, &call.args).await
                };

                if let Some(action) = outcome.action {
                    send(tx, TurnEvent::action(&action)).await?;
                    session.pending_actions.push(action);
                }

                forward(
                    tx,
                    adapter.push(Fragment::ToolResult {
                        id: call.id.clone(),
                        tool_name: call.name.clone(),
                        result: outcome.text.clone(),
                    }),
                )
                .await?;

                context.push(LlmMessage::tool_result(call.id, call.name, outcome.text));
            }

            debug!(round, "Tool round complete");
        }

        warn!(max_rounds = MAX_TOOL_ROUNDS, "Tool round limit reached");
        Ok(())
    }

    /// System prompt, recent transcript and the new message
    fn build_context(&self, session: &SessionState, message: &str) -> Vec<LlmMessage> {
        let mut context = vec![LlmMessage::system(system_prompt(session))];

        for past in session.recent_history(self.history_window) {
            let text = past.text();
            if text.is_empty() {
                continue;
            }
            context.push(match past.role {
                MessageRole::User => LlmMessage::user(text),
                MessageRole::Agent => LlmMessage::assistant(text),
            });
        }

        context.push(LlmMessage::user(message));
        context
    }

    /// Append the turn to the transcript and persist; returns the reply text
    async fn finalize(
        &self,
        session: &mut SessionState,
        owner_id: Uuid,
        message: String,
        adapter: StreamAdapter,
    ) -> String {
        session.chat_history.push(ChatMessage::user(message));

        let reply = match adapter.finish() {
            Some(body) => {
                let agent = ChatMessage::agent(body);
                let text = agent.text();
                session.chat_history.push(agent);
                text
            }
            None => String::new(),
        };

        match self.sessions.persist(session, owner_id).await {
            Ok(outcome) => debug!(
                session_id = %session.session_id,
                title_scheduled = outcome.title_task.is_some(),
                "Turn persisted"
            ),
            Err(e) => error!(
                session_id = %session.session_id,
                owner_id = %owner_id,
                error = %e,
                "Turn streamed but state NOT saved"
            ),
        }

        reply
    }
}

/// Persona prompt with a point-in-time state summary
pub fn system_prompt(session: &SessionState) -> String {
    format!(
        r#"You are a friendly music DJ assistant called "Playhead DJ". You help users discover and play music.

Current State:
{}

You have access to tools to control music playback and manage the playlist:
- search_music: Search for music
- get_now_playing: Check what's currently playing
- get_playlist: See the queue
- play_track: Play a specific track by number (1-indexed)
- skip_next: Skip to next track
- add_to_playlist: Add music (format: "track name - artist")
- remove_from_playlist: Remove track by number (1-indexed)

Be conversational and fun! Add music-related commentary. Keep responses concise."#,
        session.context_summary()
    )
}

async fn send(tx: &mpsc::Sender<TurnEvent>, event: TurnEvent) -> ChatResult<()> {
    tx.send(event).await.map_err(|_| ChatError::Disconnected)
}

async fn forward(tx: &mpsc::Sender<TurnEvent>, events: Vec<TurnEvent>) -> ChatResult<()> {
    for event in events {
        send(tx, event).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Track;
    use assert_matches::assert_matches;

    fn track(id: &str, name: &str) -> Track {
        Track {
            id: id.to_string(),
            name: name.to_string(),
            artist: "Band".to_string(),
            album: None,
            artwork_url: None,
            duration_seconds: None,
        }
    }

    #[test]
    fn test_system_prompt_embeds_state() {
        let mut session = SessionState::new(Uuid::new_v4());
        session.playlist = vec![track("1", "A"), track("2", "B")];
        session.current_track = Some(track("2", "B"));

        let prompt = system_prompt(&session);
        assert!(prompt.contains("Current State:\nCurrently playing: B by Band"));
        assert!(prompt.contains("Playlist has 2 tracks:\n  1. A - Band\n  2. B - Band"));
        assert!(prompt.ends_with("Keep responses concise."));
    }

    #[tokio::test]
    async fn test_forward_reports_disconnect() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let result = forward(&tx, vec![TurnEvent::Text { content: "hi".into() }]).await;
        assert_matches!(result, Err(ChatError::Disconnected));
    }

    #[test]
    fn test_chat_error_to_api_error_conversion() {
        let id = Uuid::new_v4();
        let api: ApiError = ChatError::Session(SessionError::NotFound(id)).into();
        assert_matches!(api, ApiError::NotFound { resource_type: "conversation", .. });

        let api: ApiError = ChatError::InvalidInput("empty".into()).into();
        assert_matches!(api, ApiError::ValidationError(_));

        let api: ApiError = ChatError::Timeout(120).into();
        assert_matches!(api, ApiError::AiService(_));
    }
}
