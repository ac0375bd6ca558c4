//! Session store
//!
//! Loads, creates and persists [`SessionState`] through a
//! [`ConversationRepository`], and schedules title generation after a
//! persist. Lookups fail closed: any storage problem reads as "not found".

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{ChatMessage, ConversationSummary, SessionState, DEFAULT_TITLE};
use crate::repositories::ConversationRepository;
use crate::services::title::{TitleError, TitleGenerator};

/// Message count after the first user + agent exchange
const FIRST_EXCHANGE: i32 = 2;

/// Titles are refreshed every this many messages
const TITLE_REFRESH_INTERVAL: i32 = 10;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Result of a successful persist
#[derive(Debug, Default)]
pub struct PersistOutcome {
    /// Detached title task, if one was scheduled
    pub title_task: Option<JoinHandle<()>>,
}

/// Whether a persist at this message count schedules a title
pub fn should_generate_title(message_count: i32) -> bool {
    message_count == FIRST_EXCHANGE
        || (message_count > 0 && message_count % TITLE_REFRESH_INTERVAL == 0)
}

/// Parse a client-supplied id; malformed ids never reach storage
pub fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

#[derive(Clone)]
pub struct SessionStore {
    repo: Arc<dyn ConversationRepository>,
    titles: Option<TitleGenerator>,
}

impl SessionStore {
    pub fn new(repo: Arc<dyn ConversationRepository>) -> Self {
        Self { repo, titles: None }
    }

    pub fn with_title_generator(mut self, titles: TitleGenerator) -> Self {
        self.titles = Some(titles);
        self
    }

    pub fn repository(&self) -> &Arc<dyn ConversationRepository> {
        &self.repo
    }

    /// Load a session, enforcing ownership when `owner` is given
    #[instrument(skip(self))]
    pub async fn get(&self, session_id: Uuid, owner: Option<Uuid>) -> Option<SessionState> {
        match self.repo.find_state(session_id, owner).await {
            Ok(found) => found.map(|stored| {
                SessionState::from_stored(
                    session_id,
                    stored.messages,
                    stored.context,
                    stored.last_synced_at,
                )
            }),
            Err(e) => {
                warn!(error = %e, "Session lookup failed, treating as not found");
                None
            }
        }
    }

    /// Get-or-create; safe to repeat and to race
    #[instrument(skip(self))]
    pub async fn create(&self, session_id: Uuid, owner: Uuid) -> SessionResult<SessionState> {
        match self.repo.create_if_absent(session_id, owner).await {
            Ok(()) => self
                .get(session_id, Some(owner))
                .await
                .ok_or(SessionError::NotFound(session_id)),
            Err(e) => {
                warn!(error = %e, "Session create failed, retrying as lookup");
                self.get(session_id, Some(owner))
                    .await
                    .ok_or(SessionError::Database(e))
            }
        }
    }

    /// Existing session for this owner, or a new one
    pub async fn get_or_create(&self, session_id: Uuid, owner: Uuid) -> SessionResult<SessionState> {
        match self.get(session_id, Some(owner)).await {
            Some(state) => Ok(state),
            None => self.create(session_id, owner).await,
        }
    }

    /// Persist after a turn and schedule a title when due
    #[instrument(skip(self, state), fields(session_id = %state.session_id, owner_id = %owner))]
    pub async fn persist(&self, state: &SessionState, owner: Uuid) -> SessionResult<PersistOutcome> {
        let message_count = self.write(state, owner).await?;

        let title_task = should_generate_title(message_count).then(|| {
            self.schedule_title(state.session_id, state.chat_history.clone(), message_count)
        });

        Ok(PersistOutcome { title_task })
    }

    /// Persist a client playback sync; never schedules a title
    #[instrument(skip(self, state), fields(session_id = %state.session_id, owner_id = %owner))]
    pub async fn save_playback(&self, state: &SessionState, owner: Uuid) -> SessionResult<()> {
        self.write(state, owner).await.map(|_| ())
    }

    async fn write(&self, state: &SessionState, owner: Uuid) -> SessionResult<i32> {
        let summary = ConversationSummary::from_history(&state.chat_history);

        let saved = self
            .repo
            .save_state(
                state.session_id,
                owner,
                &state.chat_history,
                &state.playback(),
                &summary,
            )
            .await?;

        if !saved {
            return Err(SessionError::NotFound(state.session_id));
        }

        debug!(message_count = summary.message_count, "Session persisted");
        Ok(summary.message_count)
    }

    /// Detached title task with its own error boundary
    fn schedule_title(
        &self,
        session_id: Uuid,
        history: Vec<ChatMessage>,
        message_count: i32,
    ) -> JoinHandle<()> {
        let repo = Arc::clone(&self.repo);
        let titles = self.titles.clone();

        tokio::spawn(async move {
            let generated = match &titles {
                Some(generator) => generator.generate(&history).await,
                None => Err(TitleError::Disabled),
            };

            match generated {
                Ok(title) => match repo.set_title(session_id, &title).await {
                    Ok(()) => info!(session_id = %session_id, title = %title, "Conversation titled"),
                    Err(e) => warn!(session_id = %session_id, error = %e, "Failed to store title"),
                },
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Title generation failed");
                    if message_count == FIRST_EXCHANGE {
                        if let Err(e) = repo.set_title(session_id, DEFAULT_TITLE).await {
                            warn!(session_id = %session_id, error = %e, "Failed to store default title");
                        }
                    }
                }
            }
        })
    }
}
