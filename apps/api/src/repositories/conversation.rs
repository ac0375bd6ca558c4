//! Conversation repository
//!
//! A conversation row carries the owner and list metadata; its single
//! `conversation_states` row carries the transcript and the player context as
//! JSON documents. State writes replace both documents (last write wins).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::models::{
    ChatMessage, Conversation, ConversationPatch, ConversationSummary, PlaybackState, StoredState,
};

/// SELECT column list for conversation queries
const CONVERSATION_COLUMNS: &str = r#"
    id, user_id, title, metadata, created_at, updated_at,
    message_count, last_message_preview, last_message_at,
    is_pinned, is_archived
"#;

/// Storage for conversations and their session state
///
/// Every method acquires its own pooled connection, so implementations can be
/// shared with detached tasks.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Stored state, restricted to `owner` when given
    async fn find_state(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<Option<StoredState>, sqlx::Error>;

    /// Insert the conversation and an empty state unless they already exist
    async fn create_if_absent(&self, id: Uuid, owner: Uuid) -> Result<(), sqlx::Error>;

    /// Replace the state documents and the derived metadata in one transaction
    ///
    /// Returns `false` when no conversation with this id belongs to `owner`.
    async fn save_state(
        &self,
        id: Uuid,
        owner: Uuid,
        messages: &[ChatMessage],
        context: &PlaybackState,
        summary: &ConversationSummary,
    ) -> Result<bool, sqlx::Error>;

    async fn set_title(&self, id: Uuid, title: &str) -> Result<(), sqlx::Error>;

    async fn find(&self, id: Uuid, owner: Uuid) -> Result<Option<Conversation>, sqlx::Error>;

    /// Owner's conversations, pinned first, then most recently updated
    async fn list(
        &self,
        owner: Uuid,
        include_archived: bool,
        limit: i64,
    ) -> Result<Vec<Conversation>, sqlx::Error>;

    async fn update_metadata(
        &self,
        id: Uuid,
        owner: Uuid,
        patch: &ConversationPatch,
    ) -> Result<Option<Conversation>, sqlx::Error>;

    /// Delete a conversation; its state row goes with it
    async fn delete(&self, id: Uuid, owner: Uuid) -> Result<bool, sqlx::Error>;
}

#[derive(FromRow)]
struct StateRow {
    messages: Json<Vec<ChatMessage>>,
    context: Json<PlaybackState>,
    last_synced_at: DateTime<Utc>,
}

impl From<StateRow> for StoredState {
    fn from(row: StateRow) -> Self {
        Self {
            messages: row.messages.0,
            context: row.context.0,
            last_synced_at: row.last_synced_at,
        }
    }
}

/// Postgres-backed [`ConversationRepository`]
#[derive(Clone)]
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    #[instrument(skip(self))]
    async fn find_state(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<Option<StoredState>, sqlx::Error> {
        let row = sqlx::query_as::<_, StateRow>(
            r#"
            SELECT s.messages, s.context, s.last_synced_at
            FROM conversation_states s
            JOIN conversations c ON c.id = s.conversation_id
            WHERE c.id = $1 AND ($2::uuid IS NULL OR c.user_id = $2)
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(StoredState::from))
    }

    #[instrument(skip(self))]
    async fn create_if_absent(&self, id: Uuid, owner: Uuid) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, message_count)
            VALUES ($1, $2, 0)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(owner)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_states (conversation_id, messages, context)
            VALUES ($1, '[]'::jsonb, '{}'::jsonb)
            ON CONFLICT (conversation_id) DO NOTHING
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    #[instrument(skip(self, messages, context, summary), fields(message_count = summary.message_count))]
    async fn save_state(
        &self,
        id: Uuid,
        owner: Uuid,
        messages: &[ChatMessage],
        context: &PlaybackState,
        summary: &ConversationSummary,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE conversations
            SET message_count = $3,
                last_message_preview = $4,
                last_message_at = $5,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(summary.message_count)
        .bind(summary.last_message_preview.as_deref())
        .bind(summary.last_message_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO conversation_states (conversation_id, messages, context, last_synced_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (conversation_id) DO UPDATE
            SET messages = EXCLUDED.messages,
                context = EXCLUDED.context,
                last_synced_at = NOW(),
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(Json(messages))
        .bind(Json(context))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn set_title(&self, id: Uuid, title: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE conversations SET title = $2 WHERE id = $1")
            .bind(id)
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find(&self, id: Uuid, owner: Uuid) -> Result<Option<Conversation>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM conversations WHERE id = $1 AND user_id = $2",
            CONVERSATION_COLUMNS
        );
        sqlx::query_as::<_, Conversation>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        owner: Uuid,
        include_archived: bool,
        limit: i64,
    ) -> Result<Vec<Conversation>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM conversations
            WHERE user_id = $1 AND ($2 OR is_archived = false)
            ORDER BY is_pinned DESC, updated_at DESC
            LIMIT $3
            "#,
            CONVERSATION_COLUMNS
        );
        sqlx::query_as::<_, Conversation>(&query)
            .bind(owner)
            .bind(include_archived)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    #[instrument(skip(self, patch))]
    async fn update_metadata(
        &self,
        id: Uuid,
        owner: Uuid,
        patch: &ConversationPatch,
    ) -> Result<Option<Conversation>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE conversations
            SET title = COALESCE($3, title),
                is_pinned = COALESCE($4, is_pinned),
                is_archived = COALESCE($5, is_archived),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            CONVERSATION_COLUMNS
        );
        sqlx::query_as::<_, Conversation>(&query)
            .bind(id)
            .bind(owner)
            .bind(patch.title.as_deref())
            .bind(patch.is_pinned)
            .bind(patch.is_archived)
            .fetch_optional(&self.pool)
            .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid, owner: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
