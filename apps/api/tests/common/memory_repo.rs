//! In-memory [`ConversationRepository`] for integration tests
//!
//! Behaves like the Postgres repository (owner scoping, last write wins,
//! metadata derived on save) and can be told to fail reads or writes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use playhead_api::models::{
    ChatMessage, Conversation, ConversationPatch, ConversationSummary, PlaybackState, StoredState,
};
use playhead_api::repositories::ConversationRepository;
use uuid::Uuid;

struct Entry {
    conversation: Conversation,
    state: StoredState,
}

#[derive(Default)]
pub struct MemoryConversationRepository {
    entries: Mutex<HashMap<Uuid, Entry>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every lookup fail as if the pool were exhausted
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every create and save fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn conversation(&self, id: Uuid) -> Option<Conversation> {
        self.entries
            .lock()
            .unwrap()
            .get(&id)
            .map(|e| e.conversation.clone())
    }

    pub fn stored(&self, id: Uuid) -> Option<StoredState> {
        self.entries.lock().unwrap().get(&id).map(|e| e.state.clone())
    }

    /// Seed a conversation with a transcript and player state
    pub fn insert(&self, id: Uuid, owner: Uuid, messages: Vec<ChatMessage>, context: PlaybackState) {
        let summary = ConversationSummary::from_history(&messages);
        let mut conversation = new_conversation(id, owner);
        conversation.message_count = summary.message_count;
        conversation.last_message_preview = summary.last_message_preview;
        conversation.last_message_at = summary.last_message_at;

        self.entries.lock().unwrap().insert(
            id,
            Entry {
                conversation,
                state: StoredState {
                    messages,
                    context,
                    last_synced_at: Utc::now(),
                },
            },
        );
    }

    /// Poll until the detached title task has written a title
    pub async fn wait_for_title(&self, id: Uuid) -> Option<String> {
        for _ in 0..100 {
            if let Some(title) = self.conversation(id).and_then(|c| c.title) {
                return Some(title);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }

    /// Poll until the stored transcript is non-empty (turns persist from a spawned task)
    pub async fn wait_for_messages(&self, id: Uuid) -> Vec<ChatMessage> {
        for _ in 0..100 {
            if let Some(state) = self.stored(id).filter(|s| !s.messages.is_empty()) {
                return state.messages;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Vec::new()
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), sqlx::Error> {
        if flag.load(Ordering::SeqCst) {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }
}

fn new_conversation(id: Uuid, owner: Uuid) -> Conversation {
    let now = Utc::now();
    Conversation {
        id,
        user_id: owner,
        title: None,
        metadata: serde_json::json!({}),
        created_at: now,
        updated_at: now,
        message_count: 0,
        last_message_preview: None,
        last_message_at: None,
        is_pinned: false,
        is_archived: false,
    }
}

#[async_trait]
impl ConversationRepository for MemoryConversationRepository {
    async fn find_state(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<Option<StoredState>, sqlx::Error> {
        self.check(&self.fail_reads)?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&id)
            .filter(|e| owner.map_or(true, |o| e.conversation.user_id == o))
            .map(|e| e.state.clone()))
    }

    async fn create_if_absent(&self, id: Uuid, owner: Uuid) -> Result<(), sqlx::Error> {
        self.check(&self.fail_writes)?;
        self.entries.lock().unwrap().entry(id).or_insert_with(|| Entry {
            conversation: new_conversation(id, owner),
            state: StoredState {
                messages: Vec::new(),
                context: PlaybackState::default(),
                last_synced_at: Utc::now(),
            },
        });
        Ok(())
    }

    async fn save_state(
        &self,
        id: Uuid,
        owner: Uuid,
        messages: &[ChatMessage],
        context: &PlaybackState,
        summary: &ConversationSummary,
    ) -> Result<bool, sqlx::Error> {
        self.check(&self.fail_writes)?;
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries
            .get_mut(&id)
            .filter(|e| e.conversation.user_id == owner)
        else {
            return Ok(false);
        };

        let now = Utc::now();
        entry.conversation.message_count = summary.message_count;
        entry.conversation.last_message_preview = summary.last_message_preview.clone();
        entry.conversation.last_message_at = summary.last_message_at;
        entry.conversation.updated_at = now;
        entry.state = StoredState {
            messages: messages.to_vec(),
            context: context.clone(),
            last_synced_at: now,
        };
        Ok(true)
    }

    async fn set_title(&self, id: Uuid, title: &str) -> Result<(), sqlx::Error> {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&id) {
            entry.conversation.title = Some(title.to_string());
        }
        Ok(())
    }

    async fn find(&self, id: Uuid, owner: Uuid) -> Result<Option<Conversation>, sqlx::Error> {
        self.check(&self.fail_reads)?;
        Ok(self
            .conversation(id)
            .filter(|c| c.user_id == owner))
    }

    async fn list(
        &self,
        owner: Uuid,
        include_archived: bool,
        limit: i64,
    ) -> Result<Vec<Conversation>, sqlx::Error> {
        self.check(&self.fail_reads)?;
        let mut found: Vec<Conversation> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .map(|e| e.conversation.clone())
            .filter(|c| c.user_id == owner && (include_archived || !c.is_archived))
            .collect();

        found.sort_by(|a, b| {
            b.is_pinned
                .cmp(&a.is_pinned)
                .then(b.updated_at.cmp(&a.updated_at))
        });
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        owner: Uuid,
        patch: &ConversationPatch,
    ) -> Result<Option<Conversation>, sqlx::Error> {
        self.check(&self.fail_writes)?;
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries
            .get_mut(&id)
            .filter(|e| e.conversation.user_id == owner)
        else {
            return Ok(None);
        };

        let conversation = &mut entry.conversation;
        if let Some(title) = &patch.title {
            conversation.title = Some(title.clone());
        }
        if let Some(pinned) = patch.is_pinned {
            conversation.is_pinned = pinned;
        }
        if let Some(archived) = patch.is_archived {
            conversation.is_archived = archived;
        }
        conversation.updated_at = Utc::now();
        Ok(Some(conversation.clone()))
    }

    async fn delete(&self, id: Uuid, owner: Uuid) -> Result<bool, sqlx::Error> {
        self.check(&self.fail_writes)?;
        let mut entries = self.entries.lock().unwrap();
        let owned = entries
            .get(&id)
            .is_some_and(|e| e.conversation.user_id == owner);
        if owned {
            entries.remove(&id);
        }
        Ok(owned)
    }
}
