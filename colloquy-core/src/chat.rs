//! Per-turn orchestration
//!
//! `ChatService` wires the session registry, history store, and
//! inference provider together. Each user turn runs: build prompt →
//! generate → update window → persist → trim. Persistence failure
//! degrades history durability, never the live conversation.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ColloquyConfig;
use crate::conversation::SessionRegistry;
use crate::error::Result;
use crate::llm::LlmProvider;
use crate::store::{ConversationSummary, HistoryStore, Turn};

/// Result of one completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Assistant response text
    pub response: String,
    /// Whether the turn reached the history store
    pub persisted: bool,
}

/// Conversation orchestrator.
pub struct ChatService {
    registry: SessionRegistry,
    store: Arc<dyn HistoryStore>,
    provider: Arc<dyn LlmProvider>,
    keep_turns: usize,
    max_turns: usize,
    idle_timeout: Duration,
}

impl ChatService {
    /// Create a service from configuration plus its collaborators.
    pub fn new(
        config: &ColloquyConfig,
        store: Arc<dyn HistoryStore>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(
                config.context.max_turns,
                config.context.system_preamble.clone(),
            ),
            store,
            provider,
            keep_turns: config.context.keep_turns,
            max_turns: config.context.max_turns,
            idle_timeout: config.context.idle_timeout,
        }
    }

    /// Run one user turn against a conversation.
    ///
    /// Holds only the owning conversation's session lock for the
    /// duration: a second message for the same conversation queues
    /// behind it, while other conversations and all store operations
    /// proceed. The store is written only after inference completes.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for empty text, `Inference` from the provider.
    /// Store failures are not errors here: the response is still
    /// returned with `persisted == false` and a warning logged.
    pub async fn send_message(&self, conversation_id: &str, user_text: &str) -> Result<TurnOutcome> {
        let entry = self.registry.acquire(conversation_id).await;
        let mut session = entry.lock().await;
        session.touch();

        let prompt = session.buffer.build_prompt(user_text)?;
        let response = self.provider.generate(&prompt).await?;

        session.buffer.add_user_message(user_text);
        session.buffer.add_assistant_message(&response);

        let persisted = match self
            .store
            .save_turn(conversation_id, user_text, &response)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "failed to persist turn; continuing from context window"
                );
                false
            }
        };

        if session.buffer.is_window_full() {
            session.buffer.trim(self.keep_turns);
        }

        Ok(TurnOutcome { response, persisted })
    }

    /// Rebuild a conversation's window from persisted history.
    ///
    /// Clears the window, replays the stored turns in timestamp order,
    /// and trims so the window holds at most the most recent
    /// `max_turns` exchanges. Returns the replayed turns for rendering.
    pub async fn switch_to(&self, conversation_id: &str) -> Result<Vec<Turn>> {
        let turns = self.store.get_turns(conversation_id).await?;

        let entry = self.registry.acquire(conversation_id).await;
        let mut session = entry.lock().await;
        session.touch();

        session.buffer.clear();
        for turn in &turns {
            session.buffer.add_user_message(&turn.user_text);
            session.buffer.add_assistant_message(&turn.assistant_text);
        }
        session.buffer.trim(self.max_turns);

        tracing::debug!(
            conversation_id = %conversation_id,
            replayed = turns.len(),
            "rebuilt context window from history"
        );

        Ok(turns)
    }

    /// Start a fresh conversation and return its id.
    ///
    /// The conversation exists in the store only once its first turn
    /// is persisted.
    pub fn new_conversation(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Drop a conversation's in-memory window. History is untouched.
    pub async fn reset(&self, conversation_id: &str) -> bool {
        self.registry.reset(conversation_id).await
    }

    /// Evict session windows idle longer than the configured timeout.
    pub async fn evict_idle(&self) -> usize {
        self.registry.evict_idle(self.idle_timeout).await
    }

    /// List every conversation, most recently active first.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.store.list_conversations().await
    }

    /// All persisted turns for a conversation, ascending by timestamp.
    pub async fn replay(&self, conversation_id: &str) -> Result<Vec<Turn>> {
        self.store.get_turns(conversation_id).await
    }

    /// Erase the entire history store and every live window.
    pub async fn erase_all(&self) -> Result<u64> {
        let deleted = self.store.erase_all().await?;
        self.registry.reset_all().await;
        Ok(deleted)
    }

    /// Verify the history store is reachable.
    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }
}
