//! Durable conversation history
//!
//! This module defines the `HistoryStore` trait that all history
//! backends implement. Turns are append-only and partitioned by
//! conversation id; a conversation exists exactly when at least one of
//! its turns has been persisted. Backends:
//!
//! - In-memory (tests, ephemeral runs)
//! - SurrealDB (embedded RocksDB, in-memory engine, or remote server)
//!
//! Store failures are surfaced to the caller, never swallowed: the
//! caller decides whether to retry or keep serving from the context
//! window alone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

mod memory;
mod surreal;

pub use memory::MemoryHistoryStore;
pub use surreal::SurrealHistoryStore;

/// Maximum codepoints of the first user message used as a title.
pub const TITLE_CODEPOINTS: usize = 40;

/// One persisted turn: a user message and its paired assistant response.
///
/// Immutable once persisted. Timestamps are store-assigned and
/// monotonically non-decreasing within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Opaque conversation identifier
    pub conversation_id: String,

    /// User message
    pub user_text: String,

    /// Assistant response
    pub assistant_text: String,

    /// When the turn was written
    pub timestamp: DateTime<Utc>,
}

/// Listing entry for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation identifier
    pub id: String,

    /// First 40 codepoints of the earliest turn's user text
    pub title: String,

    /// Timestamp of the most recent turn
    pub last_activity: DateTime<Utc>,
}

/// The history store trait.
///
/// Implementations must be safe for concurrent callers: writes for
/// distinct conversations never corrupt each other's ordering, and
/// reads may run alongside writes (a reader may observe a snapshot
/// stale by at most one in-flight write).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a turn with a store-assigned timestamp.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if `user_text` is empty after trimming;
    /// `StoreUnavailable` if the backend is unreachable; `WriteFailed`
    /// if the backend rejected this write.
    async fn save_turn(
        &self,
        conversation_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<Turn>;

    /// List every conversation, most recently active first.
    ///
    /// Title and ordering are derived from turn timestamps, never from
    /// insertion order.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>>;

    /// All turns for a conversation, ascending by timestamp.
    ///
    /// Returns an empty vec (not an error) for an unknown id.
    async fn get_turns(&self, conversation_id: &str) -> Result<Vec<Turn>>;

    /// Irreversibly delete every turn. Returns the count deleted.
    async fn erase_all(&self) -> Result<u64>;

    /// Verify the backend is reachable.
    ///
    /// Lets callers distinguish "no conversations exist" from "store
    /// unreachable".
    async fn health_check(&self) -> Result<()>;
}

/// Codepoint-safe title truncation.
pub(crate) fn derive_title(user_text: &str) -> String {
    user_text.chars().take(TITLE_CODEPOINTS).collect()
}

/// Single-pass grouping of timestamp-ordered turns into summaries.
///
/// `turns` must be ascending by timestamp; the first turn seen per id
/// is its earliest (title source) and the last seen its latest
/// (`last_activity`). Output is descending by `last_activity`, id as a
/// deterministic tiebreaker.
pub(crate) fn summarize_ordered(turns: &[Turn]) -> Vec<ConversationSummary> {
    use std::collections::HashMap;
    use std::collections::hash_map::Entry;

    let mut grouped: HashMap<&str, ConversationSummary> = HashMap::new();

    for turn in turns {
        match grouped.entry(turn.conversation_id.as_str()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().last_activity = turn.timestamp;
            }
            Entry::Vacant(entry) => {
                entry.insert(ConversationSummary {
                    id: turn.conversation_id.clone(),
                    title: derive_title(&turn.user_text),
                    last_activity: turn.timestamp,
                });
            }
        }
    }

    let mut summaries: Vec<ConversationSummary> = grouped.into_values().collect();
    summaries.sort_by(|a, b| {
        b.last_activity
            .cmp(&a.last_activity)
            .then_with(|| a.id.cmp(&b.id))
    });
    summaries
}
