//! In-memory history store for testing and ephemeral runs
//!
//! Keeps every turn in a `Vec` behind an `RwLock`. Nothing survives the
//! process; useful for unit tests and deployments that explicitly opt
//! out of durability.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ConversationSummary, HistoryStore, Turn, summarize_ordered};
use crate::error::{ColloquyError, Result};

struct Inner {
    turns: Vec<Turn>,
    // Latest timestamp per conversation; keeps write timestamps
    // monotonically non-decreasing within a conversation.
    latest: HashMap<String, DateTime<Utc>>,
}

/// In-memory history store.
pub struct MemoryHistoryStore {
    inner: RwLock<Inner>,
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHistoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                turns: Vec::new(),
                latest: HashMap::new(),
            }),
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn save_turn(
        &self,
        conversation_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<Turn> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(ColloquyError::InvalidInput(
                "user message is empty".to_string(),
            ));
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| ColloquyError::WriteFailed("store lock poisoned".to_string()))?;

        let mut timestamp = Utc::now();
        if let Some(last) = inner.latest.get(conversation_id) {
            if timestamp < *last {
                timestamp = *last;
            }
        }

        let turn = Turn {
            conversation_id: conversation_id.to_string(),
            user_text: user_text.to_string(),
            assistant_text: assistant_text.to_string(),
            timestamp,
        };

        inner
            .latest
            .insert(conversation_id.to_string(), timestamp);
        inner.turns.push(turn.clone());

        Ok(turn)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ColloquyError::StoreUnavailable("store lock poisoned".to_string()))?;

        // Insertion order is already non-decreasing per conversation; a
        // stable sort across conversations makes the scan timestamp-ordered.
        let mut ordered = inner.turns.clone();
        ordered.sort_by_key(|t| t.timestamp);

        Ok(summarize_ordered(&ordered))
    }

    async fn get_turns(&self, conversation_id: &str) -> Result<Vec<Turn>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ColloquyError::StoreUnavailable("store lock poisoned".to_string()))?;

        let mut turns: Vec<Turn> = inner
            .turns
            .iter()
            .filter(|t| t.conversation_id == conversation_id)
            .cloned()
            .collect();
        // Stable: equal timestamps keep insertion order.
        turns.sort_by_key(|t| t.timestamp);

        Ok(turns)
    }

    async fn erase_all(&self) -> Result<u64> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ColloquyError::WriteFailed("store lock poisoned".to_string()))?;

        let deleted = inner.turns.len() as u64;
        inner.turns.clear();
        inner.latest.clear();

        tracing::info!(deleted, "erased all conversation history");
        Ok(deleted)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_roundtrip() {
        let store = MemoryHistoryStore::new();

        store.save_turn("conv", "hello", "hi there").await.unwrap();
        let saved = store.save_turn("conv", "how are you", "fine").await.unwrap();

        let turns = store.get_turns("conv").await.unwrap();
        assert_eq!(turns.len(), 2);
        let last = turns.last().unwrap();
        assert_eq!(last.user_text, saved.user_text);
        assert_eq!(last.assistant_text, "fine");
        assert!(turns[0].timestamp <= turns[1].timestamp);
    }

    #[tokio::test]
    async fn test_empty_user_text_rejected() {
        let store = MemoryHistoryStore::new();
        let result = store.save_turn("conv", "   ", "reply").await;
        assert!(matches!(result, Err(ColloquyError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_unknown_id_yields_empty() {
        let store = MemoryHistoryStore::new();
        let turns = store.get_turns("nope").await.unwrap();
        assert!(turns.is_empty());
    }

    #[tokio::test]
    async fn test_listing_ranks_by_recency() {
        let store = MemoryHistoryStore::new();
        store.save_turn("a", "first in a", "r").await.unwrap();
        store.save_turn("b", "first in b", "r").await.unwrap();
        store.save_turn("a", "again in a", "r").await.unwrap();

        let listing = store.list_conversations().await.unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].id, "a");
        assert_eq!(listing[0].title, "first in a");
        assert_eq!(listing[1].id, "b");
    }

    #[tokio::test]
    async fn test_erase_all() {
        let store = MemoryHistoryStore::new();
        store.save_turn("a", "q", "r").await.unwrap();
        store.save_turn("b", "q", "r").await.unwrap();

        let deleted = store.erase_all().await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.list_conversations().await.unwrap().is_empty());
        assert!(store.get_turns("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_saves_do_not_interleave() {
        use std::sync::Arc;

        let store = Arc::new(MemoryHistoryStore::new());

        let mut handles = Vec::new();
        for id in ["left", "right"] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    store
                        .save_turn(id, &format!("{} q{}", id, i), "r")
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for id in ["left", "right"] {
            let turns = store.get_turns(id).await.unwrap();
            assert_eq!(turns.len(), 25);
            assert!(turns.iter().all(|t| t.conversation_id == id));
            assert!(turns.iter().all(|t| t.user_text.starts_with(id)));
            assert!(
                turns.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
                "timestamps must be non-decreasing within a conversation"
            );
        }
    }

    #[tokio::test]
    async fn test_same_id_concurrent_saves_all_persist() {
        use std::sync::Arc;

        let store = Arc::new(MemoryHistoryStore::new());

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save_turn("shared", &format!("submit {}", i), "r")
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let turns = store.get_turns("shared").await.unwrap();
        assert_eq!(turns.len(), 10, "no concurrent save may be lost");
    }
}
