//! SurrealDB-backed history store
//!
//! Durable persistence for conversation turns, independent of process
//! lifetime. Supports the embedded RocksDB engine for local
//! deployments, the in-memory engine for tests, and a remote server
//! over WebSocket. Connection attempts are bounded by a timeout so
//! `StoreUnavailable` is raised promptly instead of hanging.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::Connection;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::engine::remote::ws::{Client, Ws};
use tokio::sync::Mutex;

use super::{ConversationSummary, HistoryStore, Turn, summarize_ordered};
use crate::error::{ColloquyError, Result};

const NAMESPACE: &str = "colloquy";
const DATABASE: &str = "history";
const TABLE: &str = "turn";

/// Stored record shape. Timestamps are fixed-width RFC 3339 strings so
/// lexicographic order matches chronological order; `seq` breaks ties
/// by insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TurnRecord {
    conversation_id: String,
    user_text: String,
    assistant_text: String,
    timestamp: String,
    seq: u64,
}

impl TurnRecord {
    fn into_turn(self) -> Turn {
        Turn {
            conversation_id: self.conversation_id,
            user_text: self.user_text,
            assistant_text: self.assistant_text,
            timestamp: self
                .timestamp
                .parse::<DateTime<Utc>>()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SeqRow {
    seq: u64,
}

#[derive(Debug, Deserialize)]
struct TimestampRow {
    timestamp: String,
}

/// SurrealDB history store, generic over the connection engine.
pub struct SurrealHistoryStore<C: Connection> {
    db: Surreal<C>,
    // Latest write timestamp per conversation, lazily seeded from the
    // database; keeps timestamps monotonically non-decreasing within a
    // conversation even when the wall clock steps backwards.
    latest: Mutex<HashMap<String, DateTime<Utc>>>,
    seq: AtomicU64,
}

impl SurrealHistoryStore<Db> {
    /// Open an embedded store with the in-memory engine (tests).
    pub async fn connect_memory() -> Result<Self> {
        let db = Surreal::new::<Mem>(()).await.map_err(|e| {
            ColloquyError::StoreUnavailable(format!("Failed to open in-memory engine: {}", e))
        })?;
        Self::init(db).await
    }

    /// Open an embedded store backed by RocksDB at `data_dir`.
    pub async fn connect_embedded(data_dir: impl AsRef<Path>) -> Result<Self> {
        let path = data_dir.as_ref().to_string_lossy().into_owned();
        let db = Surreal::new::<RocksDb>(path).await.map_err(|e| {
            ColloquyError::StoreUnavailable(format!("Failed to open embedded store: {}", e))
        })?;
        Self::init(db).await
    }
}

impl SurrealHistoryStore<Client> {
    /// Connect to a SurrealDB server over WebSocket.
    ///
    /// The attempt is bounded by `connect_timeout`; on expiry the
    /// caller gets `StoreUnavailable` rather than an indefinite hang.
    pub async fn connect_server(url: &str, connect_timeout: Duration) -> Result<Self> {
        let address = url.trim_start_matches("ws://").to_string();

        let db = tokio::time::timeout(connect_timeout, Surreal::new::<Ws>(address))
            .await
            .map_err(|_| {
                ColloquyError::StoreUnavailable(format!(
                    "Timed out connecting to history store at {} after {:?}",
                    url, connect_timeout
                ))
            })?
            .map_err(|e| {
                ColloquyError::StoreUnavailable(format!(
                    "Failed to connect to history store at {}: {}",
                    url, e
                ))
            })?;

        Self::init(db).await
    }
}

impl<C: Connection> SurrealHistoryStore<C> {
    async fn init(db: Surreal<C>) -> Result<Self> {
        db.use_ns(NAMESPACE).use_db(DATABASE).await.map_err(|e| {
            ColloquyError::StoreUnavailable(format!("Failed to select namespace/database: {}", e))
        })?;

        Self::define_schema(&db).await?;

        let store = Self {
            db,
            latest: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
        };
        store.seed_sequence().await?;

        Ok(store)
    }

    async fn define_schema(db: &Surreal<C>) -> Result<()> {
        let statements = [
            "DEFINE TABLE IF NOT EXISTS turn SCHEMAFULL",
            "DEFINE FIELD IF NOT EXISTS conversation_id ON turn TYPE string",
            "DEFINE FIELD IF NOT EXISTS user_text ON turn TYPE string",
            "DEFINE FIELD IF NOT EXISTS assistant_text ON turn TYPE string",
            "DEFINE FIELD IF NOT EXISTS timestamp ON turn TYPE string",
            "DEFINE FIELD IF NOT EXISTS seq ON turn TYPE int",
            "DEFINE INDEX IF NOT EXISTS conversation_idx ON turn FIELDS conversation_id",
        ];

        for statement in statements {
            db.query(statement).await.map_err(|e| {
                ColloquyError::StoreUnavailable(format!("Failed to define schema: {}", e))
            })?;
        }

        Ok(())
    }

    /// Continue the insertion sequence from persisted data, so
    /// tie-break ordering survives a restart.
    async fn seed_sequence(&self) -> Result<()> {
        let mut response = self
            .db
            .query("SELECT seq FROM turn ORDER BY seq DESC LIMIT 1")
            .await
            .map_err(|e| {
                ColloquyError::StoreUnavailable(format!("Failed to read sequence: {}", e))
            })?;

        let rows: Vec<SeqRow> = response.take(0).map_err(|e| {
            ColloquyError::StoreUnavailable(format!("Failed to read sequence: {}", e))
        })?;

        if let Some(row) = rows.first() {
            self.seq.store(row.seq + 1, Ordering::SeqCst);
        }

        Ok(())
    }

    /// Assign a write timestamp that never decreases within the
    /// conversation, seeding the guard from persisted turns on first use.
    async fn next_timestamp(&self, conversation_id: &str) -> Result<DateTime<Utc>> {
        let mut latest = self.latest.lock().await;

        if !latest.contains_key(conversation_id) {
            let mut response = self
                .db
                .query(
                    "SELECT timestamp FROM turn WHERE conversation_id = $id \
                     ORDER BY timestamp DESC LIMIT 1",
                )
                .bind(("id", conversation_id.to_string()))
                .await
                .map_err(|e| {
                    ColloquyError::StoreUnavailable(format!(
                        "Failed to read latest timestamp: {}",
                        e
                    ))
                })?;

            let rows: Vec<TimestampRow> = response.take(0).map_err(|e| {
                ColloquyError::StoreUnavailable(format!("Failed to read latest timestamp: {}", e))
            })?;

            if let Some(row) = rows.first() {
                if let Ok(previous) = row.timestamp.parse::<DateTime<Utc>>() {
                    latest.insert(conversation_id.to_string(), previous);
                }
            }
        }

        let mut timestamp = Utc::now();
        if let Some(last) = latest.get(conversation_id) {
            if timestamp < *last {
                timestamp = *last;
            }
        }
        latest.insert(conversation_id.to_string(), timestamp);

        Ok(timestamp)
    }
}

#[async_trait]
impl<C: Connection> HistoryStore for SurrealHistoryStore<C> {
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

        let timestamp = self.next_timestamp(conversation_id).await?;

        let record = TurnRecord {
            conversation_id: conversation_id.to_string(),
            user_text: user_text.to_string(),
            assistant_text: assistant_text.to_string(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
        };

        let created: Option<TurnRecord> = self
            .db
            .create(TABLE)
            .content(record)
            .await
            .map_err(|e| ColloquyError::WriteFailed(format!("Failed to persist turn: {}", e)))?;

        created
            .map(TurnRecord::into_turn)
            .ok_or_else(|| ColloquyError::WriteFailed("store returned no record".to_string()))
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let mut response = self
            .db
            .query("SELECT * FROM turn ORDER BY timestamp ASC, seq ASC")
            .await
            .map_err(|e| {
                ColloquyError::StoreUnavailable(format!("Failed to list conversations: {}", e))
            })?;

        let records: Vec<TurnRecord> = response.take(0).map_err(|e| {
            ColloquyError::StoreUnavailable(format!("Failed to list conversations: {}", e))
        })?;

        let turns: Vec<Turn> = records.into_iter().map(TurnRecord::into_turn).collect();
        Ok(summarize_ordered(&turns))
    }

    async fn get_turns(&self, conversation_id: &str) -> Result<Vec<Turn>> {
        let mut response = self
            .db
            .query(
                "SELECT * FROM turn WHERE conversation_id = $id \
                 ORDER BY timestamp ASC, seq ASC",
            )
            .bind(("id", conversation_id.to_string()))
            .await
            .map_err(|e| {
                ColloquyError::StoreUnavailable(format!("Failed to load turns: {}", e))
            })?;

        let records: Vec<TurnRecord> = response.take(0).map_err(|e| {
            ColloquyError::StoreUnavailable(format!("Failed to load turns: {}", e))
        })?;

        Ok(records.into_iter().map(TurnRecord::into_turn).collect())
    }

    async fn erase_all(&self) -> Result<u64> {
        let deleted: Vec<TurnRecord> = self
            .db
            .delete(TABLE)
            .await
            .map_err(|e| ColloquyError::WriteFailed(format!("Failed to erase history: {}", e)))?;

        self.latest.lock().await.clear();

        let count = deleted.len() as u64;
        tracing::info!(deleted = count, "erased all conversation history");
        Ok(count)
    }

    async fn health_check(&self) -> Result<()> {
        self.db
            .health()
            .await
            .map_err(|e| ColloquyError::StoreUnavailable(format!("Store unreachable: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SurrealHistoryStore<Db> {
        SurrealHistoryStore::connect_memory()
            .await
            .expect("in-memory engine should open")
    }

    #[tokio::test]
    async fn test_save_and_roundtrip() {
        let store = memory_store().await;

        store.save_turn("conv", "hello", "hi").await.unwrap();
        let saved = store.save_turn("conv", "and again", "sure").await.unwrap();

        let turns = store.get_turns("conv").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns.last().unwrap().user_text, saved.user_text);
        assert!(turns[0].timestamp <= turns[1].timestamp);
    }

    #[tokio::test]
    async fn test_empty_user_text_rejected() {
        let store = memory_store().await;
        let result = store.save_turn("conv", "  ", "reply").await;
        assert!(matches!(result, Err(ColloquyError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_unknown_id_yields_empty() {
        let store = memory_store().await;
        assert!(store.get_turns("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_ranks_by_recency_with_titles() {
        let store = memory_store().await;
        store.save_turn("a", "opening question in a", "r").await.unwrap();
        store.save_turn("b", "opening question in b", "r").await.unwrap();
        store.save_turn("a", "follow-up in a", "r").await.unwrap();

        let listing = store.list_conversations().await.unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].id, "a");
        assert_eq!(listing[0].title, "opening question in a");
        assert_eq!(listing[1].id, "b");
    }

    #[tokio::test]
    async fn test_title_truncation_is_codepoint_safe() {
        let store = memory_store().await;
        let long: String = "ở".repeat(50);
        store.save_turn("conv", &long, "r").await.unwrap();

        let listing = store.list_conversations().await.unwrap();
        assert_eq!(listing[0].title.chars().count(), 40);
    }

    #[tokio::test]
    async fn test_erase_all_reports_count() {
        let store = memory_store().await;
        store.save_turn("a", "q1", "r").await.unwrap();
        store.save_turn("a", "q2", "r").await.unwrap();
        store.save_turn("b", "q3", "r").await.unwrap();

        assert_eq!(store.erase_all().await.unwrap(), 3);
        assert!(store.list_conversations().await.unwrap().is_empty());
        assert!(store.get_turns("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_saves_keep_conversations_separate() {
        use std::sync::Arc;

        let store = Arc::new(memory_store().await);

        let mut handles = Vec::new();
        for id in ["left", "right"] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    store
                        .save_turn(id, &format!("{} message {}", id, i), "r")
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
            assert_eq!(turns.len(), 10);
            assert!(turns.iter().all(|t| t.user_text.starts_with(id)));
            assert!(turns.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = memory_store().await;
        store.health_check().await.unwrap();
    }
}
