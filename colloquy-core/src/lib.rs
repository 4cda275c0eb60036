//! # Colloquy - Resumable conversations with a local language model
//!
//! Colloquy manages multiple independent, named conversations against a
//! locally hosted model:
//! - Bounded per-conversation context windows for prompt construction
//! - Durable, append-only turn history partitioned by conversation id
//! - Conversation enumeration (ranked by recency, with derived titles)
//!   and full replay
//! - Pluggable inference providers (Ollama out of the box)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use colloquy_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ColloquyConfig::load()?;
//!     let store = Arc::new(MemoryHistoryStore::new());
//!     let provider = build_provider(&config.llm);
//!
//!     let service = ChatService::new(&config, store, provider);
//!     let id = service.new_conversation();
//!     let outcome = service.send_message(&id, "Hello!").await?;
//!     println!("{}", outcome.response);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The context window is not the source of truth — the history store
//! is. A window may be empty for a conversation with persisted history
//! (after a restart) until `ChatService::switch_to` replays it. Store
//! failures are surfaced, never swallowed: a failed write degrades
//! durability while the live conversation keeps running.

pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod store;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::chat::{ChatService, TurnOutcome};
    pub use crate::config::{
        ColloquyConfig, ContextConfig, LlmConfig, ProviderKind, StoreConfig, StoreMode,
    };
    pub use crate::conversation::{ContextBuffer, Exchange, Session, SessionRegistry};
    pub use crate::error::{ColloquyError, Result};
    pub use crate::llm::{
        GenerationConfig, LlmProvider, ModelInfo, OllamaProvider, StubProvider, build_provider,
    };
    pub use crate::store::{
        ConversationSummary, HistoryStore, MemoryHistoryStore, SurrealHistoryStore, Turn,
    };
}
