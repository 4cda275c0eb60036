//! Per-conversation session registry
//!
//! Maps `conversation_id -> ContextBuffer`, creating entries on first
//! use. Each entry is serialized independently: two turns of the same
//! conversation queue on its lock, while different conversations
//! proceed concurrently. A single buffer shared across callers would
//! leak one conversation's context into another's prompt.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use super::buffer::ContextBuffer;

/// A registry entry: one conversation's window plus its idle clock.
#[derive(Debug)]
pub struct Session {
    /// The conversation's context window
    pub buffer: ContextBuffer,
    last_used: Instant,
}

impl Session {
    fn new(buffer: ContextBuffer) -> Self {
        Self {
            buffer,
            last_used: Instant::now(),
        }
    }

    /// Mark the session as just used.
    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    /// Time since the session was last used.
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }
}

/// Registry of active conversation sessions.
pub struct SessionRegistry {
    max_turns: usize,
    system_preamble: Option<String>,
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionRegistry {
    /// Create a registry whose buffers use the given cap and preamble.
    pub fn new(max_turns: usize, system_preamble: Option<String>) -> Self {
        Self {
            max_turns,
            system_preamble,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Get the session for a conversation, creating it on first use.
    pub async fn acquire(&self, conversation_id: &str) -> Arc<Mutex<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(conversation_id) {
                return session.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                let buffer = match &self.system_preamble {
                    Some(preamble) => ContextBuffer::with_preamble(self.max_turns, preamble),
                    None => ContextBuffer::new(self.max_turns),
                };
                Arc::new(Mutex::new(Session::new(buffer)))
            })
            .clone()
    }

    /// Drop a conversation's window. Returns whether it existed.
    ///
    /// Persisted history is untouched; the window is rebuilt from the
    /// store on the next replay.
    pub async fn reset(&self, conversation_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(conversation_id).is_some()
    }

    /// Drop every window.
    pub async fn reset_all(&self) {
        let mut sessions = self.sessions.write().await;
        sessions.clear();
    }

    /// Evict sessions idle for longer than `max_idle`.
    ///
    /// A session whose lock is currently held is in use and is skipped.
    /// Returns the number of sessions evicted.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(guard) => guard.idle_for() <= max_idle,
            Err(_) => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted idle conversation sessions");
        }
        evicted
    }

    /// Number of active sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Check if the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_creates_on_first_use() {
        let registry = SessionRegistry::new(4, None);
        assert!(registry.is_empty().await);

        let session = registry.acquire("conv-1").await;
        session.lock().await.buffer.add_user_message("hello");
        assert_eq!(registry.len().await, 1);

        // Same id returns the same entry
        let again = registry.acquire("conv-1").await;
        assert_eq!(again.lock().await.buffer.exchanges().len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = SessionRegistry::new(4, None);

        let a = registry.acquire("a").await;
        let b = registry.acquire("b").await;

        a.lock().await.buffer.add_user_message("for a");
        assert!(b.lock().await.buffer.is_empty());
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_preamble_applied_to_new_sessions() {
        let registry = SessionRegistry::new(4, Some("Be brief.".to_string()));
        let session = registry.acquire("conv").await;
        assert_eq!(
            session.lock().await.buffer.system_preamble(),
            Some("Be brief.")
        );
    }

    #[tokio::test]
    async fn test_reset_drops_window_only() {
        let registry = SessionRegistry::new(4, None);
        let session = registry.acquire("conv").await;
        session.lock().await.buffer.add_user_message("hello");

        assert!(registry.reset("conv").await);
        assert!(!registry.reset("conv").await);

        let fresh = registry.acquire("conv").await;
        assert!(fresh.lock().await.buffer.is_empty());
    }

    #[tokio::test]
    async fn test_evict_idle_skips_busy_sessions() {
        let registry = SessionRegistry::new(4, None);
        let busy = registry.acquire("busy").await;
        registry.acquire("idle").await;

        let _guard = busy.lock().await;
        let evicted = registry.evict_idle(Duration::ZERO).await;
        assert_eq!(evicted, 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_recent() {
        let registry = SessionRegistry::new(4, None);
        registry.acquire("recent").await;
        let evicted = registry.evict_idle(Duration::from_secs(3600)).await;
        assert_eq!(evicted, 0);
        assert_eq!(registry.len().await, 1);
    }
}
