//! Bounded context window for prompt construction

use serde::{Deserialize, Serialize};

use crate::error::{ColloquyError, Result};

/// One exchange in the window (user message, possibly awaiting its reply)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    /// User message
    pub user_text: String,
    /// Assistant response (None until the reply lands)
    pub assistant_text: Option<String>,
}

impl Exchange {
    fn new(user_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            assistant_text: None,
        }
    }

    /// Check if the exchange has its assistant reply
    pub fn is_complete(&self) -> bool {
        self.assistant_text.is_some()
    }
}

/// In-process, per-conversation context window.
///
/// Holds the recent exchanges used to build the next prompt. Not the
/// source of truth — the history store is — and may be empty for a
/// conversation with persisted history until explicitly replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBuffer {
    /// System preamble prepended to every prompt
    system_preamble: Option<String>,
    /// Maximum complete exchanges held
    max_turns: usize,
    /// Window contents, oldest first
    exchanges: Vec<Exchange>,
}

impl ContextBuffer {
    /// Create a new buffer with the given window cap.
    pub fn new(max_turns: usize) -> Self {
        Self {
            system_preamble: None,
            max_turns: max_turns.max(1),
            exchanges: Vec::new(),
        }
    }

    /// Create with a system preamble.
    pub fn with_preamble(max_turns: usize, preamble: impl Into<String>) -> Self {
        Self {
            system_preamble: Some(preamble.into()),
            max_turns: max_turns.max(1),
            exchanges: Vec::new(),
        }
    }

    /// Get the system preamble
    pub fn system_preamble(&self) -> Option<&str> {
        self.system_preamble.as_deref()
    }

    /// Get the window cap
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Get all exchanges, oldest first
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Number of complete exchanges held
    pub fn complete_count(&self) -> usize {
        self.exchanges.iter().filter(|e| e.is_complete()).count()
    }

    /// Build the model-ready prompt for `user_text` against the current window.
    ///
    /// Does not mutate the window; the new message is appended only once
    /// the reply arrives, via `add_user_message`/`add_assistant_message`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if `user_text` is empty after trimming whitespace.
    pub fn build_prompt(&self, user_text: &str) -> Result<String> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(ColloquyError::InvalidInput(
                "user message is empty".to_string(),
            ));
        }

        let mut prompt = String::new();

        if let Some(ref preamble) = self.system_preamble {
            prompt.push_str(preamble);
            prompt.push_str("\n\n");
        }

        for exchange in &self.exchanges {
            prompt.push_str("User: ");
            prompt.push_str(&exchange.user_text);
            prompt.push('\n');
            if let Some(ref reply) = exchange.assistant_text {
                prompt.push_str("Assistant: ");
                prompt.push_str(reply);
                prompt.push('\n');
            }
        }

        prompt.push_str("User: ");
        prompt.push_str(user_text);
        prompt.push_str("\nAssistant:");

        Ok(prompt)
    }

    /// Append a user message, starting a new exchange.
    ///
    /// Empty text is rejected; returns whether the message was added.
    pub fn add_user_message(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.trim().is_empty() {
            return false;
        }
        self.exchanges.push(Exchange::new(text.trim().to_string()));
        true
    }

    /// Append an assistant message, completing the newest exchange.
    ///
    /// Returns false if there is no open exchange or the text is empty.
    pub fn add_assistant_message(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.trim().is_empty() {
            return false;
        }
        if let Some(exchange) = self.exchanges.last_mut() {
            if !exchange.is_complete() {
                exchange.assistant_text = Some(text);
                return true;
            }
        }
        false
    }

    /// True when the number of complete exchanges meets or exceeds the cap.
    pub fn is_window_full(&self) -> bool {
        self.complete_count() >= self.max_turns
    }

    /// Keep only the most recent `keep_turns` complete exchanges.
    ///
    /// Oldest-first eviction; a no-op when `keep_turns` covers the current
    /// size. A trailing exchange still awaiting its reply is never evicted.
    pub fn trim(&mut self, keep_turns: usize) {
        let complete = self.complete_count();
        if keep_turns >= complete {
            return;
        }
        // Only the newest exchange can be incomplete, so the oldest
        // `complete - keep_turns` entries are all complete.
        let excess = complete - keep_turns;
        self.exchanges.drain(0..excess);
    }

    /// Empty the window. Never touches the history store.
    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    /// Check if the window is empty
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}
