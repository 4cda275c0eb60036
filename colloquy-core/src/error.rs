//! Error types for Colloquy operations

/// Result type for Colloquy operations
pub type Result<T> = std::result::Result<T, ColloquyError>;

/// Error types for the Colloquy conversation core
#[derive(Debug, thiserror::Error)]
pub enum ColloquyError {
    /// User input was empty or malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Durable store unreachable at call time
    #[error("History store unavailable: {0}")]
    StoreUnavailable(String),

    /// Store reachable but the specific write failed
    #[error("History write failed: {0}")]
    WriteFailed(String),

    /// Inference backend error, propagated unchanged
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ColloquyError {
    /// Whether the error only degrades history durability.
    ///
    /// Persistence failures never make the live conversation unavailable;
    /// callers keep serving from the context window and surface a warning.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            ColloquyError::StoreUnavailable(_) | ColloquyError::WriteFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_degradable() {
        assert!(ColloquyError::StoreUnavailable("down".into()).is_degradable());
        assert!(ColloquyError::WriteFailed("disk".into()).is_degradable());
        assert!(!ColloquyError::InvalidInput("empty".into()).is_degradable());
        assert!(!ColloquyError::Inference("timeout".into()).is_degradable());
    }

    #[test]
    fn test_error_display() {
        let err = ColloquyError::StoreUnavailable("connection refused".into());
        assert_eq!(
            err.to_string(),
            "History store unavailable: connection refused"
        );
    }
}
