//! Configuration types for the Colloquy conversation core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::llm::GenerationConfig;

/// Main configuration for Colloquy
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColloquyConfig {
    /// Context window configuration
    pub context: ContextConfig,

    /// History store configuration
    pub store: StoreConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,
}

/// Context window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum complete exchanges held in the window
    pub max_turns: usize,

    /// Exchanges kept after a trim (oldest-first eviction)
    pub keep_turns: usize,

    /// System preamble prepended to every prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_preamble: Option<String>,

    /// Idle duration after which a session's window may be evicted
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_turns: 6,
            keep_turns: 3,
            system_preamble: Some(
                "You are a helpful assistant. Answer the user's questions concisely.".to_string(),
            ),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// History store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store backend mode
    pub mode: StoreMode,

    /// Bounded connection timeout; `StoreUnavailable` is raised once it elapses
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: StoreMode::Embedded {
                data_dir: StoreMode::default_data_dir(),
            },
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Store backend mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreMode {
    /// In-process store, lost on exit (tests, ephemeral runs)
    Memory,

    /// Embedded SurrealDB with local RocksDB storage
    Embedded {
        /// Data directory for embedded storage
        data_dir: PathBuf,
    },

    /// Connect to a SurrealDB server over WebSocket
    Server {
        /// Server URL (e.g., "ws://localhost:8000")
        url: String,
    },
}

impl StoreMode {
    /// Default data directory for embedded storage.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("colloquy").join("history"))
            .unwrap_or_else(|| PathBuf::from("./data/history"))
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider kind
    pub provider: ProviderKind,

    /// Model name (e.g., "qwen3:14b")
    pub model: String,

    /// Base URL for the provider API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Generation parameters
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: "qwen3:14b".to_string(),
            base_url: None,
            generation: GenerationConfig::default(),
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local model served by Ollama
    Ollama,
    /// No provider configured; generation always errors
    Stub,
}

impl ColloquyConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (colloquy.toml or path from COLLOQUY_CONFIG_PATH)
    /// 3. Environment variable overrides (COLLOQUY_ prefix)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is invalid or fails validation.
    pub fn load() -> crate::error::Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(ColloquyConfig::default()))
            .merge(Toml::file("colloquy.toml"))
            .merge(Env::prefixed("COLLOQUY_").split("_"));

        if let Ok(path) = std::env::var("COLLOQUY_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: ColloquyConfig = figment.extract().map_err(|e| {
            crate::error::ColloquyError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: ColloquyConfig = Figment::from(Serialized::defaults(ColloquyConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                crate::error::ColloquyError::Configuration(format!(
                    "Failed to load configuration file: {}",
                    e
                ))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> crate::error::Result<()> {
        if self.context.max_turns == 0 {
            return Err(crate::error::ColloquyError::Configuration(
                "context.max_turns must be at least 1".to_string(),
            ));
        }

        if self.context.keep_turns > self.context.max_turns {
            return Err(crate::error::ColloquyError::Configuration(format!(
                "context.keep_turns ({}) must not exceed context.max_turns ({})",
                self.context.keep_turns, self.context.max_turns
            )));
        }

        if let StoreMode::Server { url } = &self.store.mode {
            if url.is_empty() {
                return Err(crate::error::ColloquyError::Configuration(
                    "store.mode.url must not be empty in server mode".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ColloquyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.context.max_turns, 6);
        assert_eq!(config.context.keep_turns, 3);
    }

    #[test]
    fn test_keep_turns_must_not_exceed_cap() {
        let mut config = ColloquyConfig::default();
        config.context.keep_turns = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cap_rejected() {
        let mut config = ColloquyConfig::default();
        config.context.max_turns = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_mode_roundtrip() {
        let mode = StoreMode::Server {
            url: "ws://localhost:8000".to_string(),
        };
        let json = serde_json::to_string(&mode).unwrap();
        assert!(json.contains("\"server\""));
        let parsed: StoreMode = serde_json::from_str(&json).unwrap();
        match parsed {
            StoreMode::Server { url } => assert_eq!(url, "ws://localhost:8000"),
            _ => panic!("wrong mode"),
        }
    }
}
