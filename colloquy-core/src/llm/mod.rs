//! Inference provider abstraction
//!
//! The conversation core treats inference as an opaque capability:
//! a rendered prompt string goes in, a response string comes out. The
//! call may be slow and may fail; it is never covered by a store lock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ColloquyError, Result};

mod ollama;

pub use ollama::OllamaProvider;

/// Generation parameters for LLM calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Temperature for generation (0.0-2.0, default: 0.8)
    pub temperature: f32,

    /// Maximum tokens to generate (default: 512)
    pub max_tokens: usize,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            max_tokens: 512,
            stop_sequences: Vec::new(),
        }
    }
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_stop_sequence(mut self, stop: impl Into<String>) -> Self {
        self.stop_sequences.push(stop.into());
        self
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Trait for inference provider implementations.
///
/// Implementors turn a fully rendered prompt into a response. The core
/// awaits the call without holding any store or registry-map lock, so a
/// slow model never blocks other conversations or history queries.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

/// Stub provider for deployments without a configured model.
///
/// Always errors; lets the rest of the system (history listing, replay,
/// erasure) keep working when no model is available.
pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(ColloquyError::Configuration(
            "LLM provider not configured. Implement the LlmProvider trait for your model"
                .to_string(),
        ))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "stub".to_string(),
            model_name: "none".to_string(),
        }
    }
}

/// Build a provider from configuration.
pub fn build_provider(config: &crate::config::LlmConfig) -> std::sync::Arc<dyn LlmProvider> {
    use crate::config::ProviderKind;

    match config.provider {
        ProviderKind::Ollama => std::sync::Arc::new(OllamaProvider::new(
            config.model.clone(),
            config.base_url.clone(),
            config.generation.clone(),
        )),
        ProviderKind::Stub => std::sync::Arc::new(StubProvider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_builder() {
        let config = GenerationConfig::new()
            .with_temperature(1.5)
            .with_max_tokens(1000)
            .with_stop_sequence("User:");

        assert_eq!(config.temperature, 1.5);
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(config.stop_sequences, vec!["User:".to_string()]);
    }

    #[test]
    fn test_temperature_clamping() {
        let config = GenerationConfig::new().with_temperature(5.0);
        assert_eq!(config.temperature, 2.0);

        let config = GenerationConfig::new().with_temperature(-1.0);
        assert_eq!(config.temperature, 0.0);
    }

    #[tokio::test]
    async fn test_stub_provider_errors() {
        let provider = StubProvider;
        let result = provider.generate("test").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_build_provider_stub() {
        let config = crate::config::LlmConfig {
            provider: crate::config::ProviderKind::Stub,
            ..Default::default()
        };
        let provider = build_provider(&config);
        assert_eq!(provider.model_info().provider, "stub");
    }
}
