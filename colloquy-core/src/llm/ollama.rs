//! Ollama inference provider (local model over HTTP)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ColloquyError, Result};
use crate::llm::{GenerationConfig, LlmProvider, ModelInfo};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama provider (local, free, runs on your machine).
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    base_url: String,
    generation: GenerationConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider.
    ///
    /// # Arguments
    ///
    /// * `model` - Model name (e.g., "qwen3:14b")
    /// * `base_url` - Base URL for the Ollama API (defaults to "http://localhost:11434")
    /// * `generation` - Generation parameters applied to every call
    pub fn new(
        model: impl Into<String>,
        base_url: Option<impl Into<String>>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            base_url: base_url
                .map(|u| u.into())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            generation,
        }
    }

    /// Create from environment variables.
    ///
    /// Reads from:
    /// - `OLLAMA_MODEL` - Model name (optional, defaults to "qwen3:14b")
    /// - `OLLAMA_BASE_URL` - Base URL (optional, defaults to "http://localhost:11434")
    pub fn from_env(model: Option<impl Into<String>>) -> Self {
        let model = model
            .map(|m| m.into())
            .or_else(|| std::env::var("OLLAMA_MODEL").ok())
            .unwrap_or_else(|| "qwen3:14b".to_string());

        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Self::new(model, Some(base_url), GenerationConfig::default())
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    #[allow(dead_code)]
    done: bool,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: self.generation.temperature,
                num_predict: self.generation.max_tokens,
                stop: if self.generation.stop_sequences.is_empty() {
                    None
                } else {
                    Some(self.generation.stop_sequences.clone())
                },
            },
        };

        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ColloquyError::Inference(format!(
                    "Failed to send request to Ollama: {}. Make sure Ollama is running.",
                    e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ColloquyError::Inference(format!(
                "Ollama API error ({}): {}",
                status, text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ColloquyError::Inference(format!("Failed to read Ollama response: {}", e)))?;

        let parsed: OllamaResponse = serde_json::from_str(&body).map_err(|e| {
            ColloquyError::Inference(format!("Failed to parse Ollama response: {}", e))
        })?;

        Ok(parsed.response.trim().to_string())
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "ollama".to_string(),
            model_name: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider =
            OllamaProvider::new("qwen3:14b", None::<String>, GenerationConfig::default());
        assert_eq!(provider.model(), "qwen3:14b");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_model_info() {
        let provider =
            OllamaProvider::new("llama3:8b", None::<String>, GenerationConfig::default());
        let info = provider.model_info();
        assert_eq!(info.provider, "ollama");
        assert_eq!(info.model_name, "llama3:8b");
    }

    #[test]
    fn test_request_serialization_omits_empty_stop() {
        let request = OllamaRequest {
            model: "m".to_string(),
            prompt: "p".to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: 0.8,
                num_predict: 512,
                stop: None,
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("stop"));
    }
}
