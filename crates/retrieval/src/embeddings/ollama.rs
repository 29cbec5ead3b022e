//! Ollama embedding provider.
//!
//! Uses the /api/embed endpoint for batch embedding generation.

use super::EmbeddingProvider;
use homeops_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Ollama embed API request.
#[derive(Debug, Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
}

/// Ollama embed API response.
#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding provider backed by a local Ollama instance.
#[derive(Debug)]
pub struct OllamaEmbeddingProvider {
    model: String,
    dimensions: usize,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for the given model and endpoint.
    pub fn new(model: impl Into<String>, dimensions: usize, base_url: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            dimensions,
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            "Embedding {} texts with Ollama model '{}'",
            texts.len(),
            self.model
        );

        let request = OllamaEmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send embed request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Ollama embed API error ({}): {}",
                status, error_text
            )));
        }

        let embed_response: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama embed response: {}", e)))?;

        if embed_response.embeddings.len() != texts.len() {
            return Err(AppError::Llm(format!(
                "Ollama returned {} embeddings for {} texts",
                embed_response.embeddings.len(),
                texts.len()
            )));
        }

        for embedding in &embed_response.embeddings {
            if embedding.len() != self.dimensions {
                return Err(AppError::Llm(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.dimensions,
                    embedding.len()
                )));
            }
        }

        Ok(embed_response.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_identity() {
        let provider = OllamaEmbeddingProvider::new("nomic-embed-text", 768, "http://localhost:11434");
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
        assert_eq!(provider.dimensions(), 768);
    }

    #[tokio::test]
    async fn test_empty_batch_short_circuits() {
        let provider = OllamaEmbeddingProvider::new("nomic-embed-text", 768, "http://localhost:1");
        let result = provider.embed_batch(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
