//! Embedding providers for query and passage vectorization.
//!
//! The primary index and the optional re-rank stage each use a provider;
//! the mock provider keeps pipeline tests deterministic and offline.

pub mod mock;
pub mod ollama;

use homeops_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Retrieval("No embedding returned".to_string()))
    }
}

/// Create an embedding provider by name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama" or "mock")
/// * `model` - Embedding model identifier
/// * `dimensions` - Expected embedding dimension
/// * `endpoint` - Optional endpoint override (Ollama only)
pub fn create_provider(
    provider: &str,
    model: &str,
    dimensions: usize,
    endpoint: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match provider.to_lowercase().as_str() {
        "mock" => Ok(Arc::new(mock::MockProvider::new(dimensions))),
        "ollama" => Ok(Arc::new(ollama::OllamaEmbeddingProvider::new(
            model,
            dimensions,
            endpoint.unwrap_or("http://localhost:11434"),
        ))),
        _ => Err(AppError::Retrieval(format!(
            "Unknown embedding provider: '{}'. Supported providers: mock, ollama",
            provider
        ))),
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
