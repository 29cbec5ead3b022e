//! Secondary-model re-ranking of retrieved passages.
//!
//! Re-ranking is a pure quality optimization layered over the primary
//! index order: passages are re-scored with a secondary embedding model
//! and reordered. Failure or disablement of this stage never changes
//! which passages were retrieved or whether retrieval was sufficient.

use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::types::Passage;
use std::sync::Arc;

/// Re-ranks passages with a secondary embedding model.
pub struct Reranker {
    provider: Arc<dyn EmbeddingProvider>,
}

impl Reranker {
    /// Create a reranker over the given provider.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    /// Re-score passages against the query and return the top `top_n`.
    ///
    /// Passages keep their primary index scores; only the order changes.
    /// On provider failure the original order is returned truncated —
    /// degraded quality, never a degraded result set.
    pub async fn rerank(&self, query: &str, passages: Vec<Passage>, top_n: usize) -> Vec<Passage> {
        if passages.len() <= 1 {
            let mut passages = passages;
            passages.truncate(top_n);
            return passages;
        }

        let mut texts: Vec<String> = Vec::with_capacity(passages.len() + 1);
        texts.push(query.to_string());
        texts.extend(passages.iter().map(|p| p.text.clone()));

        let embeddings = match self.provider.embed_batch(&texts).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                tracing::warn!(
                    "Re-rank scoring failed ({}), keeping primary index order",
                    e
                );
                let mut passages = passages;
                passages.truncate(top_n);
                return passages;
            }
        };

        let (query_embedding, passage_embeddings) = match embeddings.split_first() {
            Some(split) => split,
            None => {
                tracing::warn!("Re-rank returned no embeddings, keeping primary index order");
                let mut passages = passages;
                passages.truncate(top_n);
                return passages;
            }
        };

        let mut scored: Vec<(Passage, f32)> = passages
            .into_iter()
            .zip(passage_embeddings.iter())
            .map(|(p, emb)| {
                let score = cosine_similarity(query_embedding, emb);
                (p, score)
            })
            .collect();

        // Stable sort: equal re-rank scores keep the primary index order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_n)
            .map(|(passage, _)| passage)
            .collect()
    }
}
