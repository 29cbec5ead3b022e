//! Passage store abstraction.
//!
//! Defines the provider-agnostic interface over the persisted embedding
//! index, plus an in-memory implementation used by tests and small corpora.
//! The index must support similarity search with an optional device-type
//! metadata-equality filter; everything else in the retrieval pipeline is
//! built on top of that contract.

use crate::embeddings::cosine_similarity;
use crate::types::{Passage, PassageRecord};
use homeops_core::AppResult;
use std::collections::HashSet;
use std::sync::RwLock;

/// Trait for passage index backends.
#[async_trait::async_trait]
pub trait PassageStore: Send + Sync {
    /// Insert or update passages in the index.
    ///
    /// Records must carry embeddings; the store does not embed.
    async fn upsert_passages(&self, records: &[PassageRecord]) -> AppResult<()>;

    /// Search for the top-k passages most similar to the query embedding.
    ///
    /// `device_filter` restricts results to passages whose device_type is
    /// in the given set (OR across values). Results are ordered by
    /// descending score; ties keep insertion order.
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        device_filter: Option<&[String]>,
    ) -> AppResult<Vec<Passage>>;

    /// Get statistics about the index.
    ///
    /// Returns (documents_count, passages_count).
    async fn stats(&self) -> AppResult<(u32, u32)>;

    /// Reset the index, removing all passages.
    async fn reset(&self) -> AppResult<()>;
}

/// In-memory passage store.
///
/// Brute-force cosine search over stored embeddings. Used in tests and
/// workable for the small corpora of a single household.
#[derive(Default)]
pub struct MemoryPassageStore {
    records: RwLock<Vec<PassageRecord>>,
}

impl MemoryPassageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PassageStore for MemoryPassageStore {
    async fn upsert_passages(&self, records: &[PassageRecord]) -> AppResult<()> {
        let mut store = self.records.write().unwrap();
        for record in records {
            // Replace on matching id, append otherwise
            if let Some(existing) = store.iter_mut().find(|r| r.id == record.id) {
                *existing = record.clone();
            } else {
                store.push(record.clone());
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        device_filter: Option<&[String]>,
    ) -> AppResult<Vec<Passage>> {
        let store = self.records.read().unwrap();

        let mut scored: Vec<Passage> = store
            .iter()
            .filter(|record| match device_filter {
                Some(devices) => record
                    .device_type
                    .as_deref()
                    .map(|dt| devices.iter().any(|d| d == dt))
                    .unwrap_or(false),
                None => true,
            })
            .filter_map(|record| {
                record
                    .embedding
                    .as_ref()
                    .map(|emb| record.to_passage(cosine_similarity(query_embedding, emb)))
            })
            .collect();

        // Stable sort keeps insertion order for equal scores
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn stats(&self) -> AppResult<(u32, u32)> {
        let store = self.records.read().unwrap();
        let documents: HashSet<&str> = store.iter().map(|r| r.source_doc.as_str()).collect();
        Ok((documents.len() as u32, store.len() as u32))
    }

    async fn reset(&self) -> AppResult<()> {
        self.records.write().unwrap().clear();
        Ok(())
    }
}
