//! Retrieval orchestration.
//!
//! Sequences one retrieval call end to end: device-type detection,
//! metadata filtering, hybrid fallback when the filtered result is weak,
//! optional re-ranking, and the evidence-sufficiency gate. The design
//! principle throughout: a weak signal is surfaced, never passed silently
//! to generation.

use crate::detect::detect_device_types;
use crate::embeddings::EmbeddingProvider;
use crate::rerank::Reranker;
use crate::store::PassageStore;
use crate::types::{Passage, RetrievalResult};
use homeops_core::config::RetrievalSettings;
use homeops_core::AppResult;
use std::sync::Arc;

/// One retrieval request.
#[derive(Debug, Clone, Default)]
pub struct RetrieveRequest {
    /// The search query
    pub query: String,

    /// Override for the number of passages to return
    pub top_k: Option<usize>,

    /// Explicit device-type filter; when set, keyword detection is skipped
    pub device_types: Option<Vec<String>>,

    /// Device types installed per the house profile; intersected with
    /// detected candidates when auto-filtering
    pub profile_device_types: Option<Vec<String>>,

    /// Detect device types from query keywords when no explicit filter
    pub auto_filter: bool,
}

impl RetrieveRequest {
    /// Auto-filtering request for a plain question.
    pub fn auto(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            auto_filter: true,
            ..Self::default()
        }
    }

    /// Request with an explicit device-type filter.
    pub fn filtered(query: impl Into<String>, device_types: Vec<String>) -> Self {
        Self {
            query: query.into(),
            device_types: Some(device_types),
            ..Self::default()
        }
    }

    /// Set the top-k override.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Set the profile device types for filter intersection.
    pub fn with_profile(mut self, profile_device_types: Vec<String>) -> Self {
        self.profile_device_types = Some(profile_device_types);
        self
    }
}

/// The retrieval orchestrator.
pub struct Retriever {
    store: Arc<dyn PassageStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Option<Reranker>,
    settings: RetrievalSettings,
}

impl Retriever {
    /// Create a retriever over a passage store and embedding provider.
    pub fn new(
        store: Arc<dyn PassageStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            store,
            embedder,
            reranker: None,
            settings,
        }
    }

    /// Enable re-ranking with the given reranker.
    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Retrieve passages for a question, auto-detecting device filters.
    pub async fn retrieve(
        &self,
        query: &str,
        profile_device_types: Option<Vec<String>>,
    ) -> AppResult<RetrievalResult> {
        let mut request = RetrieveRequest::auto(query);
        request.profile_device_types = profile_device_types;
        self.retrieve_with(request).await
    }

    /// Retrieve passages according to an explicit request.
    pub async fn retrieve_with(&self, request: RetrieveRequest) -> AppResult<RetrievalResult> {
        let top_k = request.top_k.unwrap_or(self.settings.top_k);

        // Over-fetch for the re-rank stage; the sufficiency gate below
        // only ever looks at the top score, which over-fetching cannot change.
        let fetch_k = if self.reranker.is_some() {
            top_k * 3
        } else {
            top_k
        };

        let query_embedding = self.embedder.embed(&request.query).await?;

        let candidates = self.resolve_filter(&request);

        let (passages, filter_applied) = match candidates {
            Some(filter) => {
                let filtered = self
                    .store
                    .search(&query_embedding, fetch_k, Some(&filter))
                    .await?;

                let filtered_top = top_score(&filtered);
                if filtered_top < self.settings.filtered_fallback_score {
                    // Filtering must never starve retrieval of relevant
                    // passages that exist outside the filter
                    tracing::info!(
                        "Filtered top score {:.3} below fallback floor {:.3}, re-issuing unfiltered",
                        filtered_top,
                        self.settings.filtered_fallback_score
                    );
                    let unfiltered = self.store.search(&query_embedding, fetch_k, None).await?;
                    (unfiltered, None)
                } else {
                    (filtered, Some(filter))
                }
            }
            None => {
                let unfiltered = self.store.search(&query_embedding, fetch_k, None).await?;
                (unfiltered, None)
            }
        };

        // Sufficiency is judged on primary index scores, before any
        // re-ranking: re-rank failure or disablement must not change it.
        let best = top_score(&passages);
        if best < self.settings.min_relevance_score {
            tracing::info!(
                "Top score {:.3} below sufficiency floor {:.3}, returning insufficient evidence",
                best,
                self.settings.min_relevance_score
            );
            return Ok(RetrievalResult::insufficient(filter_applied));
        }

        let passages = match &self.reranker {
            Some(reranker) => reranker.rerank(&request.query, passages, top_k).await,
            None => {
                let mut passages = passages;
                passages.truncate(top_k);
                passages
            }
        };

        tracing::info!(
            "Retrieved {} passages (top score {:.3}, filter: {:?})",
            passages.len(),
            best,
            filter_applied
        );

        Ok(RetrievalResult {
            passages,
            sufficient: true,
            filter_applied,
        })
    }

    /// Resolve the device filter for a request.
    ///
    /// Explicit filter wins; otherwise keyword detection, intersected with
    /// the profile's installed systems. An empty intersection falls back to
    /// the detected set — the user may know their systems better than the
    /// profile does.
    fn resolve_filter(&self, request: &RetrieveRequest) -> Option<Vec<String>> {
        if let Some(explicit) = &request.device_types {
            if explicit.is_empty() {
                return None;
            }
            return Some(explicit.clone());
        }

        if !request.auto_filter {
            return None;
        }

        let detected = detect_device_types(&request.query);
        if detected.is_empty() {
            return None;
        }

        if let Some(profile) = &request.profile_device_types {
            let intersection: Vec<String> = detected
                .iter()
                .filter(|d| profile.contains(d))
                .cloned()
                .collect();
            if !intersection.is_empty() {
                return Some(intersection);
            }
        }

        Some(detected)
    }
}

fn top_score(passages: &[Passage]) -> f32 {
    passages.first().map(|p| p.score).unwrap_or(0.0)
}
