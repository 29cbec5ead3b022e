//! Command handlers for the HomeOps CLI.

pub mod ask;
pub mod index;
pub mod parts;
pub mod plan;
pub mod troubleshoot;

pub use ask::AskCommand;
pub use index::IndexCommand;
pub use parts::PartsCommand;
pub use plan::PlanCommand;
pub use troubleshoot::TroubleshootCommand;

use homeops_core::{AppConfig, AppResult};
use homeops_llm::LlmClient;
use homeops_retrieval::embeddings::{create_provider, EmbeddingProvider};
use homeops_retrieval::lance::LancePassageStore;
use homeops_retrieval::rerank::Reranker;
use homeops_retrieval::Retriever;
use homeops_workflows::HouseProfile;
use std::path::PathBuf;
use std::sync::Arc;

/// Open the persisted passage index and build a retriever from config.
pub(crate) async fn build_retriever(config: &AppConfig) -> AppResult<Arc<Retriever>> {
    let store = LancePassageStore::new(
        &config.index_path(),
        "passages",
        config.retrieval.embedding_dim,
    )
    .await?;

    let embedder = build_embedder(config)?;

    let mut retriever = Retriever::new(Arc::new(store), embedder, config.retrieval.clone());

    if config.retrieval.rerank_enabled {
        let rerank_provider = create_provider(
            &config.provider,
            &config.retrieval.rerank_model,
            config.retrieval.embedding_dim,
            config.endpoint.as_deref(),
        )?;
        retriever = retriever.with_reranker(Reranker::new(rerank_provider));
    }

    Ok(Arc::new(retriever))
}

/// Build the primary embedding provider from config.
pub(crate) fn build_embedder(config: &AppConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    create_provider(
        &config.provider,
        &config.retrieval.embedding_model,
        config.retrieval.embedding_dim,
        config.endpoint.as_deref(),
    )
}

/// Build the completion client from config.
pub(crate) fn build_llm(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    homeops_llm::create_client(
        &config.provider,
        config.endpoint.as_deref(),
        config.api_key.as_deref(),
    )
}

/// Load the house profile, if one exists at the given or default path.
pub(crate) fn load_profile(
    config: &AppConfig,
    path: Option<&PathBuf>,
) -> AppResult<Option<HouseProfile>> {
    let profile_path = path.cloned().unwrap_or_else(|| config.house_profile_path());

    if !profile_path.exists() {
        tracing::debug!("No house profile at {:?}", profile_path);
        return Ok(None);
    }

    let profile = HouseProfile::load(&profile_path)?;
    tracing::debug!(
        "Loaded house profile '{}' with {} systems",
        profile.name,
        profile.systems.len()
    );
    Ok(Some(profile))
}
