//! Index command handler.
//!
//! Loads pre-extracted passages into the persisted index. Text extraction
//! from the original documents (PDF parsing etc.) happens upstream; this
//! command takes a JSONL file of passages with document metadata, embeds
//! them, and upserts them.

use clap::{Args, Subcommand};
use homeops_core::{AppConfig, AppError, AppResult};
use homeops_retrieval::lance::LancePassageStore;
use homeops_retrieval::{PassageRecord, PassageStore};
use std::io::BufRead;
use std::path::PathBuf;

/// Batch size for embedding calls.
const EMBED_BATCH_SIZE: usize = 32;

/// Manage the passage index
#[derive(Args, Debug)]
pub struct IndexCommand {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Load passages from a JSONL file into the index
    Load(IndexLoadCommand),
    /// Show index statistics
    Stats(IndexStatsCommand),
    /// Remove all passages from the index
    Reset(IndexResetCommand),
}

/// Load passages from a JSONL file into the index
#[derive(Args, Debug)]
pub struct IndexLoadCommand {
    /// Path to a JSONL file of passages (one JSON object per line with
    /// text, source_doc, and optional device metadata)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Reset the index before loading
    #[arg(long)]
    pub reset: bool,
}

impl IndexLoadCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = LancePassageStore::new(
            &config.index_path(),
            "passages",
            config.retrieval.embedding_dim,
        )
        .await?;

        if self.reset {
            store.reset().await?;
        }

        let mut records = read_passages(&self.file)?;
        if records.is_empty() {
            println!("No passages found in {:?}", self.file);
            return Ok(());
        }

        let embedder = super::build_embedder(config)?;

        tracing::info!(
            "Embedding {} passages with model '{}'",
            records.len(),
            config.retrieval.embedding_model
        );

        for chunk in records.chunks_mut(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = chunk.iter().map(|r| r.text.clone()).collect();
            let embeddings = embedder.embed_batch(&texts).await?;

            for (record, embedding) in chunk.iter_mut().zip(embeddings) {
                record.embedding = Some(embedding);
            }
        }

        store.upsert_passages(&records).await?;

        println!("Indexed {} passages from {:?}", records.len(), self.file);
        Ok(())
    }
}

/// Show index statistics
#[derive(Args, Debug)]
pub struct IndexStatsCommand {}

impl IndexStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = LancePassageStore::new(
            &config.index_path(),
            "passages",
            config.retrieval.embedding_dim,
        )
        .await?;

        let (_, passages) = store.stats().await?;
        println!("Index: {:?}", config.index_path());
        println!("Passages: {}", passages);
        Ok(())
    }
}

/// Remove all passages from the index
#[derive(Args, Debug)]
pub struct IndexResetCommand {}

impl IndexResetCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = LancePassageStore::new(
            &config.index_path(),
            "passages",
            config.retrieval.embedding_dim,
        )
        .await?;

        store.reset().await?;
        println!("Index reset.");
        Ok(())
    }
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            IndexAction::Load(cmd) => cmd.execute(config).await,
            IndexAction::Stats(cmd) => cmd.execute(config).await,
            IndexAction::Reset(cmd) => cmd.execute(config).await,
        }
    }
}

/// Read passage records from a JSONL file.
///
/// Lines without an id get one assigned from the source document name
/// and position.
fn read_passages(path: &PathBuf) -> AppResult<Vec<PassageRecord>> {
    let file = std::fs::File::open(path)
        .map_err(|e| AppError::Retrieval(format!("Failed to open {:?}: {}", path, e)))?;
    let reader = std::io::BufReader::new(file);

    #[derive(serde::Deserialize)]
    struct PassageLine {
        #[serde(default)]
        id: Option<String>,
        text: String,
        source_doc: String,
        #[serde(default)]
        section: Option<String>,
        #[serde(default)]
        device_type: Option<String>,
        #[serde(default)]
        device_name: Option<String>,
        #[serde(default)]
        manufacturer: Option<String>,
    }

    let mut records = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line
            .map_err(|e| AppError::Retrieval(format!("Failed to read line {}: {}", line_num + 1, e)))?;

        if line.trim().is_empty() {
            continue;
        }

        let parsed: PassageLine = serde_json::from_str(&line).map_err(|e| {
            AppError::Retrieval(format!(
                "Failed to parse line {} in {:?}: {}",
                line_num + 1,
                path,
                e
            ))
        })?;

        records.push(PassageRecord {
            id: parsed
                .id
                .unwrap_or_else(|| format!("{}#{}", parsed.source_doc, line_num)),
            text: parsed.text,
            source_doc: parsed.source_doc,
            section: parsed.section,
            device_type: parsed.device_type.map(|d| d.to_lowercase().replace(' ', "_")),
            device_name: parsed.device_name,
            manufacturer: parsed.manufacturer,
            embedding: None,
        });
    }

    Ok(records)
}
