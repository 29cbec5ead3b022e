//! HomeOps Retrieval Library
//!
//! Retrieval pipeline over the household document corpus:
//! - Passage store abstraction wrapping a persisted embedding index
//!   (LanceDB implementation plus an in-memory store for tests)
//! - Embedding provider abstraction (Ollama, deterministic mock)
//! - Device-type detection from query keywords
//! - The retrieval orchestrator: metadata filtering, hybrid fallback,
//!   optional re-ranking, and the evidence-sufficiency gate
//! - Citation resolution from generated answers back to retrieved passages
//! - Single-shot question answering (`ask`)

pub mod ask;
pub mod citations;
pub mod detect;
pub mod embeddings;
pub mod lance;
pub mod orchestrator;
pub mod rerank;
pub mod store;
pub mod types;

pub use ask::{answer, format_passages_as_context, AskOutcome};
pub use citations::{resolve_citations, Citation, CitationMatch, RawCitation, UnresolvedReason};
pub use detect::detect_device_types;
pub use orchestrator::{Retriever, RetrieveRequest};
pub use store::{MemoryPassageStore, PassageStore};
pub use types::{Passage, PassageRecord, RetrievalResult};
