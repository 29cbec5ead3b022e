//! HomeOps LLM Library
//!
//! Provider abstraction for completion calls. The copilot treats the
//! completion provider as an external collaborator: this crate defines
//! the client trait, a structured-output helper for schema-constrained
//! generation, and the Ollama implementation.

pub mod client;
pub mod factory;
pub mod providers;
pub mod structured;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use structured::complete_structured;
