//! Error types for the HomeOps copilot.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, LLM provider, retrieval, safety
//! classification, session handling, and workflow execution.
//!
//! Safety stops and insufficient-evidence results are NOT errors. They are
//! business outcomes and are represented as variants of the normal response
//! types so clients can render them without a separate error path.

use thiserror::Error;

/// Unified error type for the HomeOps copilot.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic — errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (completion or embedding calls)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Retrieval and vector index errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Risk classification errors
    #[error("Safety error: {0}")]
    Safety(String),

    /// A workflow call referenced a session that does not exist
    /// (or was evicted after completion or TTL expiry)
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A workflow call arrived for a session in the wrong phase,
    /// e.g. submitting answers to a completed or safety-stopped session
    #[error("Session {session_id} is in phase {actual}, expected {expected}")]
    InvalidSessionPhase {
        session_id: String,
        expected: String,
        actual: String,
    },

    /// Workflow execution errors
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_phase_message_names_phases() {
        let err = AppError::InvalidSessionPhase {
            session_id: "abc".to_string(),
            expected: "awaiting_followup".to_string(),
            actual: "complete".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("awaiting_followup"));
        assert!(msg.contains("complete"));
    }

    #[test]
    fn test_session_not_found_message() {
        let err = AppError::SessionNotFound("missing-id".to_string());
        assert!(err.to_string().contains("missing-id"));
    }
}
