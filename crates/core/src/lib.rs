//! HomeOps Core Library
//!
//! This crate provides the foundational utilities for the HomeOps copilot:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - Shared risk-level type

pub mod config;
pub mod error;
pub mod logging;
pub mod risk;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use risk::RiskLevel;
