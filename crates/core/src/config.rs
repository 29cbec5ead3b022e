//! Configuration management for the HomeOps copilot.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.homeops/config.yaml)
//!
//! The configuration is workspace-centric, with most state stored in `.homeops/`
//! (vector index, house profile, config).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
///
/// This struct holds all global configuration options that affect
/// behavior across the retrieval pipeline and workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .homeops/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider (e.g., "ollama")
    pub provider: String,

    /// Completion model identifier
    pub model: String,

    /// Provider endpoint override
    pub endpoint: Option<String>,

    /// API key for the LLM provider, if it needs one
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Retrieval pipeline settings
    #[serde(default)]
    pub retrieval: RetrievalSettings,

    /// Generation settings
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Session store settings
    #[serde(default)]
    pub session: SessionSettings,
}

/// Retrieval pipeline settings.
///
/// These control top-k, the hybrid fallback, the sufficiency floor,
/// and the optional re-ranking stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Number of passages to retrieve per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum top score below which retrieval is treated as having
    /// found no relevant material (the sufficiency floor)
    #[serde(default = "default_min_relevance_score")]
    pub min_relevance_score: f32,

    /// If the top score of a device-filtered query falls below this,
    /// the query is re-issued unfiltered and that result is used instead
    #[serde(default = "default_filtered_fallback_score")]
    pub filtered_fallback_score: f32,

    /// Enable secondary-model re-ranking of retrieved passages
    #[serde(default)]
    pub rerank_enabled: bool,

    /// Embedding model used for re-rank scoring
    #[serde(default = "default_rerank_model")]
    pub rerank_model: String,

    /// Embedding model used for the primary index
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding vector dimension
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

fn default_top_k() -> usize {
    5
}

fn default_min_relevance_score() -> f32 {
    0.30
}

fn default_filtered_fallback_score() -> f32 {
    0.30
}

fn default_rerank_model() -> String {
    "mxbai-embed-large".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_dim() -> usize {
    768
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_relevance_score: default_min_relevance_score(),
            filtered_fallback_score: default_filtered_fallback_score(),
            rerank_enabled: false,
            rerank_model: default_rerank_model(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

/// Generation settings for LLM calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Sampling temperature (lower = more deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in a response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    4000
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Session store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Seconds before an in-flight troubleshooting session is evicted
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_session_ttl_secs() -> u64 {
    3600
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    provider: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    retrieval: Option<RetrievalSettings>,
    generation: Option<GenerationSettings>,
    session: Option<SessionSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            retrieval: RetrievalSettings::default(),
            generation: GenerationSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `HOMEOPS_WORKSPACE`: Override workspace path
    /// - `HOMEOPS_CONFIG`: Path to config file
    /// - `HOMEOPS_PROVIDER`: LLM provider
    /// - `HOMEOPS_MODEL`: Completion model identifier
    /// - `HOMEOPS_ENDPOINT`: Provider endpoint
    /// - `HOMEOPS_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("HOMEOPS_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("HOMEOPS_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        // Validate workspace exists
        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        // Load from YAML config file if it exists
        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.workspace.join(".homeops/config.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("HOMEOPS_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("HOMEOPS_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("HOMEOPS_ENDPOINT") {
            config.endpoint = Some(endpoint);
        }

        config.api_key = std::env::var("HOMEOPS_API_KEY").ok();
        config.log_level = std::env::var("RUST_LOG").ok();

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(provider) = config_file.provider {
            result.provider = provider;
        }
        if let Some(model) = config_file.model {
            result.model = model;
        }
        if let Some(endpoint) = config_file.endpoint {
            result.endpoint = Some(endpoint);
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(generation) = config_file.generation {
            result.generation = generation;
        }
        if let Some(session) = config_file.session {
            result.session = session;
        }
        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// This method merges command-line flags with the loaded configuration,
    /// giving precedence to CLI flags over environment variables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .homeops directory.
    pub fn homeops_dir(&self) -> PathBuf {
        self.workspace.join(".homeops")
    }

    /// Get the path to the persisted vector index.
    pub fn index_path(&self) -> PathBuf {
        self.homeops_dir().join("index")
    }

    /// Get the default path to the house profile JSON.
    pub fn house_profile_path(&self) -> PathBuf {
        self.homeops_dir().join("house_profile.json")
    }

    /// Ensure the .homeops directory exists.
    pub fn ensure_homeops_dir(&self) -> AppResult<()> {
        let dir = self.homeops_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .homeops directory: {}", e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert!(!config.verbose);
        assert!(!config.no_color);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.session.ttl_secs, 3600);
    }

    #[test]
    fn test_retrieval_thresholds_default() {
        let settings = RetrievalSettings::default();
        assert!((settings.min_relevance_score - 0.30).abs() < f32::EPSILON);
        assert!((settings.filtered_fallback_score - 0.30).abs() < f32::EPSILON);
        assert!(!settings.rerank_enabled);
    }

    #[test]
    fn test_homeops_dir() {
        let config = AppConfig::default();
        assert!(config.homeops_dir().ends_with(".homeops"));
        assert!(config.index_path().ends_with(".homeops/index"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("ollama".to_string()),
            Some("llama3.1".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "ollama");
        assert_eq!(overridden.model, "llama3.1");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }
}
