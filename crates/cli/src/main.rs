//! HomeOps CLI
//!
//! Main entry point for the homeops command-line tool: a local-first
//! copilot for home equipment questions, troubleshooting, seasonal
//! maintenance planning, and parts lookup over a private document corpus.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IndexCommand, PartsCommand, PlanCommand, TroubleshootCommand};
use homeops_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// HomeOps CLI - home equipment copilot over your own documents
#[derive(Parser, Debug)]
#[command(name = "homeops")]
#[command(about = "Home equipment copilot over your own documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "HOMEOPS_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "HOMEOPS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (currently "ollama")
    #[arg(short, long, global = true, env = "HOMEOPS_PROVIDER")]
    provider: Option<String>,

    /// Completion model identifier
    #[arg(short, long, global = true, env = "HOMEOPS_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question about your home equipment
    Ask(AskCommand),

    /// Guided troubleshooting with safety guardrails
    Troubleshoot(TroubleshootCommand),

    /// Generate a seasonal maintenance plan
    Plan(PlanCommand),

    /// Look up replacement parts and consumables
    Parts(PartsCommand),

    /// Manage the passage index
    Index(IndexCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("HomeOps CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_homeops_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Troubleshoot(_) => "troubleshoot",
        Commands::Plan(_) => "plan",
        Commands::Parts(_) => "parts",
        Commands::Index(_) => "index",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Troubleshoot(cmd) => cmd.execute(&config).await,
        Commands::Plan(cmd) => cmd.execute(&config).await,
        Commands::Parts(cmd) => cmd.execute(&config).await,
        Commands::Index(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
