//! Ask command handler.

use clap::Args;
use homeops_core::{AppConfig, AppResult};
use homeops_retrieval::{answer, AskOutcome};
use std::path::PathBuf;

/// Ask a question about your home equipment
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Path to house profile JSON (default: .homeops/house_profile.json)
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let retriever = super::build_retriever(config).await?;
        let llm = super::build_llm(config)?;
        let profile = super::load_profile(config, self.profile.as_ref())?;

        let profile_devices = profile.as_ref().map(|p| p.installed_device_types());

        let outcome = answer(
            &self.question,
            profile_devices,
            &retriever,
            llm.as_ref(),
            &config.model,
        )
        .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        match outcome {
            AskOutcome::Answered {
                answer,
                risk_level,
                citations,
                ..
            } => {
                println!("{}", answer);
                println!();
                println!("Risk level: {}", risk_level);
                if !citations.is_empty() {
                    println!();
                    println!("Sources:");
                    for citation in citations {
                        match citation.page {
                            Some(page) => println!("  - {} (page {})", citation.source_doc, page),
                            None => println!("  - {}", citation.source_doc),
                        }
                    }
                }
            }
            AskOutcome::InsufficientEvidence { query } => {
                println!(
                    "I could not find information about \"{}\" in your documents.",
                    query
                );
                println!("Try indexing more manuals with `homeops index load`.");
            }
        }

        Ok(())
    }
}
