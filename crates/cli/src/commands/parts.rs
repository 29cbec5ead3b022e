//! Parts lookup command handler.

use clap::Args;
use homeops_core::{AppConfig, AppResult};
use homeops_workflows::parts::PartsHelper;
use std::path::PathBuf;

/// Look up replacement parts and consumables
#[derive(Args, Debug)]
pub struct PartsCommand {
    /// What to look up (e.g., "What filter does my furnace need?")
    pub query: String,

    /// Narrow the search to one device type (e.g., "furnace")
    #[arg(short, long)]
    pub device: Option<String>,

    /// Path to house profile JSON (default: .homeops/house_profile.json)
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PartsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let retriever = super::build_retriever(config).await?;
        let llm = super::build_llm(config)?;
        let profile = super::load_profile(config, self.profile.as_ref())?;

        let helper = PartsHelper::new(retriever, llm, &config.model);
        let lookup = helper
            .lookup(&self.query, self.device.as_deref(), profile.as_ref())
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&lookup)?);
            return Ok(());
        }

        println!("{}", lookup.markdown);

        Ok(())
    }
}
