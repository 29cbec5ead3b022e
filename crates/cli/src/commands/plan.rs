//! Maintenance plan command handler.

use clap::Args;
use homeops_core::{AppConfig, AppError, AppResult};
use homeops_workflows::maintenance::{MaintenancePlanOutcome, MaintenancePlanner};
use homeops_workflows::Season;
use std::path::PathBuf;

/// Generate a seasonal maintenance plan
#[derive(Args, Debug)]
pub struct PlanCommand {
    /// Season to plan for (spring, summer, fall, winter)
    #[arg(short, long)]
    pub season: String,

    /// Path to house profile JSON (default: .homeops/house_profile.json)
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PlanCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let season: Season = self.season.parse()?;

        let profile = super::load_profile(config, self.profile.as_ref())?.ok_or_else(|| {
            AppError::Config(
                "Maintenance planning needs a house profile. \
                 Create .homeops/house_profile.json first."
                    .to_string(),
            )
        })?;

        let retriever = super::build_retriever(config).await?;
        let llm = super::build_llm(config)?;

        let planner = MaintenancePlanner::new(retriever, llm, &config.model);
        let outcome = planner.plan(&profile, season).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        match outcome {
            MaintenancePlanOutcome::Plan(plan) => {
                println!("{}", plan.markdown);
            }
            MaintenancePlanOutcome::InsufficientEvidence { season } => {
                println!(
                    "Not enough indexed documentation to build a {} plan for this house.",
                    season
                );
                println!("Try indexing more manuals with `homeops index load`.");
            }
        }

        Ok(())
    }
}
