//! Seasonal maintenance planner workflow.
//!
//! Linear flow: retrieve (season + profile filtered) → generate checklist →
//! render. No risk gating beyond citation validation — checklist items that
//! cite documents outside the retrieval lose their source reference.

use crate::profile::{HouseProfile, Season};
use homeops_core::AppResult;
use homeops_llm::{complete_structured, LlmClient, LlmRequest};
use homeops_retrieval::{format_passages_as_context, RetrievalResult, RetrieveRequest, Retriever};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const CHECKLIST_SYSTEM_PROMPT: &str = "\
You are a home maintenance planner. Generate a seasonal maintenance checklist \
for a specific house based on its installed systems and the provided \
documentation.

RULES:
1. Only include tasks relevant to the requested season and the systems this house actually has
2. Each task should be short and actionable
3. Include frequency and a rough time estimate when known
4. Cite the source document when a task comes from the provided documentation
5. Include part numbers, filter sizes, and settings from the docs when available
6. Priorities: 'high' for safety or damage-prevention tasks, 'medium' for efficiency, 'low' for cosmetic

Respond with a JSON object containing:
- \"checklist_items\": array of {\"task\": string, \"device_type\": string or null, \"priority\": \"high\"|\"medium\"|\"low\", \"frequency\": string or null, \"estimated_time\": string or null, \"notes\": string or null, \"source_doc\": string or null}";

/// A single maintenance task in the checklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Short, actionable description of the maintenance task
    pub task: String,

    /// Which device/system this task relates to
    #[serde(default)]
    pub device_type: Option<String>,

    /// "high", "medium", or "low"
    #[serde(default = "default_priority")]
    pub priority: String,

    /// How often this task should be done
    #[serde(default)]
    pub frequency: Option<String>,

    /// Rough time estimate
    #[serde(default)]
    pub estimated_time: Option<String>,

    /// Additional details, tips, or part numbers
    #[serde(default)]
    pub notes: Option<String>,

    /// Document this task was derived from
    #[serde(default)]
    pub source_doc: Option<String>,
}

fn default_priority() -> String {
    "medium".to_string()
}

/// Structured model response for checklist generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChecklistResponse {
    checklist_items: Vec<ChecklistItem>,
}

/// A generated maintenance plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenancePlan {
    pub season: Season,
    pub house_name: String,
    pub checklist_items: Vec<ChecklistItem>,

    /// Rendered markdown checklist
    pub markdown: String,

    /// Source documents that informed the plan
    pub sources_used: Vec<String>,
}

/// Outcome of a maintenance planning call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MaintenancePlanOutcome {
    Plan(MaintenancePlan),

    /// Retrieval found nothing relevant for this season and profile;
    /// no checklist was generated.
    InsufficientEvidence { season: Season },
}

/// The maintenance planner.
pub struct MaintenancePlanner {
    retriever: Arc<Retriever>,
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl MaintenancePlanner {
    /// Create a planner over the given collaborators.
    pub fn new(retriever: Arc<Retriever>, llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            retriever,
            llm,
            model: model.into(),
        }
    }

    /// Generate a seasonal maintenance plan for a house.
    pub async fn plan(
        &self,
        profile: &HouseProfile,
        season: Season,
    ) -> AppResult<MaintenancePlanOutcome> {
        tracing::info!(
            "Generating {} maintenance plan for '{}' ({} systems)",
            season,
            profile.name,
            profile.systems.len()
        );

        let query = season_query(season);
        let devices = profile.installed_device_types();

        let retrieval = self
            .retriever
            .retrieve_with(
                RetrieveRequest::filtered(query, devices).with_top_k(season_target_items(season)),
            )
            .await?;

        if !retrieval.sufficient {
            tracing::info!("Insufficient evidence for {} plan, skipping generation", season);
            return Ok(MaintenancePlanOutcome::InsufficientEvidence { season });
        }

        let mut items = self.generate_checklist(profile, season, &retrieval).await?;

        validate_item_sources(&mut items, &retrieval);

        let sources_used: Vec<String> = {
            let mut sources: Vec<String> = items
                .iter()
                .filter_map(|item| item.source_doc.clone())
                .collect();
            sources.sort();
            sources.dedup();
            sources
        };

        let markdown = render_plan_markdown(profile, season, &items, &sources_used);

        tracing::info!(
            "Generated {} checklist items for {} ({} sources)",
            items.len(),
            season,
            sources_used.len()
        );

        Ok(MaintenancePlanOutcome::Plan(MaintenancePlan {
            season,
            house_name: profile.name.clone(),
            checklist_items: items,
            markdown,
            sources_used,
        }))
    }

    async fn generate_checklist(
        &self,
        profile: &HouseProfile,
        season: Season,
        retrieval: &RetrievalResult,
    ) -> AppResult<Vec<ChecklistItem>> {
        let context = format_passages_as_context(&retrieval.passages);

        let systems_info: String = profile
            .installed_device_types()
            .iter()
            .map(|device| {
                let details = profile.device_details(device);
                if details.is_empty() {
                    format!("- {}", device)
                } else {
                    format!("- {}: {}", device, details.replace('\n', ", "))
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let user_message = format!(
            "Season: {}\n\
             House: {} (climate zone: {:?})\n\n\
             Installed systems:\n{}\n\n\
             Relevant documentation:\n{}\n\n\
             Generate around {} maintenance tasks for this season.",
            season,
            profile.name,
            profile.climate_zone,
            systems_info,
            context,
            season_target_items(season)
        );

        let llm_request = LlmRequest::new(user_message, &self.model)
            .with_system(CHECKLIST_SYSTEM_PROMPT)
            .with_temperature(0.3)
            .with_max_tokens(4000);

        let response: ChecklistResponse = complete_structured(self.llm.as_ref(), &llm_request).await?;
        Ok(response.checklist_items)
    }
}

/// Season-specific retrieval query template.
fn season_query(season: Season) -> String {
    match season {
        Season::Spring => {
            "spring maintenance post-winter inspection cooling preparation outdoor systems drainage"
        }
        Season::Summer => {
            "summer maintenance air conditioning cooling ventilation humidity exterior"
        }
        Season::Fall => {
            "fall maintenance winterization heating system inspection furnace filter freeze prevention"
        }
        Season::Winter => {
            "winter maintenance heating efficiency humidity ventilation freeze prevention indoor"
        }
    }
    .to_string()
}

/// Target number of checklist items per season.
///
/// Shoulder seasons carry the transition workload.
fn season_target_items(season: Season) -> usize {
    match season {
        Season::Spring => 8,
        Season::Summer => 6,
        Season::Fall => 10,
        Season::Winter => 6,
    }
}

/// Clear source references that do not trace back to the retrieval.
fn validate_item_sources(items: &mut [ChecklistItem], retrieval: &RetrievalResult) {
    for item in items.iter_mut() {
        let Some(source_doc) = &item.source_doc else {
            continue;
        };

        let grounded = retrieval.passages.iter().any(|p| {
            source_doc.to_lowercase().contains(&p.source_doc.to_lowercase())
                || p.source_doc.eq_ignore_ascii_case(source_doc)
        });

        if !grounded {
            tracing::debug!("Dropping ungrounded checklist source '{}'", source_doc);
            item.source_doc = None;
        }
    }
}

/// Render the checklist as markdown with checkboxes.
fn render_plan_markdown(
    profile: &HouseProfile,
    season: Season,
    items: &[ChecklistItem],
    sources_used: &[String],
) -> String {
    let mut lines = vec![
        format!("# {} Maintenance Plan", capitalize(season.as_str())),
        format!("## {}", profile.name),
        String::new(),
    ];

    if items.is_empty() {
        lines.push("No maintenance tasks identified from available documentation.".to_string());
    }

    for priority in ["high", "medium", "low"] {
        let group: Vec<&ChecklistItem> =
            items.iter().filter(|i| i.priority == priority).collect();
        if group.is_empty() {
            continue;
        }

        lines.push(format!("### {} priority", capitalize(priority)));
        lines.push(String::new());

        for item in group {
            let mut line = format!("- [ ] {}", item.task);
            if let Some(device) = &item.device_type {
                line.push_str(&format!(" ({})", device.replace('_', " ")));
            }
            lines.push(line);

            if let Some(frequency) = &item.frequency {
                lines.push(format!("  - Frequency: {}", frequency));
            }
            if let Some(estimated_time) = &item.estimated_time {
                lines.push(format!("  - Time: {}", estimated_time));
            }
            if let Some(notes) = &item.notes {
                lines.push(format!("  - Note: {}", notes));
            }
            if let Some(source_doc) = &item.source_doc {
                lines.push(format!("  - *Source: {}*", source_doc));
            }
        }
        lines.push(String::new());
    }

    if !sources_used.is_empty() {
        lines.push("---".to_string());
        lines.push(format!("*Sources: {}*", sources_used.join(", ")));
    }

    lines.join("\n")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ClimateZone, HouseType, InstalledSystem};
    use homeops_core::config::RetrievalSettings;
    use homeops_core::AppResult;
    use homeops_llm::{LlmResponse, LlmUsage};
    use homeops_retrieval::embeddings::mock::MockProvider;
    use homeops_retrieval::embeddings::EmbeddingProvider;
    use homeops_retrieval::{MemoryPassageStore, PassageRecord, PassageStore};
    use std::collections::BTreeMap;

    const DIM: usize = 256;

    struct ScriptedLlm {
        body: String,
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            Ok(LlmResponse {
                content: self.body.clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
                done: true,
            })
        }
    }

    fn profile() -> HouseProfile {
        let mut systems = BTreeMap::new();
        systems.insert(
            "furnace".to_string(),
            Some(InstalledSystem {
                model: Some("OM9GFRC".to_string()),
                manufacturer: Some("Carrier".to_string()),
                fuel_type: Some("gas".to_string()),
                install_year: None,
                notes: None,
            }),
        );

        HouseProfile {
            name: "123 Main Street".to_string(),
            year_built: None,
            square_footage: None,
            climate_zone: ClimateZone::Cold,
            house_type: HouseType::SingleFamily,
            systems,
        }
    }

    async fn retriever_with_fall_doc() -> Arc<Retriever> {
        let provider = MockProvider::new(DIM);
        let text = "Fall maintenance: inspect the furnace heating system, replace filter before winterization.";
        let embedding = provider.embed(text).await.unwrap();

        let store = MemoryPassageStore::new();
        store
            .upsert_passages(&[PassageRecord {
                id: "p1".to_string(),
                text: text.to_string(),
                source_doc: "Furnace-OM9GFRC-02.pdf".to_string(),
                section: None,
                device_type: Some("furnace".to_string()),
                device_name: Some("OM9GFRC".to_string()),
                manufacturer: None,
                embedding: Some(embedding),
            }])
            .await
            .unwrap();

        Arc::new(Retriever::new(
            Arc::new(store),
            Arc::new(MockProvider::new(DIM)),
            RetrievalSettings::default(),
        ))
    }

    const CHECKLIST: &str = r#"{
        "checklist_items": [
            {"task": "Replace furnace filter", "device_type": "furnace", "priority": "high", "frequency": "Every 1-3 months", "estimated_time": "5 minutes", "notes": "MERV 11, 16x25x1", "source_doc": "Furnace-OM9GFRC-02.pdf"},
            {"task": "Test smoke detectors", "device_type": null, "priority": "high", "frequency": "Monthly", "estimated_time": null, "notes": null, "source_doc": "imaginary-guide.pdf"},
            {"task": "Dust supply vents", "device_type": "furnace", "priority": "low", "frequency": null, "estimated_time": null, "notes": null, "source_doc": null}
        ]
    }"#;

    #[tokio::test]
    async fn test_plan_generates_checklist_with_validated_sources() {
        let planner = MaintenancePlanner::new(
            retriever_with_fall_doc().await,
            Arc::new(ScriptedLlm {
                body: CHECKLIST.to_string(),
            }),
            "m",
        );

        let outcome = planner.plan(&profile(), Season::Fall).await.unwrap();
        let MaintenancePlanOutcome::Plan(plan) = outcome else {
            panic!("expected a plan");
        };

        assert_eq!(plan.house_name, "123 Main Street");
        assert_eq!(plan.checklist_items.len(), 3);

        // Grounded source kept, fabricated one cleared
        assert_eq!(
            plan.checklist_items[0].source_doc.as_deref(),
            Some("Furnace-OM9GFRC-02.pdf")
        );
        assert!(plan.checklist_items[1].source_doc.is_none());
        assert_eq!(plan.sources_used, vec!["Furnace-OM9GFRC-02.pdf"]);

        assert!(plan.markdown.contains("# Fall Maintenance Plan"));
        assert!(plan.markdown.contains("- [ ] Replace furnace filter"));
        assert!(plan.markdown.contains("High priority"));
    }

    #[tokio::test]
    async fn test_plan_insufficient_when_corpus_unrelated() {
        let provider = MockProvider::new(DIM);
        let text = "Pool pump impeller lubrication procedure for model XJ-9.";
        let embedding = provider.embed(text).await.unwrap();

        let store = MemoryPassageStore::new();
        store
            .upsert_passages(&[PassageRecord {
                id: "p1".to_string(),
                text: text.to_string(),
                source_doc: "pool.pdf".to_string(),
                section: None,
                device_type: Some("furnace".to_string()),
                device_name: None,
                manufacturer: None,
                embedding: Some(embedding),
            }])
            .await
            .unwrap();

        let retriever = Arc::new(Retriever::new(
            Arc::new(store),
            Arc::new(MockProvider::new(DIM)),
            RetrievalSettings::default(),
        ));

        // Scripted body would fail decoding if generation ran
        let planner = MaintenancePlanner::new(
            retriever,
            Arc::new(ScriptedLlm {
                body: "not json".to_string(),
            }),
            "m",
        );

        let outcome = planner.plan(&profile(), Season::Fall).await.unwrap();
        assert!(matches!(
            outcome,
            MaintenancePlanOutcome::InsufficientEvidence {
                season: Season::Fall
            }
        ));
    }

    #[test]
    fn test_season_targets() {
        assert_eq!(season_target_items(Season::Fall), 10);
        assert_eq!(season_target_items(Season::Summer), 6);
    }

    #[test]
    fn test_season_queries_mention_season_focus() {
        assert!(season_query(Season::Fall).contains("winterization"));
        assert!(season_query(Season::Spring).contains("post-winter"));
        assert!(season_query(Season::Summer).contains("cooling"));
        assert!(season_query(Season::Winter).contains("freeze"));
    }

    #[test]
    fn test_render_groups_by_priority() {
        let items = vec![
            ChecklistItem {
                task: "High task".to_string(),
                device_type: None,
                priority: "high".to_string(),
                frequency: None,
                estimated_time: None,
                notes: None,
                source_doc: None,
            },
            ChecklistItem {
                task: "Low task".to_string(),
                device_type: None,
                priority: "low".to_string(),
                frequency: None,
                estimated_time: None,
                notes: None,
                source_doc: None,
            },
        ];

        let markdown = render_plan_markdown(&profile(), Season::Winter, &items, &[]);
        let high_pos = markdown.find("High priority").unwrap();
        let low_pos = markdown.find("Low priority").unwrap();
        assert!(high_pos < low_pos);
        assert!(markdown.contains("- [ ] High task"));
    }
}
