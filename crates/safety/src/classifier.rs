//! Two-layer risk classifier.
//!
//! Layer 1 (deterministic) scans the hazard registry; any match forces a
//! HIGH safety stop and cannot be overridden downward. Layer 2 (model)
//! only runs when Layer 1 is clean and may raise the level for nuanced
//! phrasing the registry cannot see.
//!
//! When the model is unavailable the classifier falls back to the
//! deterministic verdict — conservatively MED for a clean Layer 1, never
//! LOW.

use crate::registry::scan_hazards;
use crate::types::RiskAssessment;
use homeops_core::RiskLevel;
use homeops_llm::{complete_structured, LlmClient, LlmRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ASSESSOR_SYSTEM_PROMPT: &str = "\
You are a home safety assessor. Evaluate the risk level of a reported home \
system issue. Consider: Is this something a homeowner can safely investigate? \
Does it involve gas, electrical, structural, or other hazards?

Respond with a JSON object containing:
- \"risk_level\": \"LOW\", \"MED\", or \"HIGH\"
- \"reasoning\": string, why this risk level was assigned
- \"safety_concern\": boolean, whether the issue is unsafe for DIY and needs professional help
- \"recommended_professional\": string or null, type of professional if safety_concern is true";

/// Layer-2 model response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelAssessment {
    risk_level: RiskLevel,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    safety_concern: bool,
    #[serde(default)]
    recommended_professional: Option<String>,
}

/// Two-layer risk classifier.
pub struct RiskClassifier {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl RiskClassifier {
    /// Create a classifier using the given model for Layer 2.
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Assess the risk of a reported issue.
    ///
    /// `text` is the combined symptom and context; `device_context` names
    /// the device type when known. Always produces an assessment — model
    /// failure degrades to the deterministic verdict.
    pub async fn assess(&self, text: &str, device_context: Option<&str>) -> RiskAssessment {
        let combined = match device_context {
            Some(device) => format!("{} {}", text, device),
            None => text.to_string(),
        };

        // Layer 1: deterministic registry scan. A match is final.
        let hazards = scan_hazards(&combined);
        if let Some(first) = hazards.first() {
            return RiskAssessment {
                level: RiskLevel::High,
                triggered: hazards.iter().map(|m| m.kind).collect(),
                is_safety_stop: true,
                // The deterministic category is authoritative for the
                // referral; Layer 2 never gets a say here.
                professional: Some(first.professional.to_string()),
                safety_message: Some(first.message.to_string()),
            };
        }

        // Layer 2: model assessment for phrasing the registry cannot see.
        tracing::debug!("Layer 1 clean, running model risk assessment");
        match self.assess_with_model(text, device_context).await {
            Ok(assessment) => assessment,
            Err(e) => {
                // Never fail open to LOW when the model is down.
                tracing::error!("Model risk assessment failed: {}", e);
                RiskAssessment::clear(RiskLevel::Med)
            }
        }
    }

    async fn assess_with_model(
        &self,
        text: &str,
        device_context: Option<&str>,
    ) -> homeops_core::AppResult<RiskAssessment> {
        let user_prompt = format!(
            "Device: {}\nReported issue: {}\n\nAssess the risk level for DIY troubleshooting.",
            device_context.unwrap_or("unknown"),
            text
        );

        let request = LlmRequest::new(user_prompt, &self.model)
            .with_system(ASSESSOR_SYSTEM_PROMPT)
            .with_temperature(0.1)
            .with_max_tokens(500);

        let assessment: ModelAssessment = complete_structured(self.llm.as_ref(), &request).await?;

        let is_safety_stop = assessment.safety_concern && assessment.risk_level == RiskLevel::High;

        tracing::info!(
            "Model risk assessment: level={}, safety_stop={}",
            assessment.risk_level,
            is_safety_stop
        );

        Ok(RiskAssessment {
            level: assessment.risk_level,
            triggered: Vec::new(),
            is_safety_stop,
            professional: if is_safety_stop {
                assessment.recommended_professional
            } else {
                None
            },
            safety_message: if is_safety_stop {
                Some(format!(
                    "SAFETY CONCERN: {}. This issue requires professional attention.",
                    assessment.reasoning
                ))
            } else {
                None
            },
        })
    }
}
