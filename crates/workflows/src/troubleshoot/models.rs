//! Troubleshooting workflow types.

use homeops_core::RiskLevel;
use homeops_retrieval::Citation;
use serde::{Deserialize, Serialize};

/// Kind of follow-up question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Binary diagnostic check ("Is the pilot light visible?")
    YesNo,

    /// Selecting from known options ("What color is the indicator light?")
    MultipleChoice,

    /// Descriptions that vary widely ("What sound does it make?")
    FreeText,
}

/// One targeted follow-up question issued at intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupQuestion {
    /// Question identifier ("q1", "q2", ...)
    pub id: String,

    /// The question to ask the user
    pub question: String,

    pub question_type: QuestionType,

    /// Choices for multiple-choice questions
    #[serde(default)]
    pub options: Option<Vec<String>>,

    /// Why this question helps narrow the diagnosis
    pub why: String,
}

/// User's answer to a follow-up question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupAnswer {
    pub question_id: String,
    pub answer: String,
}

/// One ordered diagnostic step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticStep {
    pub step_number: u32,

    /// What to do
    pub instruction: String,

    /// What to expect when it works
    pub expected_outcome: String,

    /// What to do when it doesn't
    pub if_not_resolved: String,

    /// Risk of performing this individual step
    pub risk_level: RiskLevel,

    /// Document this step's advice came from
    #[serde(default)]
    pub source_doc: Option<String>,

    /// Whether a licensed professional must perform this step
    #[serde(default)]
    pub requires_professional: bool,
}

/// Intake request (first invocation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TroubleshootRequest {
    /// Device type ("furnace", "water heater", ...)
    pub device_type: String,

    /// Reported symptom text
    pub symptom: String,

    /// "low", "medium", "high", or "emergency"
    #[serde(default = "default_urgency")]
    pub urgency: String,

    /// Optional additional context
    #[serde(default)]
    pub additional_context: Option<String>,
}

fn default_urgency() -> String {
    "medium".to_string()
}

/// Structured model response for follow-up generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FollowupGenerationResponse {
    pub risk_level: RiskLevel,
    pub followup_questions: Vec<FollowupQuestion>,
    pub preliminary_assessment: String,
}

/// Structured model response for diagnosis generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DiagnosisResponse {
    pub diagnosis_summary: String,
    pub diagnostic_steps: Vec<DiagnosticStep>,
    pub overall_risk_level: RiskLevel,
    pub when_to_call_professional: String,
}

/// Outcome of the intake invocation.
///
/// A safety stop is a normal outcome with its own variant, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TroubleshootStart {
    /// The risk gate fired; no diagnostic content will be generated.
    SafetyStopped {
        session_id: String,
        risk_level: RiskLevel,
        safety_message: String,
        recommended_professional: String,
    },

    /// Follow-up questions issued; answer them via `submit_answers`.
    AwaitingFollowup {
        session_id: String,
        risk_level: RiskLevel,
        followup_questions: Vec<FollowupQuestion>,
        preliminary_assessment: String,
    },
}

/// A completed diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub session_id: String,
    pub diagnosis_summary: String,
    pub diagnostic_steps: Vec<DiagnosticStep>,
    pub overall_risk_level: RiskLevel,
    pub when_to_call_professional: String,

    /// Rendered markdown output
    pub markdown: String,

    /// Citations grounded in the intake retrieval
    pub citations: Vec<Citation>,

    /// Source documents referenced by the steps
    pub sources_used: Vec<String>,
}

/// Outcome of the diagnosis invocation.
///
/// New information in the answers can still trigger a stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DiagnosisOutcome {
    SafetyStopped {
        session_id: String,
        risk_level: RiskLevel,
        safety_message: String,
        recommended_professional: String,
    },

    Complete(Box<Diagnosis>),
}
