//! Troubleshooting workflow with safety guardrails.
//!
//! A phased state machine split across two client invocations:
//!
//! Invocation 1 (`start`):
//!     intake → retrieve → risk gate → follow-up questions, or safety stop
//!
//! Invocation 2 (`submit_answers`, only for sessions awaiting follow-up):
//!     re-assess risk → generate diagnosis → render → complete
//!
//! Session state is persisted between invocations through a `SessionStore`.
//! The risk gate runs before every generative step: a safety-stopped
//! session never produces diagnostic content, and answers that reveal a
//! hazard stop the workflow at the second invocation too.

pub mod models;

pub use models::{
    Diagnosis, DiagnosisOutcome, DiagnosticStep, FollowupAnswer, FollowupQuestion, QuestionType,
    TroubleshootRequest, TroubleshootStart,
};

use crate::profile::HouseProfile;
use crate::session::{SessionPhase, SessionStore, WorkflowSession};
use homeops_core::{AppError, AppResult, RiskLevel};
use homeops_llm::{complete_structured, LlmClient, LlmRequest};
use homeops_retrieval::{
    format_passages_as_context, resolve_citations, Citation, RawCitation, RetrieveRequest,
    Retriever,
};
use homeops_safety::RiskClassifier;
use models::{DiagnosisResponse, FollowupGenerationResponse};
use std::sync::Arc;

const MAX_FOLLOWUP_QUESTIONS: usize = 6;

const FOLLOWUP_SYSTEM_PROMPT: &str = "\
You are a home maintenance diagnostic expert. Your job is to generate targeted \
follow-up questions that will help narrow down the root cause of a home system issue.

RULES:
1. Generate between 2 and 6 follow-up questions
2. Questions should be specific and diagnostic (not generic)
3. Use the retrieved documentation to inform what questions to ask
4. Consider the device type, reported symptom, and house profile
5. Each question should have a clear purpose (explain in the 'why' field)
6. Use appropriate question types:
   - yes_no: For binary diagnostic checks (e.g., \"Is the pilot light visible?\")
   - multiple_choice: For selecting from known options (include an 'options' array)
   - free_text: For descriptions that vary widely (e.g., \"What sound does it make?\")
7. If the symptom involves gas, electrical, CO, or structural concerns, set risk_level to HIGH

Respond with a JSON object containing:
- \"risk_level\": \"LOW\", \"MED\", or \"HIGH\"
- \"followup_questions\": array of {\"id\": string, \"question\": string, \"question_type\": \"yes_no\"|\"multiple_choice\"|\"free_text\", \"options\": array of strings or null, \"why\": string}
- \"preliminary_assessment\": string, your initial read on the likely cause";

const DIAGNOSIS_SYSTEM_PROMPT: &str = "\
You are a home maintenance diagnostic expert. Based on the user's reported issue, \
their answers to follow-up questions, and relevant documentation, provide a \
structured diagnosis with actionable steps.

RULES:
1. Provide 3-6 diagnostic steps, ordered from simplest to most complex
2. Each step must include what to do, what to expect, and what to do if it doesn't work
3. The FINAL step should ALWAYS be: \"If the issue persists, call a professional\"
4. Cite source documents when your advice comes from the provided documentation
5. Be specific: include part numbers, settings, measurements when available from docs

CRITICAL SAFETY RULES - THESE ARE NON-NEGOTIABLE:
1. NEVER provide step-by-step instructions for gas line work
2. NEVER provide step-by-step instructions for electrical panel/wiring work
3. NEVER provide step-by-step instructions for structural modifications
4. For any step involving gas, high-voltage electrical, or structural work:
   set requires_professional to true, risk_level to HIGH, and make the
   instruction \"Call a licensed [type] professional\"
5. Steps like replacing filters, checking thermostat settings, or visual inspections are safe (LOW/MED)
6. Always include when_to_call_professional guidance

Respond with a JSON object containing:
- \"diagnosis_summary\": string
- \"diagnostic_steps\": array of {\"step_number\": number, \"instruction\": string, \"expected_outcome\": string, \"if_not_resolved\": string, \"risk_level\": \"LOW\"|\"MED\"|\"HIGH\", \"source_doc\": string or null, \"requires_professional\": boolean}
- \"overall_risk_level\": \"LOW\", \"MED\", or \"HIGH\"
- \"when_to_call_professional\": string";

/// The troubleshooting workflow engine.
pub struct TroubleshootEngine {
    retriever: Arc<Retriever>,
    classifier: Arc<RiskClassifier>,
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn SessionStore>,
    model: String,
}

impl TroubleshootEngine {
    /// Create an engine over the given collaborators.
    pub fn new(
        retriever: Arc<Retriever>,
        classifier: Arc<RiskClassifier>,
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn SessionStore>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            retriever,
            classifier,
            llm,
            store,
            model: model.into(),
        }
    }

    /// Intake invocation: retrieve, risk-gate, and either issue follow-up
    /// questions or stop with a professional referral.
    pub async fn start(
        &self,
        request: TroubleshootRequest,
        profile: Option<&HouseProfile>,
    ) -> AppResult<TroubleshootStart> {
        if request.symptom.trim().is_empty() || request.device_type.trim().is_empty() {
            return Err(AppError::Workflow(
                "Troubleshooting requires both a device type and a symptom".to_string(),
            ));
        }

        let device_type = normalize_device_type(&request.device_type);
        tracing::info!(
            "Troubleshoot intake: device={}, urgency={}",
            device_type,
            request.urgency
        );

        if let Some(profile) = profile {
            if !profile.has_system(&device_type) {
                // User may know their systems better than the profile
                tracing::info!(
                    "Device '{}' not in house profile, proceeding anyway",
                    device_type
                );
            }
        }

        let retrieval = self
            .retriever
            .retrieve_with(
                RetrieveRequest::filtered(request.symptom.clone(), vec![device_type.clone()])
                    .with_top_k(5),
            )
            .await?;

        let risk_text = combine_text(&request.symptom, request.additional_context.as_deref());
        let risk = self.classifier.assess(&risk_text, Some(&device_type)).await;

        let session_id = uuid::Uuid::new_v4().to_string();

        if risk.is_safety_stop {
            tracing::warn!(
                "Safety stop at intake for session {}: {:?}",
                session_id,
                risk.triggered
            );

            let safety_message = risk
                .safety_message
                .clone()
                .unwrap_or_else(|| "This issue requires professional attention.".to_string());
            let recommended_professional = risk
                .professional
                .clone()
                .unwrap_or_else(|| "licensed professional".to_string());

            // Persist the stopped session so a second invocation fails the
            // phase check instead of looking like an unknown session.
            self.store.put(WorkflowSession {
                session_id: session_id.clone(),
                phase: SessionPhase::SafetyStopped,
                device_type,
                symptom: request.symptom,
                urgency: request.urgency,
                additional_context: request.additional_context,
                retrieval,
                followup_questions: Vec::new(),
                followup_answers: Vec::new(),
                risk: risk.clone(),
                preliminary_assessment: None,
                created_at: chrono::Utc::now(),
            })?;

            return Ok(TroubleshootStart::SafetyStopped {
                session_id,
                risk_level: risk.level,
                safety_message,
                recommended_professional,
            });
        }

        let generation = self
            .generate_followups(&request, &device_type, &retrieval, profile, risk.level)
            .await?;

        let mut followup_questions = generation.followup_questions;
        followup_questions.truncate(MAX_FOLLOWUP_QUESTIONS);
        if followup_questions.is_empty() {
            return Err(AppError::Workflow(
                "Follow-up generation produced no questions".to_string(),
            ));
        }

        // The generator may have seen risk the classifier missed; never lower
        let risk_level = risk.level.max(generation.risk_level);

        let session = WorkflowSession {
            session_id: session_id.clone(),
            phase: SessionPhase::AwaitingFollowup,
            device_type,
            symptom: request.symptom,
            urgency: request.urgency,
            additional_context: request.additional_context,
            retrieval,
            followup_questions: followup_questions.clone(),
            followup_answers: Vec::new(),
            risk,
            preliminary_assessment: Some(generation.preliminary_assessment.clone()),
            created_at: chrono::Utc::now(),
        };
        self.store.put(session)?;

        tracing::info!(
            "Session {} awaiting follow-up ({} questions)",
            session_id,
            followup_questions.len()
        );

        Ok(TroubleshootStart::AwaitingFollowup {
            session_id,
            risk_level,
            followup_questions,
            preliminary_assessment: generation.preliminary_assessment,
        })
    }

    /// Diagnosis invocation: must reference a session awaiting follow-up.
    ///
    /// Risk is re-assessed over the new answers before anything is
    /// generated. The phase transition is atomic: a generation failure
    /// leaves the stored session in `AwaitingFollowup` and surfaces the
    /// error to the caller.
    pub async fn submit_answers(
        &self,
        session_id: &str,
        answers: Vec<FollowupAnswer>,
    ) -> AppResult<DiagnosisOutcome> {
        let mut session = self
            .store
            .get_in_phase(session_id, SessionPhase::AwaitingFollowup)?;

        let answers_text: String = answers
            .iter()
            .map(|a| a.answer.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let risk_text = format!(
            "{} {}",
            combine_text(&session.symptom, session.additional_context.as_deref()),
            answers_text
        );

        // New information may newly trigger a stop
        let risk = self
            .classifier
            .assess(&risk_text, Some(&session.device_type))
            .await;

        if risk.is_safety_stop {
            tracing::warn!(
                "Safety stop at diagnosis for session {}: {:?}",
                session_id,
                risk.triggered
            );

            let safety_message = risk
                .safety_message
                .clone()
                .unwrap_or_else(|| "This issue requires professional attention.".to_string());
            let recommended_professional = risk
                .professional
                .clone()
                .unwrap_or_else(|| "licensed professional".to_string());
            let risk_level = risk.level;

            session.phase = SessionPhase::SafetyStopped;
            session.followup_answers = answers;
            session.risk = risk;
            self.store.put(session)?;

            return Ok(DiagnosisOutcome::SafetyStopped {
                session_id: session_id.to_string(),
                risk_level,
                safety_message,
                recommended_professional,
            });
        }

        // Work on a local copy; the stored session stays in
        // AwaitingFollowup until generation succeeds.
        session.followup_answers = answers;
        session.phase = SessionPhase::Diagnosing;

        let response = self.generate_diagnosis(&session).await?;

        let mut steps = response.diagnostic_steps;
        steps.sort_by_key(|s| s.step_number);

        // A single HIGH-risk step makes the whole workflow HIGH
        let step_max = steps
            .iter()
            .map(|s| s.risk_level)
            .max()
            .unwrap_or(RiskLevel::Low);
        let overall_risk_level = response.overall_risk_level.max(step_max);

        let citations = self.validate_step_sources(&mut steps, &session);

        let sources_used: Vec<String> = {
            let mut sources: Vec<String> = steps
                .iter()
                .filter_map(|s| s.source_doc.clone())
                .collect();
            sources.sort();
            sources.dedup();
            sources
        };

        let markdown = render_diagnosis_markdown(
            &session,
            &response.diagnosis_summary,
            &steps,
            overall_risk_level,
            &response.when_to_call_professional,
        );

        session.phase = SessionPhase::Complete;
        self.store.put(session)?;

        tracing::info!(
            "Session {} complete: {} steps, overall risk {}",
            session_id,
            steps.len(),
            overall_risk_level
        );

        Ok(DiagnosisOutcome::Complete(Box::new(Diagnosis {
            session_id: session_id.to_string(),
            diagnosis_summary: response.diagnosis_summary,
            diagnostic_steps: steps,
            overall_risk_level,
            when_to_call_professional: response.when_to_call_professional,
            markdown,
            citations,
            sources_used,
        })))
    }

    async fn generate_followups(
        &self,
        request: &TroubleshootRequest,
        device_type: &str,
        retrieval: &homeops_retrieval::RetrievalResult,
        profile: Option<&HouseProfile>,
        risk_level: RiskLevel,
    ) -> AppResult<FollowupGenerationResponse> {
        let context = format_passages_as_context(&retrieval.passages);
        let device_details = profile
            .map(|p| p.device_details(device_type))
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "No details available".to_string());

        let user_message = format!(
            "Device type: {}\n\
             Reported symptom: {}\n\
             Urgency: {}\n\
             Additional context: {}\n\
             Risk level: {}\n\n\
             Device details from house profile:\n{}\n\n\
             Relevant documentation:\n{}\n\n\
             Generate targeted follow-up questions to help diagnose this issue.",
            device_type,
            request.symptom,
            request.urgency,
            request.additional_context.as_deref().unwrap_or("None provided"),
            risk_level,
            device_details,
            context
        );

        let llm_request = LlmRequest::new(user_message, &self.model)
            .with_system(FOLLOWUP_SYSTEM_PROMPT)
            .with_temperature(0.3)
            .with_max_tokens(2000);

        complete_structured(self.llm.as_ref(), &llm_request).await
    }

    async fn generate_diagnosis(&self, session: &WorkflowSession) -> AppResult<DiagnosisResponse> {
        let context = format_passages_as_context(&session.retrieval.passages);

        let qa_context = if session.followup_answers.is_empty() {
            "No follow-up answers provided.".to_string()
        } else {
            session
                .followup_answers
                .iter()
                .map(|answer| {
                    let question = session
                        .followup_questions
                        .iter()
                        .find(|q| q.id == answer.question_id)
                        .map(|q| q.question.as_str())
                        .unwrap_or(answer.question_id.as_str());
                    format!("Q: {}\nA: {}", question, answer.answer)
                })
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let user_message = format!(
            "Device type: {}\n\
             Reported symptom: {}\n\
             Urgency: {}\n\
             Additional context: {}\n\
             Preliminary assessment: {}\n\n\
             Follow-up Q&A:\n{}\n\n\
             Relevant documentation:\n{}\n\n\
             Provide a diagnosis with 3-6 actionable steps to resolve this issue. \
             Remember: the final step must always recommend calling a professional if unresolved.",
            session.device_type,
            session.symptom,
            session.urgency,
            session.additional_context.as_deref().unwrap_or("None provided"),
            session.preliminary_assessment.as_deref().unwrap_or("None"),
            qa_context,
            context
        );

        let llm_request = LlmRequest::new(user_message, &self.model)
            .with_system(DIAGNOSIS_SYSTEM_PROMPT)
            .with_temperature(0.3)
            .with_max_tokens(4000);

        complete_structured(self.llm.as_ref(), &llm_request).await
    }

    /// Validate step source references against the session's retrieval.
    ///
    /// A source_doc that does not trace back to a retrieved passage is
    /// cleared from the step — no citation may reference a document the
    /// generation never saw. Returns the grounded citations.
    fn validate_step_sources(
        &self,
        steps: &mut [DiagnosticStep],
        session: &WorkflowSession,
    ) -> Vec<Citation> {
        let mut raw_citations = Vec::new();

        for step in steps.iter_mut() {
            let Some(source_doc) = step.source_doc.clone() else {
                continue;
            };

            let matches = resolve_citations(
                &[RawCitation {
                    source: source_doc.clone(),
                    page: None,
                    section: None,
                    quote: None,
                }],
                &session.retrieval,
            );

            match matches.into_iter().next().and_then(|m| m.citation().cloned()) {
                Some(citation) => {
                    step.source_doc = Some(citation.source_doc.clone());
                    raw_citations.push(citation);
                }
                None => {
                    tracing::debug!(
                        "Dropping ungrounded step source '{}' in session {}",
                        source_doc,
                        session.session_id
                    );
                    step.source_doc = None;
                }
            }
        }

        raw_citations.sort_by(|a, b| a.source_doc.cmp(&b.source_doc));
        raw_citations.dedup_by(|a, b| a.source_doc == b.source_doc);
        raw_citations
    }
}

fn normalize_device_type(device_type: &str) -> String {
    device_type.to_lowercase().trim().replace(' ', "_")
}

fn combine_text(symptom: &str, additional_context: Option<&str>) -> String {
    match additional_context {
        Some(context) if !context.trim().is_empty() => format!("{} {}", symptom, context),
        _ => symptom.to_string(),
    }
}

/// Render diagnostic output as formatted markdown.
fn render_diagnosis_markdown(
    session: &WorkflowSession,
    diagnosis_summary: &str,
    steps: &[DiagnosticStep],
    overall_risk_level: RiskLevel,
    when_to_call_professional: &str,
) -> String {
    let mut lines = vec![
        "# Troubleshooting Diagnosis".to_string(),
        format!("**Device**: {}", session.device_type),
        format!("**Symptom**: {}", session.symptom),
        String::new(),
        format!("**Risk Level**: {}", overall_risk_level),
        String::new(),
    ];

    if !diagnosis_summary.is_empty() {
        lines.extend([
            "## Summary".to_string(),
            String::new(),
            diagnosis_summary.to_string(),
            String::new(),
        ]);
    }

    if !steps.is_empty() {
        lines.extend(["## Diagnostic Steps".to_string(), String::new()]);

        for step in steps {
            let risk_tag = match step.risk_level {
                RiskLevel::High => " [HIGH RISK - Professional Required]",
                RiskLevel::Med => " [Medium Risk]",
                RiskLevel::Low => "",
            };

            lines.push(format!("### Step {}{}", step.step_number, risk_tag));
            lines.push(String::new());
            lines.push(format!("**Do**: {}", step.instruction));
            lines.push(format!("**Expected**: {}", step.expected_outcome));
            lines.push(format!("**If not resolved**: {}", step.if_not_resolved));

            if let Some(source_doc) = &step.source_doc {
                lines.push(format!("*Source: {}*", source_doc));
            }

            if step.requires_professional {
                lines.push("**This step requires a licensed professional.**".to_string());
            }

            lines.push(String::new());
        }
    }

    if !when_to_call_professional.is_empty() {
        lines.extend([
            "---".to_string(),
            String::new(),
            "## When to Call a Professional".to_string(),
            String::new(),
            when_to_call_professional.to_string(),
            String::new(),
        ]);
    }

    let mut sources: Vec<&str> = steps
        .iter()
        .filter_map(|s| s.source_doc.as_deref())
        .collect();
    sources.sort();
    sources.dedup();
    if !sources.is_empty() {
        lines.push("---".to_string());
        lines.push(format!("*Sources: {}*", sources.join(", ")));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use homeops_core::config::RetrievalSettings;
    use homeops_llm::{LlmResponse, LlmUsage};
    use homeops_retrieval::embeddings::mock::MockProvider;
    use homeops_retrieval::embeddings::EmbeddingProvider;
    use homeops_retrieval::{MemoryPassageStore, PassageRecord, PassageStore};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const DIM: usize = 256;

    /// Scripted LLM double that pops queued response bodies in order.
    struct QueuedLlm {
        bodies: Mutex<VecDeque<Result<String, String>>>,
    }

    impl QueuedLlm {
        fn new(bodies: Vec<Result<String, String>>) -> Arc<Self> {
            Arc::new(Self {
                bodies: Mutex::new(bodies.into_iter().collect()),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for QueuedLlm {
        fn provider_name(&self) -> &str {
            "queued"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            let next = self
                .bodies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AppError::Llm("no scripted response left".to_string()))?;

            match next {
                Ok(body) => Ok(LlmResponse {
                    content: body,
                    model: request.model.clone(),
                    usage: LlmUsage::default(),
                    done: true,
                }),
                Err(msg) => Err(AppError::Llm(msg)),
            }
        }
    }

    const RISK_LOW: &str =
        r#"{"risk_level": "LOW", "reasoning": "routine", "safety_concern": false}"#;

    const FOLLOWUPS: &str = r#"{
        "risk_level": "MED",
        "followup_questions": [
            {"id": "q1", "question": "Is the thermostat set to heat?", "question_type": "yes_no", "options": null, "why": "Basic check"},
            {"id": "q2", "question": "What sound does it make?", "question_type": "free_text", "options": null, "why": "Mechanical vs electrical"}
        ],
        "preliminary_assessment": "Likely a thermostat or ignition issue"
    }"#;

    const DIAGNOSIS: &str = r#"{
        "diagnosis_summary": "Furnace ignition failure",
        "diagnostic_steps": [
            {"step_number": 1, "instruction": "Check thermostat is set to HEAT", "expected_outcome": "Display shows HEAT", "if_not_resolved": "Move to step 2", "risk_level": "LOW", "source_doc": "Furnace-OM9GFRC-02.pdf", "requires_professional": false},
            {"step_number": 2, "instruction": "Replace the furnace filter", "expected_outcome": "Clean filter installed", "if_not_resolved": "Move to step 3", "risk_level": "LOW", "source_doc": "bogus-document.pdf", "requires_professional": false},
            {"step_number": 3, "instruction": "If the issue persists, call a licensed HVAC technician", "expected_outcome": "Professional diagnosis", "if_not_resolved": "Follow their advice", "risk_level": "MED", "source_doc": null, "requires_professional": true}
        ],
        "overall_risk_level": "MED",
        "when_to_call_professional": "If the furnace does not ignite after these steps"
    }"#;

    async fn engine_with(llm: Arc<dyn LlmClient>) -> (TroubleshootEngine, Arc<MemorySessionStore>) {
        let provider = MockProvider::new(DIM);
        let text = "Furnace troubleshooting: check thermostat mode and replace the filter.";
        let embedding = provider.embed(text).await.unwrap();

        let passage_store = MemoryPassageStore::new();
        passage_store
            .upsert_passages(&[PassageRecord {
                id: "p1".to_string(),
                text: text.to_string(),
                source_doc: "Furnace-OM9GFRC-02.pdf".to_string(),
                section: None,
                device_type: Some("furnace".to_string()),
                device_name: Some("OM9GFRC".to_string()),
                manufacturer: Some("Carrier".to_string()),
                embedding: Some(embedding),
            }])
            .await
            .unwrap();

        let retriever = Arc::new(Retriever::new(
            Arc::new(passage_store),
            Arc::new(MockProvider::new(DIM)),
            RetrievalSettings::default(),
        ));
        let classifier = Arc::new(RiskClassifier::new(llm.clone(), "m"));
        let store = Arc::new(MemorySessionStore::new(3600));

        (
            TroubleshootEngine::new(retriever, classifier, llm, store.clone(), "m"),
            store,
        )
    }

    fn request(symptom: &str) -> TroubleshootRequest {
        TroubleshootRequest {
            device_type: "Furnace".to_string(),
            symptom: symptom.to_string(),
            urgency: "high".to_string(),
            additional_context: None,
        }
    }

    #[tokio::test]
    async fn test_intake_generates_followups() {
        let llm = QueuedLlm::new(vec![Ok(RISK_LOW.to_string()), Ok(FOLLOWUPS.to_string())]);
        let (engine, store) = engine_with(llm).await;

        let outcome = engine
            .start(request("Furnace troubleshooting thermostat filter"), None)
            .await
            .unwrap();

        match outcome {
            TroubleshootStart::AwaitingFollowup {
                session_id,
                risk_level,
                followup_questions,
                ..
            } => {
                assert_eq!(followup_questions.len(), 2);
                // Generator raised MED over the classifier's LOW
                assert_eq!(risk_level, RiskLevel::Med);
                let session = store.get(&session_id).unwrap().unwrap();
                assert_eq!(session.phase, SessionPhase::AwaitingFollowup);
                assert_eq!(session.device_type, "furnace");
            }
            TroubleshootStart::SafetyStopped { .. } => panic!("expected follow-ups"),
        }
    }

    #[tokio::test]
    async fn test_gas_smell_safety_stops_at_intake() {
        // No scripted responses: a Layer-1 stop must not reach the model
        let llm = QueuedLlm::new(vec![]);
        let (engine, store) = engine_with(llm).await;

        let outcome = engine
            .start(request("gas smell near the furnace"), None)
            .await
            .unwrap();

        match outcome {
            TroubleshootStart::SafetyStopped {
                session_id,
                risk_level,
                recommended_professional,
                safety_message,
            } => {
                assert_eq!(risk_level, RiskLevel::High);
                assert!(recommended_professional.contains("gas"));
                assert!(safety_message.contains("SAFETY ALERT"));

                let session = store.get(&session_id).unwrap().unwrap();
                assert_eq!(session.phase, SessionPhase::SafetyStopped);
                assert!(session.followup_questions.is_empty());
            }
            TroubleshootStart::AwaitingFollowup { .. } => panic!("expected safety stop"),
        }
    }

    #[tokio::test]
    async fn test_submit_answers_to_stopped_session_is_invalid_phase() {
        let llm = QueuedLlm::new(vec![]);
        let (engine, _store) = engine_with(llm).await;

        let outcome = engine
            .start(request("gas smell near the furnace"), None)
            .await
            .unwrap();
        let TroubleshootStart::SafetyStopped { session_id, .. } = outcome else {
            panic!("expected safety stop");
        };

        let err = engine
            .submit_answers(&session_id, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSessionPhase { .. }));
    }

    #[tokio::test]
    async fn test_full_diagnosis_flow() {
        let llm = QueuedLlm::new(vec![
            Ok(RISK_LOW.to_string()),
            Ok(FOLLOWUPS.to_string()),
            Ok(RISK_LOW.to_string()),
            Ok(DIAGNOSIS.to_string()),
        ]);
        let (engine, store) = engine_with(llm).await;

        let outcome = engine
            .start(request("Furnace troubleshooting thermostat filter"), None)
            .await
            .unwrap();
        let TroubleshootStart::AwaitingFollowup { session_id, .. } = outcome else {
            panic!("expected follow-ups");
        };

        let answers = vec![
            FollowupAnswer {
                question_id: "q1".to_string(),
                answer: "Yes".to_string(),
            },
            FollowupAnswer {
                question_id: "q2".to_string(),
                answer: "A clicking noise".to_string(),
            },
        ];

        let outcome = engine.submit_answers(&session_id, answers).await.unwrap();
        let DiagnosisOutcome::Complete(diagnosis) = outcome else {
            panic!("expected a completed diagnosis");
        };

        assert_eq!(diagnosis.diagnostic_steps.len(), 3);
        assert!(diagnosis.markdown.contains("# Troubleshooting Diagnosis"));
        assert!(diagnosis.markdown.contains("Step 1"));
        assert!(diagnosis
            .markdown
            .contains("When to Call a Professional"));

        // Grounded source kept, fabricated one dropped
        assert_eq!(diagnosis.sources_used, vec!["Furnace-OM9GFRC-02.pdf"]);
        assert!(diagnosis.diagnostic_steps[1].source_doc.is_none());
        assert_eq!(diagnosis.citations.len(), 1);

        let session = store.get(&session_id).unwrap().unwrap();
        assert_eq!(session.phase, SessionPhase::Complete);
    }

    #[tokio::test]
    async fn test_resubmission_after_complete_is_invalid_phase() {
        let llm = QueuedLlm::new(vec![
            Ok(RISK_LOW.to_string()),
            Ok(FOLLOWUPS.to_string()),
            Ok(RISK_LOW.to_string()),
            Ok(DIAGNOSIS.to_string()),
        ]);
        let (engine, _store) = engine_with(llm).await;

        let TroubleshootStart::AwaitingFollowup { session_id, .. } = engine
            .start(request("Furnace troubleshooting thermostat filter"), None)
            .await
            .unwrap()
        else {
            panic!("expected follow-ups");
        };

        let answers = vec![FollowupAnswer {
            question_id: "q1".to_string(),
            answer: "Yes".to_string(),
        }];

        engine
            .submit_answers(&session_id, answers.clone())
            .await
            .unwrap();

        // Same call again must fail, not silently regenerate
        let err = engine
            .submit_answers(&session_id, answers)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSessionPhase { .. }));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let llm = QueuedLlm::new(vec![]);
        let (engine, _store) = engine_with(llm).await;

        let err = engine
            .submit_answers("no-such-session", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_answers_can_newly_trigger_stop() {
        let llm = QueuedLlm::new(vec![Ok(RISK_LOW.to_string()), Ok(FOLLOWUPS.to_string())]);
        let (engine, store) = engine_with(llm).await;

        let TroubleshootStart::AwaitingFollowup { session_id, .. } = engine
            .start(request("Furnace troubleshooting thermostat filter"), None)
            .await
            .unwrap()
        else {
            panic!("expected follow-ups");
        };

        let answers = vec![FollowupAnswer {
            question_id: "q2".to_string(),
            answer: "Now that you ask, I smell gas near it".to_string(),
        }];

        let outcome = engine.submit_answers(&session_id, answers).await.unwrap();
        match outcome {
            DiagnosisOutcome::SafetyStopped {
                recommended_professional,
                ..
            } => {
                assert!(recommended_professional.contains("gas"));
                let session = store.get(&session_id).unwrap().unwrap();
                assert_eq!(session.phase, SessionPhase::SafetyStopped);
            }
            DiagnosisOutcome::Complete(_) => panic!("expected safety stop"),
        }
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_session_awaiting() {
        let llm = QueuedLlm::new(vec![
            Ok(RISK_LOW.to_string()),
            Ok(FOLLOWUPS.to_string()),
            Ok(RISK_LOW.to_string()),
            Err("provider exploded".to_string()),
            // retry succeeds
            Ok(RISK_LOW.to_string()),
            Ok(DIAGNOSIS.to_string()),
        ]);
        let (engine, store) = engine_with(llm).await;

        let TroubleshootStart::AwaitingFollowup { session_id, .. } = engine
            .start(request("Furnace troubleshooting thermostat filter"), None)
            .await
            .unwrap()
        else {
            panic!("expected follow-ups");
        };

        let answers = vec![FollowupAnswer {
            question_id: "q1".to_string(),
            answer: "Yes".to_string(),
        }];

        let err = engine
            .submit_answers(&session_id, answers.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));

        // No partial state: still awaiting follow-up, so a retry works
        let session = store.get(&session_id).unwrap().unwrap();
        assert_eq!(session.phase, SessionPhase::AwaitingFollowup);

        let outcome = engine.submit_answers(&session_id, answers).await.unwrap();
        assert!(matches!(outcome, DiagnosisOutcome::Complete(_)));
    }

    #[tokio::test]
    async fn test_high_risk_step_forces_overall_high() {
        let diagnosis_with_high_step = DIAGNOSIS.replace(
            r#""step_number": 3, "instruction": "If the issue persists, call a licensed HVAC technician", "expected_outcome": "Professional diagnosis", "if_not_resolved": "Follow their advice", "risk_level": "MED""#,
            r#""step_number": 3, "instruction": "Call a licensed HVAC technician to inspect the gas valve", "expected_outcome": "Professional diagnosis", "if_not_resolved": "Follow their advice", "risk_level": "HIGH""#,
        );

        let llm = QueuedLlm::new(vec![
            Ok(RISK_LOW.to_string()),
            Ok(FOLLOWUPS.to_string()),
            Ok(RISK_LOW.to_string()),
            Ok(diagnosis_with_high_step),
        ]);
        let (engine, _store) = engine_with(llm).await;

        let TroubleshootStart::AwaitingFollowup { session_id, .. } = engine
            .start(request("Furnace troubleshooting thermostat filter"), None)
            .await
            .unwrap()
        else {
            panic!("expected follow-ups");
        };

        let outcome = engine
            .submit_answers(
                &session_id,
                vec![FollowupAnswer {
                    question_id: "q1".to_string(),
                    answer: "No".to_string(),
                }],
            )
            .await
            .unwrap();

        let DiagnosisOutcome::Complete(diagnosis) = outcome else {
            panic!("expected a completed diagnosis");
        };
        // Session-level assessment said MED at most; the HIGH step wins
        assert_eq!(diagnosis.overall_risk_level, RiskLevel::High);
    }

    #[test]
    fn test_normalize_device_type() {
        assert_eq!(normalize_device_type("Furnace"), "furnace");
        assert_eq!(normalize_device_type("water heater"), "water_heater");
        assert_eq!(normalize_device_type("  HRV "), "hrv");
    }
}
