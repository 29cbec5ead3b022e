//! Troubleshooting command handler.
//!
//! Runs both workflow invocations in one interactive sitting: intake
//! first, then — unless the risk gate stopped the session — the user's
//! answers to the follow-up questions are collected from stdin and
//! submitted for diagnosis.

use clap::Args;
use homeops_core::{AppConfig, AppResult, RiskLevel};
use homeops_llm::LlmClient;
use homeops_safety::RiskClassifier;
use homeops_workflows::troubleshoot::{
    DiagnosisOutcome, FollowupAnswer, FollowupQuestion, TroubleshootRequest, TroubleshootStart,
};
use homeops_workflows::{MemorySessionStore, TroubleshootEngine};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Guided troubleshooting with safety guardrails
#[derive(Args, Debug)]
pub struct TroubleshootCommand {
    /// Device type (e.g., "furnace", "water heater")
    #[arg(short, long)]
    pub device: String,

    /// What's wrong, in your own words
    #[arg(short, long)]
    pub symptom: String,

    /// Urgency: low, medium, high, or emergency
    #[arg(short, long, default_value = "medium")]
    pub urgency: String,

    /// Any additional context
    #[arg(long)]
    pub context: Option<String>,

    /// Path to house profile JSON (default: .homeops/house_profile.json)
    #[arg(long)]
    pub profile: Option<PathBuf>,
}

impl TroubleshootCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let retriever = super::build_retriever(config).await?;
        let llm: Arc<dyn LlmClient> = super::build_llm(config)?;
        let profile = super::load_profile(config, self.profile.as_ref())?;

        let classifier = Arc::new(RiskClassifier::new(llm.clone(), &config.model));
        let store = Arc::new(MemorySessionStore::new(config.session.ttl_secs));
        let engine = TroubleshootEngine::new(retriever, classifier, llm, store, &config.model);

        let request = TroubleshootRequest {
            device_type: self.device.clone(),
            symptom: self.symptom.clone(),
            urgency: self.urgency.clone(),
            additional_context: self.context.clone(),
        };

        let start = engine.start(request, profile.as_ref()).await?;

        let (session_id, questions) = match start {
            TroubleshootStart::SafetyStopped {
                risk_level,
                safety_message,
                recommended_professional,
                ..
            } => {
                print_safety_stop(risk_level, &safety_message, &recommended_professional);
                return Ok(());
            }
            TroubleshootStart::AwaitingFollowup {
                session_id,
                followup_questions,
                preliminary_assessment,
                ..
            } => {
                println!("Preliminary assessment: {}", preliminary_assessment);
                println!();
                (session_id, followup_questions)
            }
        };

        let answers = collect_answers(&questions)?;

        match engine.submit_answers(&session_id, answers).await? {
            DiagnosisOutcome::SafetyStopped {
                risk_level,
                safety_message,
                recommended_professional,
                ..
            } => {
                print_safety_stop(risk_level, &safety_message, &recommended_professional);
            }
            DiagnosisOutcome::Complete(diagnosis) => {
                println!();
                println!("{}", diagnosis.markdown);
            }
        }

        Ok(())
    }
}

fn print_safety_stop(risk_level: RiskLevel, safety_message: &str, professional: &str) {
    println!("{}", safety_message);
    println!();
    println!("Risk level: {}", risk_level);
    println!("Contact: {}", professional);
}

/// Prompt for answers to each follow-up question on stdin.
fn collect_answers(questions: &[FollowupQuestion]) -> AppResult<Vec<FollowupAnswer>> {
    let stdin = std::io::stdin();
    let mut answers = Vec::with_capacity(questions.len());

    println!("A few questions to narrow this down:");
    println!();

    for question in questions {
        println!("{} ({})", question.question, question.why);
        if let Some(options) = &question.options {
            println!("  Options: {}", options.join(" / "));
        }
        print!("> ");
        std::io::stdout().flush()?;

        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;
        let answer = answer.trim().to_string();

        if !answer.is_empty() {
            answers.push(FollowupAnswer {
                question_id: question.id.clone(),
                answer,
            });
        }
    }

    Ok(answers)
}
