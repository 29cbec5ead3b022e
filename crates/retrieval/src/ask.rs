//! Single-shot question answering.
//!
//! Retrieves relevant passages, gates on evidence sufficiency, generates a
//! structured answer, and resolves citations back to the retrieved passages.

use crate::citations::{resolve_citations, resolved_citations, Citation, RawCitation};
use crate::orchestrator::Retriever;
use crate::types::Passage;
use homeops_core::{AppResult, RiskLevel};
use homeops_llm::{complete_structured, LlmClient, LlmRequest};
use serde::{Deserialize, Serialize};

const ASK_SYSTEM_PROMPT: &str = "\
You are a home maintenance assistant. Answer questions about home maintenance, \
troubleshooting, and repairs using ONLY the provided document excerpts.

IMPORTANT RULES:
1. Assess risk level for every question:
   - LOW: Safe for any homeowner to do themselves
   - MED: Requires some caution or basic skills
   - HIGH: Involves gas, electrical, structural, or safety-critical work
2. If risk is HIGH, you MUST recommend calling a licensed professional (electrician, plumber, HVAC tech, etc.)
3. Be concise and actionable - homeowners want clear steps, not essays
4. If you don't have enough information to answer safely, say so - never guess on safety-critical topics
5. Cite the sources you used. Reference them by their [Source N] labels.

Respond with a JSON object containing:
- \"answer\": string, the concise answer
- \"risk_level\": \"LOW\", \"MED\", or \"HIGH\"
- \"reasoning\": string, why this risk level was assigned
- \"citations\": array of {\"source\": string, \"page\": number or null, \"section\": string or null, \"quote\": string or null}";

/// Structured answer from the model (internal shape, pre-resolution).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmAnswer {
    answer: String,
    risk_level: RiskLevel,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    citations: Vec<RawCitation>,
}

/// Outcome of an ask call.
///
/// Insufficient evidence is a normal outcome with its own variant, not an
/// error: clients render it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AskOutcome {
    /// The question was answered from the retrieved passages.
    Answered {
        answer: String,
        risk_level: RiskLevel,
        citations: Vec<Citation>,
        /// Retrieved passage texts, kept for evaluation
        contexts: Vec<String>,
    },

    /// Retrieval did not clear the sufficiency floor; no generation ran.
    InsufficientEvidence { query: String },
}

/// Answer a question over the document corpus.
///
/// When retrieval is insufficient, returns `InsufficientEvidence` without
/// calling the model — the gate runs before any generative step.
pub async fn answer(
    query: &str,
    profile_device_types: Option<Vec<String>>,
    retriever: &Retriever,
    llm: &dyn LlmClient,
    model: &str,
) -> AppResult<AskOutcome> {
    tracing::info!("Answering question: {}", query);

    let retrieval = retriever.retrieve(query, profile_device_types).await?;

    if !retrieval.sufficient {
        tracing::info!("Insufficient evidence for query, skipping generation");
        return Ok(AskOutcome::InsufficientEvidence {
            query: query.to_string(),
        });
    }

    let context = format_passages_as_context(&retrieval.passages);

    let user_prompt = format!(
        "User question:\n{}\n\nRelevant excerpts from the household documents:\n{}",
        query, context
    );

    let request = LlmRequest::new(user_prompt, model)
        .with_system(ASK_SYSTEM_PROMPT)
        .with_temperature(0.3)
        .with_max_tokens(1000);

    let llm_answer: LlmAnswer = complete_structured(llm, &request).await?;

    let matches = resolve_citations(&llm_answer.citations, &retrieval);
    let citations = resolved_citations(&matches);

    tracing::info!(
        "Answered with risk level {} ({} of {} citations grounded)",
        llm_answer.risk_level,
        citations.len(),
        llm_answer.citations.len()
    );

    Ok(AskOutcome::Answered {
        answer: llm_answer.answer,
        risk_level: llm_answer.risk_level,
        citations,
        contexts: retrieval.passages.iter().map(|p| p.text.clone()).collect(),
    })
}

/// Format passages as numbered context for the generation prompt.
///
/// The [Source N] labels are what citation markers resolve against, so the
/// numbering here and in the resolver must stay 1-based and in order.
pub fn format_passages_as_context(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return "No relevant documents found.".to_string();
    }

    let parts: Vec<String> = passages
        .iter()
        .enumerate()
        .map(|(i, passage)| {
            format!(
                "[Source {}: {}]\n{}",
                i + 1,
                passage.source_label(),
                passage.text
            )
        })
        .collect();

    parts.join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::mock::MockProvider;
    use crate::embeddings::EmbeddingProvider;
    use crate::store::{MemoryPassageStore, PassageStore};
    use crate::types::PassageRecord;
    use homeops_core::config::RetrievalSettings;
    use homeops_llm::{LlmResponse, LlmUsage};
    use std::sync::Arc;

    const DIM: usize = 256;

    /// Scripted LLM double returning a fixed JSON body.
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

    async fn retriever_with_furnace_doc() -> Retriever {
        let provider = MockProvider::new(DIM);
        let text = "Replace the furnace filter every three months with a MERV 11 filter.";
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
                manufacturer: Some("Carrier".to_string()),
                embedding: Some(embedding),
            }])
            .await
            .unwrap();

        Retriever::new(
            Arc::new(store),
            Arc::new(MockProvider::new(DIM)),
            RetrievalSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_answer_resolves_citations() {
        let retriever = retriever_with_furnace_doc().await;
        let llm = ScriptedLlm {
            body: r#"{"answer": "Use a MERV 11 filter, replaced every three months.", "risk_level": "LOW", "reasoning": "Routine filter change", "citations": [{"source": "Source 1"}]}"#.to_string(),
        };

        let outcome = answer("furnace filter replacement merv", None, &retriever, &llm, "m")
            .await
            .unwrap();

        match outcome {
            AskOutcome::Answered {
                risk_level,
                citations,
                ..
            } => {
                assert_eq!(risk_level, RiskLevel::Low);
                assert_eq!(citations.len(), 1);
                assert_eq!(citations[0].source_doc, "Furnace-OM9GFRC-02.pdf");
            }
            AskOutcome::InsufficientEvidence { .. } => panic!("expected an answer"),
        }
    }

    #[tokio::test]
    async fn test_hallucinated_citation_is_dropped() {
        let retriever = retriever_with_furnace_doc().await;
        let llm = ScriptedLlm {
            body: r#"{"answer": "ok", "risk_level": "LOW", "reasoning": "", "citations": [{"source": "fabricated-doc.pdf"}]}"#.to_string(),
        };

        let outcome = answer("furnace filter replacement merv", None, &retriever, &llm, "m")
            .await
            .unwrap();

        match outcome {
            AskOutcome::Answered { citations, .. } => assert!(citations.is_empty()),
            AskOutcome::InsufficientEvidence { .. } => panic!("expected an answer"),
        }
    }

    #[tokio::test]
    async fn test_insufficient_evidence_skips_generation() {
        let retriever = retriever_with_furnace_doc().await;
        // Scripted body would fail JSON parsing if the model were called;
        // reaching InsufficientEvidence proves it was not.
        let llm = ScriptedLlm {
            body: "not json".to_string(),
        };

        let outcome = answer(
            "zebra migration patterns serengeti",
            None,
            &retriever,
            &llm,
            "m",
        )
        .await
        .unwrap();

        assert!(matches!(outcome, AskOutcome::InsufficientEvidence { .. }));
    }

    #[test]
    fn test_format_passages_numbers_sources() {
        let passages = vec![
            Passage {
                text: "First".to_string(),
                source_doc: "a.pdf".to_string(),
                section: None,
                device_type: None,
                device_name: Some("Furnace".to_string()),
                manufacturer: None,
                score: 0.9,
            },
            Passage {
                text: "Second".to_string(),
                source_doc: "b.pdf".to_string(),
                section: None,
                device_type: None,
                device_name: None,
                manufacturer: None,
                score: 0.8,
            },
        ];

        let context = format_passages_as_context(&passages);
        assert!(context.contains("[Source 1: a.pdf - Furnace]"));
        assert!(context.contains("[Source 2: b.pdf]"));
        assert!(context.contains("---"));
    }

    #[test]
    fn test_format_empty_passages() {
        assert_eq!(
            format_passages_as_context(&[]),
            "No relevant documents found."
        );
    }
}
