//! Schema-constrained completion.
//!
//! The risk classifier and the workflow generators all need responses
//! that deserialize into a known shape. This module forces JSON output
//! from the provider and decodes it into the caller's serde type.

use crate::client::{LlmClient, LlmRequest};
use homeops_core::{AppError, AppResult};
use serde::de::DeserializeOwned;

/// Complete a request and decode the response into `T`.
///
/// The request is forced into JSON output mode before being sent.
/// The caller's system prompt should describe the expected fields;
/// the format constraint guarantees syntactically valid JSON, decoding
/// into `T` enforces the schema.
///
/// Provider errors and undecodable responses both surface as
/// `AppError::Llm` — callers decide whether that is request-fatal
/// (generation) or triggers a deterministic fallback (risk Layer 2).
pub async fn complete_structured<T: DeserializeOwned>(
    client: &dyn LlmClient,
    request: &LlmRequest,
) -> AppResult<T> {
    let mut request = request.clone();
    request.format = Some("json".to_string());

    let response = client.complete(&request).await?;

    let payload = strip_code_fences(&response.content);

    serde_json::from_str(payload).map_err(|e| {
        AppError::Llm(format!(
            "Structured response did not match expected schema: {}",
            e
        ))
    })
}

/// Strip markdown code fences some models wrap around JSON payloads.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();

    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);

    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
