//! Retrieval type definitions.

use serde::{Deserialize, Serialize};

/// A text passage retrieved from the vector index.
///
/// Immutable once retrieved; scoped to a single retrieval call.
/// The score is the primary index similarity, dimensionless — it is only
/// ever compared against the configured thresholds, never interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Text content
    pub text: String,

    /// Source document name (e.g., "Furnace-OM9GFRC-02.pdf")
    pub source_doc: String,

    /// Section title within the document, when known
    pub section: Option<String>,

    /// Device type from document metadata (e.g., "furnace")
    pub device_type: Option<String>,

    /// Specific device model or name (e.g., "OM9GFRC")
    pub device_name: Option<String>,

    /// Brand/manufacturer name
    pub manufacturer: Option<String>,

    /// Relevance score from the primary index
    pub score: f32,
}

impl Passage {
    /// Human-readable source label used in prompt context and citations,
    /// e.g. "Furnace-OM9GFRC-02.pdf - OM9GFRC".
    pub fn source_label(&self) -> String {
        match self.device_name.as_deref() {
            Some(name) if !name.is_empty() => format!("{} - {}", self.source_doc, name),
            _ => self.source_doc.clone(),
        }
    }
}

/// A passage as stored in the index, with its embedding.
///
/// Produced by the passage loader; text extraction from the original
/// documents happens upstream of this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageRecord {
    /// Unique passage identifier
    pub id: String,

    /// Text content
    pub text: String,

    /// Source document name
    pub source_doc: String,

    /// Section title within the document
    #[serde(default)]
    pub section: Option<String>,

    /// Device type from document metadata
    #[serde(default)]
    pub device_type: Option<String>,

    /// Specific device model or name
    #[serde(default)]
    pub device_name: Option<String>,

    /// Brand/manufacturer name
    #[serde(default)]
    pub manufacturer: Option<String>,

    /// Embedding vector (populated before upsert)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl PassageRecord {
    /// View this record as a retrieved passage with the given score.
    pub fn to_passage(&self, score: f32) -> Passage {
        Passage {
            text: self.text.clone(),
            source_doc: self.source_doc.clone(),
            section: self.section.clone(),
            device_type: self.device_type.clone(),
            device_name: self.device_name.clone(),
            manufacturer: self.manufacturer.clone(),
            score,
        }
    }
}

/// Result of one retrieval call.
///
/// `sufficient == false` is a terminal "cannot answer" state: the passage
/// list is empty and callers must emit an insufficient-evidence response
/// instead of proceeding to generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Retrieved passages, ordered by relevance (ties keep index order)
    pub passages: Vec<Passage>,

    /// Whether the top score cleared the sufficiency floor
    pub sufficient: bool,

    /// Device-type filter that produced this result, if one survived
    /// the hybrid fallback (None = unfiltered)
    pub filter_applied: Option<Vec<String>>,
}

impl RetrievalResult {
    /// Build an insufficient-evidence result.
    pub fn insufficient(filter_applied: Option<Vec<String>>) -> Self {
        Self {
            passages: Vec::new(),
            sufficient: false,
            filter_applied,
        }
    }

    /// Top relevance score, 0.0 when empty.
    pub fn top_score(&self) -> f32 {
        self.passages.first().map(|p| p.score).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(source_doc: &str, device_name: Option<&str>, score: f32) -> Passage {
        Passage {
            text: "text".to_string(),
            source_doc: source_doc.to_string(),
            section: None,
            device_type: Some("furnace".to_string()),
            device_name: device_name.map(str::to_string),
            manufacturer: None,
            score,
        }
    }

    #[test]
    fn test_source_label_with_device_name() {
        let p = passage("manual.pdf", Some("OM9GFRC"), 0.9);
        assert_eq!(p.source_label(), "manual.pdf - OM9GFRC");
    }

    #[test]
    fn test_source_label_without_device_name() {
        let p = passage("notes.pdf", None, 0.9);
        assert_eq!(p.source_label(), "notes.pdf");
    }

    #[test]
    fn test_insufficient_result_is_empty() {
        let result = RetrievalResult::insufficient(Some(vec!["furnace".to_string()]));
        assert!(!result.sufficient);
        assert!(result.passages.is_empty());
        assert_eq!(result.top_score(), 0.0);
    }

    #[test]
    fn test_top_score_is_first_passage() {
        let result = RetrievalResult {
            passages: vec![passage("a.pdf", None, 0.8), passage("b.pdf", None, 0.5)],
            sufficient: true,
            filter_applied: None,
        };
        assert_eq!(result.top_score(), 0.8);
    }
}
