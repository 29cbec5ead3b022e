//! Citation resolution.
//!
//! Generated answers cite their sources with free-form markers. This module
//! maps each marker back to an actual retrieved passage and drops markers
//! that match nothing — a citation that cannot be grounded in the passages
//! fed to the model must never surface to the user.
//!
//! Resolution is pure and side-effect-free. Each marker yields an explicit
//! resolved/unresolved result so callers (and tests) can see why a marker
//! was dropped rather than inferring it from an absence.

use crate::types::RetrievalResult;
use serde::{Deserialize, Serialize};

/// A citation as authored by the model: an unverified source marker plus
/// whatever locator details it chose to include.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCitation {
    /// Free-form source marker ("Source 2", "[Source 1]",
    /// "Furnace-OM9GFRC-02.pdf - OM9GFRC", ...)
    pub source: String,

    /// Page number if the model provided one
    #[serde(default)]
    pub page: Option<u32>,

    /// Section name if the model provided one
    #[serde(default)]
    pub section: Option<String>,

    /// Supporting quote if the model provided one
    #[serde(default)]
    pub quote: Option<String>,
}

/// A grounded citation. Only ever derived from a passage in the same
/// retrieval result that fed the generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Source document name, resolved against the retrieved passages
    pub source_doc: String,

    /// Page number carried over from the model's citation
    #[serde(default)]
    pub page: Option<u32>,

    /// Section carried over from the model's citation, falling back to
    /// the passage's own section title
    #[serde(default)]
    pub section: Option<String>,

    /// Supporting quote carried over from the model's citation
    #[serde(default)]
    pub quote: Option<String>,
}

/// Why a marker failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnresolvedReason {
    /// "Source N" referenced an index outside the passage list
    IndexOutOfRange,

    /// The marker matched no retrieved passage by any strategy
    NoMatchingPassage,

    /// Retrieval was insufficient, so there was nothing to ground against
    InsufficientRetrieval,
}

/// Per-marker resolution outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CitationMatch {
    /// The marker resolved to a retrieved passage
    Resolved(Citation),

    /// The marker could not be grounded and will be dropped
    Unresolved {
        marker: String,
        reason: UnresolvedReason,
    },
}

impl CitationMatch {
    /// The resolved citation, if any.
    pub fn citation(&self) -> Option<&Citation> {
        match self {
            Self::Resolved(citation) => Some(citation),
            Self::Unresolved { .. } => None,
        }
    }
}

/// Resolve raw model citations against a retrieval result.
///
/// Matching strategies per marker, attempted in order:
/// (a) "Source N" / "[Source N]" — 1-based index into the passage list
///     as ordered in the generation prompt;
/// (b) "<file> - <device>" — the exact label format used in the prompt;
/// (c) substring — the marker contains a passage's source document name.
pub fn resolve_citations(
    raw_citations: &[RawCitation],
    retrieval: &RetrievalResult,
) -> Vec<CitationMatch> {
    raw_citations
        .iter()
        .map(|raw| resolve_one(raw, retrieval))
        .collect()
}

/// Extract just the grounded citations, in marker order.
pub fn resolved_citations(matches: &[CitationMatch]) -> Vec<Citation> {
    matches
        .iter()
        .filter_map(|m| m.citation().cloned())
        .collect()
}

fn resolve_one(raw: &RawCitation, retrieval: &RetrievalResult) -> CitationMatch {
    if !retrieval.sufficient || retrieval.passages.is_empty() {
        return CitationMatch::Unresolved {
            marker: raw.source.clone(),
            reason: UnresolvedReason::InsufficientRetrieval,
        };
    }

    let marker = raw.source.trim();

    // (a) "Source N" index reference
    if let Some(index) = parse_source_index(marker) {
        return match retrieval.passages.get(index.wrapping_sub(1)) {
            Some(passage) if index >= 1 => CitationMatch::Resolved(build_citation(raw, passage)),
            _ => {
                tracing::debug!(
                    "Dropping citation '{}': source index {} out of range ({} passages)",
                    marker,
                    index,
                    retrieval.passages.len()
                );
                CitationMatch::Unresolved {
                    marker: raw.source.clone(),
                    reason: UnresolvedReason::IndexOutOfRange,
                }
            }
        };
    }

    // (b) "<file> - <device>" label match
    for passage in &retrieval.passages {
        if marker.eq_ignore_ascii_case(&passage.source_label()) {
            return CitationMatch::Resolved(build_citation(raw, passage));
        }
    }

    // (c) substring match on the source document name
    let marker_lower = marker.to_lowercase();
    for passage in &retrieval.passages {
        if marker_lower.contains(&passage.source_doc.to_lowercase()) {
            return CitationMatch::Resolved(build_citation(raw, passage));
        }
    }

    tracing::debug!("Dropping citation '{}': no matching passage", marker);
    CitationMatch::Unresolved {
        marker: raw.source.clone(),
        reason: UnresolvedReason::NoMatchingPassage,
    }
}

/// Parse "Source N" or "[Source N]" into the 1-based index N.
fn parse_source_index(marker: &str) -> Option<usize> {
    let inner = marker
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();

    let rest = inner
        .strip_prefix("Source ")
        .or_else(|| inner.strip_prefix("source "))?;

    rest.trim().parse::<usize>().ok()
}

fn build_citation(raw: &RawCitation, passage: &crate::types::Passage) -> Citation {
    Citation {
        source_doc: passage.source_doc.clone(),
        page: raw.page,
        section: raw.section.clone().or_else(|| passage.section.clone()),
        quote: raw.quote.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Passage;

    fn passage(source_doc: &str, device_name: Option<&str>) -> Passage {
        Passage {
            text: "text".to_string(),
            source_doc: source_doc.to_string(),
            section: Some("Maintenance".to_string()),
            device_type: Some("furnace".to_string()),
            device_name: device_name.map(str::to_string),
            manufacturer: None,
            score: 0.8,
        }
    }

    fn retrieval(passages: Vec<Passage>) -> RetrievalResult {
        RetrievalResult {
            passages,
            sufficient: true,
            filter_applied: None,
        }
    }

    fn raw(source: &str) -> RawCitation {
        RawCitation {
            source: source.to_string(),
            page: None,
            section: None,
            quote: None,
        }
    }

    #[test]
    fn test_resolves_by_source_index() {
        let result = retrieval(vec![
            passage("manual.pdf", Some("Furnace")),
            passage("guide.pdf", Some("HRV")),
        ]);

        let matches = resolve_citations(&[raw("Source 2")], &result);
        let citations = resolved_citations(&matches);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].source_doc, "guide.pdf");
    }

    #[test]
    fn test_resolves_bracketed_source_index() {
        let result = retrieval(vec![passage("manual.pdf", Some("Furnace"))]);

        let matches = resolve_citations(&[raw("[Source 1]")], &result);
        assert!(matches!(matches[0], CitationMatch::Resolved(_)));
    }

    #[test]
    fn test_out_of_range_index_is_dropped_with_reason() {
        let result = retrieval(vec![
            passage("a.pdf", None),
            passage("b.pdf", None),
            passage("c.pdf", None),
        ]);

        let matches = resolve_citations(&[raw("Source 7")], &result);

        assert!(matches!(
            &matches[0],
            CitationMatch::Unresolved {
                reason: UnresolvedReason::IndexOutOfRange,
                ..
            }
        ));
        assert!(resolved_citations(&matches).is_empty());
    }

    #[test]
    fn test_resolves_file_device_label() {
        let result = retrieval(vec![passage("furnace-manual.pdf", Some("OM9GFRC"))]);

        let matches = resolve_citations(&[raw("furnace-manual.pdf - OM9GFRC")], &result);
        let citations = resolved_citations(&matches);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].source_doc, "furnace-manual.pdf");
    }

    #[test]
    fn test_resolves_by_substring() {
        let result = retrieval(vec![passage("manual.pdf", None)]);

        let matches = resolve_citations(&[raw("From manual.pdf page 5")], &result);
        assert!(matches!(matches[0], CitationMatch::Resolved(_)));
    }

    #[test]
    fn test_unmatched_marker_is_dropped_with_reason() {
        let result = retrieval(vec![passage("real-doc.pdf", None)]);

        let matches = resolve_citations(&[raw("fake-doc.pdf")], &result);

        assert!(matches!(
            &matches[0],
            CitationMatch::Unresolved {
                reason: UnresolvedReason::NoMatchingPassage,
                ..
            }
        ));
    }

    #[test]
    fn test_insufficient_retrieval_resolves_nothing() {
        let result = RetrievalResult::insufficient(None);

        let matches = resolve_citations(&[raw("Source 1"), raw("manual.pdf")], &result);

        assert_eq!(matches.len(), 2);
        assert!(resolved_citations(&matches).is_empty());
        assert!(matches.iter().all(|m| matches!(
            m,
            CitationMatch::Unresolved {
                reason: UnresolvedReason::InsufficientRetrieval,
                ..
            }
        )));
    }

    #[test]
    fn test_preserves_model_provided_locators() {
        let result = retrieval(vec![passage("manual.pdf", None)]);
        let raw_citation = RawCitation {
            source: "Source 1".to_string(),
            page: Some(10),
            section: Some("Filters".to_string()),
            quote: Some("Check filter monthly".to_string()),
        };

        let matches = resolve_citations(&[raw_citation], &result);
        let citations = resolved_citations(&matches);

        assert_eq!(citations[0].page, Some(10));
        assert_eq!(citations[0].section.as_deref(), Some("Filters"));
        assert_eq!(citations[0].quote.as_deref(), Some("Check filter monthly"));
    }

    #[test]
    fn test_falls_back_to_passage_section() {
        let result = retrieval(vec![passage("manual.pdf", None)]);

        let matches = resolve_citations(&[raw("Source 1")], &result);
        let citations = resolved_citations(&matches);

        assert_eq!(citations[0].section.as_deref(), Some("Maintenance"));
    }

    #[test]
    fn test_mixed_markers_keep_only_grounded() {
        let result = retrieval(vec![passage("real.pdf", None)]);

        let matches = resolve_citations(&[raw("real.pdf"), raw("fake.pdf")], &result);
        let citations = resolved_citations(&matches);

        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].source_doc, "real.pdf");
    }
}
