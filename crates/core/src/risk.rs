//! Risk level classification shared across the copilot.

use serde::{Deserialize, Serialize};

/// Risk level for home maintenance advice.
///
/// Used to classify the safety risk of following advice:
/// - `Low`: safe for any homeowner to do themselves
/// - `Med`: requires some caution or basic skills
/// - `High`: involves gas, electrical, structural, or safety-critical work
///
/// The derived ordering is Low < Med < High, so combining layered
/// assessments is `level.max(other)` — an escalation can never lower
/// an already-high verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Med,
    High,
}

impl RiskLevel {
    /// Get the canonical uppercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Med => "MED",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
