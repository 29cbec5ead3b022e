//! Risk assessment types.

use crate::registry::HazardKind;
use homeops_core::RiskLevel;
use serde::{Deserialize, Serialize};

/// The combined verdict of the two-layer risk classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Final risk level: max of the deterministic and model layers
    pub level: RiskLevel,

    /// Hazard categories fired by the deterministic layer
    pub triggered: Vec<HazardKind>,

    /// Whether the workflow must stop before any DIY guidance
    pub is_safety_stop: bool,

    /// Professional to refer to when stopping
    pub professional: Option<String>,

    /// Safety message shown on a stop
    pub safety_message: Option<String>,
}

impl RiskAssessment {
    /// A clear (non-stop) assessment at the given level.
    pub fn clear(level: RiskLevel) -> Self {
        Self {
            level,
            triggered: Vec::new(),
            is_safety_stop: false,
            professional: None,
            safety_message: None,
        }
    }
}
