//! HomeOps Safety Library
//!
//! Two-layer risk classification for home-equipment issues:
//! - Layer 1: deterministic matching against a static hazard registry
//!   (direct keywords plus co-occurrence groups). A match always wins.
//! - Layer 2: model-based assessment for nuanced phrasing. It may raise
//!   the risk level but can never downgrade a deterministic verdict.
//!
//! A safety stop is a business outcome, not an error: the classifier
//! always produces an assessment, falling back to the deterministic
//! verdict when the model is unavailable.

pub mod classifier;
pub mod registry;
pub mod types;

pub use classifier::RiskClassifier;
pub use registry::{scan_hazards, HazardCategory, HazardKind, HazardMatch, HAZARD_REGISTRY};
pub use types::RiskAssessment;
