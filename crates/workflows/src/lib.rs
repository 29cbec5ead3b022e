//! HomeOps Workflows Library
//!
//! The three advisory workflows over the retrieval and safety layers:
//! - Troubleshooting: a phased state machine split across two client
//!   invocations (intake → risk gate → follow-up or stop → diagnosis),
//!   with session state held between them
//! - Maintenance planning: linear, season-driven checklist generation
//! - Parts lookup: linear with a clarification branch
//!
//! Plus the house profile model and the session store the troubleshooter
//! persists its in-flight state in.

pub mod maintenance;
pub mod parts;
pub mod profile;
pub mod session;
pub mod troubleshoot;

pub use maintenance::{ChecklistItem, MaintenancePlan, MaintenancePlanOutcome, MaintenancePlanner};
pub use parts::{
    ClarificationQuestion, ConfidenceLevel, PartRecommendation, PartsHelper, PartsLookup,
};
pub use profile::{ClimateZone, HouseProfile, HouseType, InstalledSystem, Season};
pub use session::{MemorySessionStore, SessionPhase, SessionStore, WorkflowSession};
pub use troubleshoot::TroubleshootEngine;
