//! Session store for the two-invocation troubleshooting workflow.
//!
//! A session is created at intake and consumed by the diagnosis call.
//! The store is a keyed map with phase-checked reads: callers name the
//! phase they expect, and a mismatch is a caller-usage error, never a
//! silent regeneration.
//!
//! The in-memory implementation serializes access per key via `DashMap`
//! sharding — requests for different session ids do not contend. Sessions
//! are evicted after a TTL to bound memory; eviction happens
//! opportunistically on store access, there are no background workers.

use crate::troubleshoot::models::{FollowupAnswer, FollowupQuestion};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use homeops_core::{AppError, AppResult};
use homeops_retrieval::RetrievalResult;
use homeops_safety::RiskAssessment;
use serde::{Deserialize, Serialize};

/// Phase of a multi-invocation workflow session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Intake is being processed (transient)
    Intake,

    /// Follow-up questions issued; waiting for the second invocation
    AwaitingFollowup,

    /// The risk gate fired; no DIY guidance will ever be generated
    SafetyStopped,

    /// Diagnosis generation in flight (transient, never persisted)
    Diagnosing,

    /// Diagnosis delivered
    Complete,
}

impl SessionPhase {
    /// Stable tag used in errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::AwaitingFollowup => "awaiting_followup",
            Self::SafetyStopped => "safety_stopped",
            Self::Diagnosing => "diagnosing",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-flight troubleshooting state held between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub session_id: String,
    pub phase: SessionPhase,

    /// Normalized device type from intake
    pub device_type: String,

    /// Reported symptom text
    pub symptom: String,

    /// Reported urgency ("low", "medium", "high", "emergency")
    pub urgency: String,

    /// Optional additional context from intake
    pub additional_context: Option<String>,

    /// Passages retrieved at intake; the diagnosis call reuses them
    pub retrieval: RetrievalResult,

    /// Follow-up questions issued at intake
    pub followup_questions: Vec<FollowupQuestion>,

    /// Answers accumulated by the second invocation
    pub followup_answers: Vec<FollowupAnswer>,

    /// Risk assessment from intake
    pub risk: RiskAssessment,

    /// Preliminary assessment text from follow-up generation
    pub preliminary_assessment: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Keyed session store contract.
///
/// The contract (get/put/delete by id, phase-checked reads) must hold for
/// any backend; the reference implementation is in-memory.
pub trait SessionStore: Send + Sync {
    /// Insert or replace a session.
    fn put(&self, session: WorkflowSession) -> AppResult<()>;

    /// Fetch a session by id.
    fn get(&self, session_id: &str) -> AppResult<Option<WorkflowSession>>;

    /// Remove a session by id.
    fn delete(&self, session_id: &str) -> AppResult<()>;

    /// Fetch a session, requiring it to be in the expected phase.
    ///
    /// Missing sessions surface as `SessionNotFound`; phase mismatches as
    /// `InvalidSessionPhase` naming both phases.
    fn get_in_phase(
        &self,
        session_id: &str,
        expected: SessionPhase,
    ) -> AppResult<WorkflowSession> {
        let session = self
            .get(session_id)?
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;

        if session.phase != expected {
            return Err(AppError::InvalidSessionPhase {
                session_id: session_id.to_string(),
                expected: expected.as_str().to_string(),
                actual: session.phase.as_str().to_string(),
            });
        }

        Ok(session)
    }
}

/// In-memory session store with TTL eviction.
pub struct MemorySessionStore {
    sessions: DashMap<String, WorkflowSession>,
    ttl: Duration,
}

impl MemorySessionStore {
    /// Create a store with the given TTL in seconds.
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Number of live (non-expired) sessions.
    pub fn len(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        self.sessions
            .iter()
            .filter(|entry| entry.created_at > cutoff)
            .count()
    }

    /// Whether the store holds no live sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(&self) {
        let cutoff = Utc::now() - self.ttl;
        self.sessions.retain(|_, session| {
            let live = session.created_at > cutoff;
            if !live {
                tracing::debug!("Evicting expired session {}", session.session_id);
            }
            live
        });
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, session: WorkflowSession) -> AppResult<()> {
        self.purge_expired();
        self.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    fn get(&self, session_id: &str) -> AppResult<Option<WorkflowSession>> {
        let Some(session) = self.sessions.get(session_id).map(|r| r.clone()) else {
            return Ok(None);
        };

        if session.created_at <= Utc::now() - self.ttl {
            drop(self.sessions.remove(session_id));
            return Ok(None);
        }

        Ok(Some(session))
    }

    fn delete(&self, session_id: &str) -> AppResult<()> {
        self.sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homeops_core::RiskLevel;

    fn session(session_id: &str, phase: SessionPhase) -> WorkflowSession {
        WorkflowSession {
            session_id: session_id.to_string(),
            phase,
            device_type: "furnace".to_string(),
            symptom: "No heat".to_string(),
            urgency: "medium".to_string(),
            additional_context: None,
            retrieval: RetrievalResult {
                passages: Vec::new(),
                sufficient: true,
                filter_applied: None,
            },
            followup_questions: Vec::new(),
            followup_answers: Vec::new(),
            risk: RiskAssessment::clear(RiskLevel::Low),
            preliminary_assessment: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_put_get_roundtrip() {
        let store = MemorySessionStore::new(3600);
        store.put(session("s1", SessionPhase::AwaitingFollowup)).unwrap();

        let fetched = store.get("s1").unwrap().unwrap();
        assert_eq!(fetched.session_id, "s1");
        assert_eq!(fetched.phase, SessionPhase::AwaitingFollowup);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = MemorySessionStore::new(3600);
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_get_in_phase_missing_is_not_found() {
        let store = MemorySessionStore::new(3600);
        let err = store
            .get_in_phase("missing", SessionPhase::AwaitingFollowup)
            .unwrap_err();
        assert!(matches!(err, AppError::SessionNotFound(_)));
    }

    #[test]
    fn test_get_in_phase_mismatch_is_invalid_phase() {
        let store = MemorySessionStore::new(3600);
        store.put(session("s1", SessionPhase::Complete)).unwrap();

        let err = store
            .get_in_phase("s1", SessionPhase::AwaitingFollowup)
            .unwrap_err();

        match err {
            AppError::InvalidSessionPhase {
                expected, actual, ..
            } => {
                assert_eq!(expected, "awaiting_followup");
                assert_eq!(actual, "complete");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_expired_session_is_evicted_on_get() {
        let store = MemorySessionStore::new(0);
        let mut expired = session("old", SessionPhase::AwaitingFollowup);
        expired.created_at = Utc::now() - Duration::seconds(10);
        store.sessions.insert("old".to_string(), expired);

        assert!(store.get("old").unwrap().is_none());
        let err = store
            .get_in_phase("old", SessionPhase::AwaitingFollowup)
            .unwrap_err();
        assert!(matches!(err, AppError::SessionNotFound(_)));
    }

    #[test]
    fn test_put_purges_expired_sessions() {
        let store = MemorySessionStore::new(0);
        let mut expired = session("old", SessionPhase::AwaitingFollowup);
        expired.created_at = Utc::now() - Duration::seconds(10);
        store.sessions.insert("old".to_string(), expired);

        store.put(session("new", SessionPhase::AwaitingFollowup)).unwrap();
        assert!(!store.sessions.contains_key("old"));
    }

    #[test]
    fn test_delete_removes_session() {
        let store = MemorySessionStore::new(3600);
        store.put(session("s1", SessionPhase::Complete)).unwrap();
        store.delete("s1").unwrap();
        assert!(store.get("s1").unwrap().is_none());
    }

    #[test]
    fn test_replace_updates_phase() {
        let store = MemorySessionStore::new(3600);
        store.put(session("s1", SessionPhase::AwaitingFollowup)).unwrap();

        let mut updated = session("s1", SessionPhase::Complete);
        updated.created_at = store.get("s1").unwrap().unwrap().created_at;
        store.put(updated).unwrap();

        assert_eq!(
            store.get("s1").unwrap().unwrap().phase,
            SessionPhase::Complete
        );
    }
}
