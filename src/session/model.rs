//! Session data model (spec §3), stored one JSON file per session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::{State, WorkflowType};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateHistoryEntry {
    pub from: State,
    pub to: State,
    pub at: DateTime<Utc>,
    pub tool: String,
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrInfo {
    pub number: u64,
    pub url: String,
    pub base: String,
    #[serde(default)]
    pub draft: bool,
}

/// The central entity (spec §3), one per active branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub branch_name: String,
    pub workflow_type: WorkflowType,
    pub state: State,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub state_history: Vec<StateHistoryEntry>,
    /// PR number/url, stash ref, severity, issue, initial-diff-summary, and
    /// the `skip_review` hotfix flag all live here rather than as dedicated
    /// fields, matching spec.md §3's "key/value bag" semantic type exactly.
    #[serde(default)]
    pub metadata: std::collections::BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub pr: Option<PrInfo>,
}

impl Session {
    pub fn new(branch_name: String, workflow_type: WorkflowType, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            branch_name,
            workflow_type,
            state: workflow_type.initial_state(),
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
            state_history: Vec::new(),
            metadata: std::collections::BTreeMap::new(),
            pr: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    pub fn metadata_bool(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Appends a `stateHistory` entry and advances `state`/`updated_at` in
    /// one place, so I3 ("each entry's `from` equals the previous entry's
    /// `to`") can never be violated by a tool body constructing entries by
    /// hand (spec.md §4 supplemental note).
    pub fn record_transition(&mut self, to: State, tool: &str, actor: &str) {
        let from = self.state;
        let at = Utc::now();
        self.state_history.push(StateHistoryEntry {
            from,
            to,
            at,
            tool: tool.to_string(),
            actor: actor.to_string(),
        });
        self.state = to;
        self.updated_at = at;
    }

    pub fn bump_expiry(&mut self, ttl: Duration) {
        self.expires_at = self.updated_at + ttl;
    }
}

/// On-disk envelope (spec.md §6 "Persisted state compatibility"). Unknown
/// fields round-trip via `extra` (P8), and `schema_version` lets a future
/// release detect and migrate older files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFile {
    pub schema_version: u32,
    #[serde(flatten)]
    pub session: Session,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionFile {
    pub fn new(session: Session) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            session,
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_workflow_initial_state() {
        let s = Session::new(
            "feature/x".to_string(),
            WorkflowType::Standard,
            Duration::days(7),
        );
        assert_eq!(s.state, State::Init);
        assert!(s.state_history.is_empty());
        assert!(!s.is_terminal());
    }

    #[test]
    fn record_transition_chains_from_to_previous_to() {
        let mut s = Session::new(
            "feature/x".to_string(),
            WorkflowType::Standard,
            Duration::days(7),
        );
        s.record_transition(State::BranchReady, "launch", "agent");
        s.record_transition(State::ChangesCommitted, "commit", "agent");
        assert_eq!(s.state_history[0].from, State::Init);
        assert_eq!(s.state_history[0].to, s.state_history[1].from);
        assert_eq!(s.state, State::ChangesCommitted);
    }

    #[test]
    fn session_file_round_trips_unknown_fields() {
        let s = Session::new(
            "feature/x".to_string(),
            WorkflowType::Standard,
            Duration::days(7),
        );
        let mut file = SessionFile::new(s);
        file.extra
            .insert("futureField".to_string(), serde_json::json!(42));
        let json = serde_json::to_string(&file).unwrap();
        let back: SessionFile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.extra.get("futureField"), Some(&serde_json::json!(42)));
    }
}
