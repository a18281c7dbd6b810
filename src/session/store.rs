//! Session Store (C3, spec §4.3): persistent `branch -> Session` mapping
//! under `<workspace>/.hansolo/sessions/`, one file per session, guarded by
//! per-session advisory locks and atomic write-temp-then-rename persistence
//! — the exact pattern the teacher keeps `tempfile` as a direct (not dev-only)
//! dependency for.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tempfile::NamedTempFile;
use uuid::Uuid;

use super::lock::SessionLock;
use super::model::{Session, SessionFile};
use crate::audit::{AuditEntry, AuditLog};
use crate::error::{HansoloError, HansoloResult};
use crate::workflow::Machine;

pub struct SessionStore {
    sessions_dir: PathBuf,
    lock_timeout: Duration,
    ttl: chrono::Duration,
    audit: AuditLog,
}

impl SessionStore {
    pub fn new(
        sessions_dir: PathBuf,
        lock_timeout: Duration,
        ttl: chrono::Duration,
        audit: AuditLog,
    ) -> Self {
        Self {
            sessions_dir,
            lock_timeout,
            ttl,
            audit,
        }
    }

    fn file_path(&self, session_id: Uuid) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    fn lock_path(&self, session_id: Uuid) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.lock"))
    }

    /// Branch name is the stable lookup key, but the on-disk filename is the
    /// session id (spec.md §6 layout). A directory scan keeps the mapping
    /// without a second index file to keep consistent.
    pub fn get(&self, branch: &str) -> HansoloResult<Option<Session>> {
        for session in self.read_all_files()? {
            if session.branch_name == branch {
                return Ok(Some(session));
            }
        }
        Ok(None)
    }

    fn get_by_id(&self, id: Uuid) -> HansoloResult<Option<Session>> {
        let path = self.file_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::read_file(&path)?))
    }

    fn read_file(path: &Path) -> HansoloResult<Session> {
        let data = std::fs::read_to_string(path).map_err(|e| HansoloError::Internal {
            message: format!("could not read session file {}: {e}", path.display()),
        })?;
        let file: SessionFile = serde_json::from_str(&data).map_err(|e| HansoloError::Internal {
            message: format!("corrupt session file {}: {e}", path.display()),
        })?;
        Ok(file.session)
    }

    fn read_all_files(&self) -> HansoloResult<Vec<Session>> {
        if !self.sessions_dir.exists() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        let entries = std::fs::read_dir(&self.sessions_dir).map_err(|e| HansoloError::Internal {
            message: format!("could not list sessions directory: {e}"),
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| HansoloError::Internal {
                message: format!("could not read sessions directory entry: {e}"),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                sessions.push(Self::read_file(&path)?);
            }
        }
        Ok(sessions)
    }

    pub fn list_active(&self) -> HansoloResult<Vec<Session>> {
        Ok(self
            .read_all_files()?
            .into_iter()
            .filter(|s| !s.is_terminal())
            .collect())
    }

    pub fn list_all(&self, include_terminal: bool) -> HansoloResult<Vec<Session>> {
        let all = self.read_all_files()?;
        if include_terminal {
            Ok(all)
        } else {
            Ok(all.into_iter().filter(|s| !s.is_terminal()).collect())
        }
    }

    /// Enforces I1: fails `AlreadyExists` if a non-terminal session for
    /// `branchName` already exists.
    pub fn create(&self, session: Session) -> HansoloResult<Session> {
        if let Some(existing) = self.get(&session.branch_name)? {
            if !existing.is_terminal() {
                return Err(HansoloError::AlreadyExists {
                    message: format!("active session already exists for {}", session.branch_name),
                });
            }
        }

        let lock_path = self.lock_path(session.id);
        let _lock = SessionLock::acquire(&lock_path, self.lock_timeout)?;
        self.persist(&session)?;
        self.audit.append(&AuditEntry {
            at: Utc::now(),
            session_id: Some(session.id),
            tool: "create".to_string(),
            input_summary: format!("branch={}", session.branch_name),
            outcome: "created".to_string(),
            check_report_digest: String::new(),
        })?;
        Ok(session)
    }

    /// The only way to change a session (spec.md §4.3). Acquires the
    /// session's exclusive lock, reads the current file, applies `f`,
    /// validates the resulting transition against the workflow's machine
    /// (I4), bumps `expiresAt` (spec.md §9, "bump on every successful
    /// mutation"), persists atomically, and appends an audit entry before
    /// releasing the lock.
    pub fn mutate<F>(&self, branch: &str, tool: &str, f: F) -> HansoloResult<Session>
    where
        F: FnOnce(&mut Session) -> HansoloResult<()>,
    {
        let existing = self
            .get(branch)?
            .ok_or_else(|| HansoloError::NotFound {
                message: format!("no session for branch {branch}"),
            })?;

        let lock_path = self.lock_path(existing.id);
        let _lock = SessionLock::acquire(&lock_path, self.lock_timeout)?;

        // Re-read under the lock: a concurrent writer may have changed the
        // file between the unlocked `get` above and acquiring the lock.
        let mut session = self
            .get_by_id(existing.id)?
            .ok_or_else(|| HansoloError::NotFound {
                message: format!("session {} disappeared mid-mutation", existing.id),
            })?;

        if session.is_terminal() {
            return Err(HansoloError::InvalidTransition {
                from: format!("{:?}", session.state),
                to: format!("{:?}", session.state),
                tool: tool.to_string(),
            });
        }

        let before_state = session.state;
        let before_history_len = session.state_history.len();

        f(&mut session)?;

        let new_entries = &session.state_history[before_history_len..];
        if let Some(first) = new_entries.first() {
            if first.from != before_state {
                return Err(HansoloError::InvalidTransition {
                    from: format!("{:?}", before_state),
                    to: format!("{:?}", first.to),
                    tool: first.tool.clone(),
                });
            }
        }
        for entry in new_entries {
            if !Machine::is_legal(session.workflow_type, entry.from, entry.to, &entry.tool) {
                return Err(HansoloError::InvalidTransition {
                    from: format!("{:?}", entry.from),
                    to: format!("{:?}", entry.to),
                    tool: entry.tool.clone(),
                });
            }
        }

        session.bump_expiry(self.ttl);
        self.persist(&session)?;

        self.audit.append(&AuditEntry {
            at: Utc::now(),
            session_id: Some(session.id),
            tool: tool.to_string(),
            input_summary: format!("branch={branch}"),
            outcome: format!("{:?}", session.state),
            check_report_digest: String::new(),
        })?;

        Ok(session)
    }

    /// Removes a single session file outright, regardless of TTL. Used by
    /// `tools::cleanup` once it has independently established a session's
    /// branch is merged into main — a criterion this store cannot evaluate
    /// itself since it has no `GitAdapter`.
    pub fn remove(&self, session_id: Uuid) -> HansoloResult<bool> {
        let path = self.file_path(session_id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| HansoloError::Internal {
            message: format!("could not remove session file: {e}"),
        })?;
        Ok(true)
    }

    /// Remove terminal sessions past TTL or whose branch no longer exists
    /// locally. Branch existence is the caller's responsibility to check
    /// (this store has no `GitAdapter`); `tools::cleanup` drives this with
    /// the set of branches still present.
    pub fn expire(&self, branch_still_exists: impl Fn(&str) -> bool) -> HansoloResult<usize> {
        let now = Utc::now();
        let mut removed = 0;
        for session in self.read_all_files()? {
            let past_ttl = session.is_terminal() && now > session.expires_at;
            let branch_gone = session.is_terminal() && !branch_still_exists(&session.branch_name);
            if past_ttl || branch_gone {
                let path = self.file_path(session.id);
                if path.exists() {
                    std::fs::remove_file(&path).map_err(|e| HansoloError::Internal {
                        message: format!("could not remove expired session file: {e}"),
                    })?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn persist(&self, session: &Session) -> HansoloResult<()> {
        std::fs::create_dir_all(&self.sessions_dir).map_err(|e| HansoloError::Internal {
            message: format!("could not create sessions directory: {e}"),
        })?;
        let file = SessionFile::new(session.clone());
        let json = serde_json::to_string_pretty(&file).map_err(|e| HansoloError::Internal {
            message: format!("could not serialize session: {e}"),
        })?;

        let mut tmp = NamedTempFile::new_in(&self.sessions_dir).map_err(|e| HansoloError::Internal {
            message: format!("could not create temp session file: {e}"),
        })?;
        use std::io::Write;
        tmp.write_all(json.as_bytes())
            .map_err(|e| HansoloError::Internal {
                message: format!("could not write temp session file: {e}"),
            })?;
        tmp.persist(self.file_path(session.id))
            .map_err(|e| HansoloError::Internal {
                message: format!("could not persist session file: {e}"),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowType;

    fn store(dir: &Path) -> SessionStore {
        let audit = AuditLog::new(dir.join("audit.log"), Duration::from_secs(1));
        SessionStore::new(
            dir.join("sessions"),
            Duration::from_secs(1),
            chrono::Duration::days(7),
            audit,
        )
    }

    #[test]
    fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let session = Session::new(
            "feature/x".to_string(),
            WorkflowType::Standard,
            chrono::Duration::days(7),
        );
        store.create(session.clone()).unwrap();
        let fetched = store.get("feature/x").unwrap().unwrap();
        assert_eq!(fetched.id, session.id);
    }

    #[test]
    fn create_rejects_duplicate_active_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let session = Session::new(
            "feature/x".to_string(),
            WorkflowType::Standard,
            chrono::Duration::days(7),
        );
        store.create(session.clone()).unwrap();
        let dup = Session::new(
            "feature/x".to_string(),
            WorkflowType::Standard,
            chrono::Duration::days(7),
        );
        let result = store.create(dup);
        assert!(matches!(result, Err(HansoloError::AlreadyExists { .. })));
    }

    #[test]
    fn mutate_rejects_illegal_transition() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let session = Session::new(
            "feature/x".to_string(),
            WorkflowType::Standard,
            chrono::Duration::days(7),
        );
        store.create(session).unwrap();

        let result = store.mutate("feature/x", "commit", |s| {
            s.record_transition(crate::workflow::State::ChangesCommitted, "commit", "agent");
            Ok(())
        });
        assert!(matches!(result, Err(HansoloError::InvalidTransition { .. })));
    }

    #[test]
    fn mutate_accepts_legal_transition_and_bumps_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let session = Session::new(
            "feature/x".to_string(),
            WorkflowType::Standard,
            chrono::Duration::days(7),
        );
        let created_expiry = session.expires_at;
        store.create(session).unwrap();

        let updated = store
            .mutate("feature/x", "launch", |s| {
                s.record_transition(crate::workflow::State::BranchReady, "launch", "agent");
                Ok(())
            })
            .unwrap();
        assert_eq!(updated.state, crate::workflow::State::BranchReady);
        assert!(updated.expires_at >= created_expiry);
    }

    #[test]
    fn terminal_session_rejects_further_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let session = Session::new(
            "feature/x".to_string(),
            WorkflowType::Standard,
            chrono::Duration::days(7),
        );
        store.create(session).unwrap();
        store
            .mutate("feature/x", "abort", |s| {
                s.record_transition(crate::workflow::State::Aborted, "abort", "agent");
                Ok(())
            })
            .unwrap();

        let result = store.mutate("feature/x", "commit", |s| {
            s.record_transition(crate::workflow::State::ChangesCommitted, "commit", "agent");
            Ok(())
        });
        assert!(matches!(result, Err(HansoloError::InvalidTransition { .. })));
    }
}
