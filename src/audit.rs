//! Audit Log (C7, spec §4, §5, §6): append-only newline-delimited JSON.
//! Guarded by a workspace-wide `fs4` lock held only for the append, per
//! spec.md §5 "Shared resources".

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HansoloError, HansoloResult};
use crate::session::lock::SessionLock;

/// `{at, sessionId?, tool, input-summary, outcome, check-report-digest}`
/// (spec.md §3). Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub session_id: Option<Uuid>,
    pub tool: String,
    pub input_summary: String,
    pub outcome: String,
    pub check_report_digest: String,
}

#[derive(Clone)]
pub struct AuditLog {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl AuditLog {
    pub fn new(path: PathBuf, lock_timeout: Duration) -> Self {
        let lock_path = path.with_extension("log.lock");
        Self {
            path,
            lock_path,
            lock_timeout,
        }
    }

    /// The only write path into the log. A single `fs4` lock guards the
    /// open-append-fsync sequence; P3 ("audit entries for a given session
    /// are totally ordered") follows from every append going through here.
    pub fn append(&self, entry: &AuditEntry) -> HansoloResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HansoloError::Internal {
                message: format!("could not create audit log directory: {e}"),
            })?;
        }
        let _lock = SessionLock::acquire(&self.lock_path, self.lock_timeout)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| HansoloError::Internal {
                message: format!("could not open audit log: {e}"),
            })?;

        let line = serde_json::to_string(entry).map_err(|e| HansoloError::Internal {
            message: format!("could not serialize audit entry: {e}"),
        })?;
        writeln!(file, "{line}").map_err(|e| HansoloError::Internal {
            message: format!("could not append audit entry: {e}"),
        })?;
        file.sync_data().map_err(|e| HansoloError::Internal {
            message: format!("could not fsync audit log: {e}"),
        })?;
        Ok(())
    }

    /// Supports `sessions --verbose` without requiring callers to keep an
    /// in-memory index (spec.md §5.7 — "a low-traffic log, not a metrics
    /// pipeline").
    pub fn read_for(&self, session_id: Uuid) -> HansoloResult<Vec<AuditEntry>> {
        Self::read_all_at(&self.path).map(|entries| {
            entries
                .into_iter()
                .filter(|e| e.session_id == Some(session_id))
                .collect()
        })
    }

    pub fn read_all(&self) -> HansoloResult<Vec<AuditEntry>> {
        Self::read_all_at(&self.path)
    }

    fn read_all_at(path: &Path) -> HansoloResult<Vec<AuditEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(path).map_err(|e| HansoloError::Internal {
            message: format!("could not open audit log: {e}"),
        })?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| HansoloError::Internal {
                message: format!("could not read audit log: {e}"),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry =
                serde_json::from_str(&line).map_err(|e| HansoloError::Internal {
                    message: format!("corrupt audit log entry: {e}"),
                })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tool: &str, session_id: Uuid) -> AuditEntry {
        AuditEntry {
            at: Utc::now(),
            session_id: Some(session_id),
            tool: tool.to_string(),
            input_summary: "{}".to_string(),
            outcome: "success".to_string(),
            check_report_digest: "deadbeef".to_string(),
        }
    }

    #[test]
    fn appends_are_ordered_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"), Duration::from_secs(1));
        let id = Uuid::new_v4();
        log.append(&entry("launch", id)).unwrap();
        log.append(&entry("commit", id)).unwrap();

        let all = log.read_for(id).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].tool, "launch");
        assert_eq!(all[1].tool, "commit");
    }

    #[test]
    fn missing_log_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"), Duration::from_secs(1));
        assert!(log.read_all().unwrap().is_empty());
    }
}
