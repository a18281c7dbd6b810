//! Read-only configuration (spec §3, §6). Loaded once per invocation and
//! handed to the tool layer as `Arc<Config>`; the core never re-reads it
//! mid-operation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hosted-forge kind a workspace is configured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeKind {
    GitHub,
    GitLab,
}

/// The configuration record every tool invocation receives. Bootstrap/`init`
/// (writing this file in the first place) is out of scope for this crate;
/// only the on-disk layout and the typed shape are defined here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub main_branch: String,
    pub remote_name: String,
    pub forge_kind: ForgeKind,
    /// Opaque credential (PAT / OAuth token). Never logged, never written
    /// into audit entries.
    #[serde(default)]
    pub forge_token: Option<String>,
    #[serde(default)]
    pub required_checks: Vec<String>,
    #[serde(default)]
    pub auto_merge: bool,
    #[serde(with = "duration_secs", default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde(with = "duration_secs", default = "default_overall_timeout")]
    pub overall_timeout: Duration,
    #[serde(with = "duration_secs", default = "default_session_ttl")]
    pub session_ttl: Duration,
    #[serde(with = "duration_secs", default = "default_lock_timeout")]
    pub session_lock_timeout: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_overall_timeout() -> Duration {
    Duration::from_secs(20 * 60)
}

fn default_session_ttl() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            main_branch: "main".to_string(),
            remote_name: "origin".to_string(),
            forge_kind: ForgeKind::GitHub,
            forge_token: None,
            required_checks: Vec::new(),
            auto_merge: true,
            poll_interval: default_poll_interval(),
            overall_timeout: default_overall_timeout(),
            session_ttl: default_session_ttl(),
            session_lock_timeout: default_lock_timeout(),
        }
    }
}

impl Config {
    /// Directory layout root: `<workspace>/.hansolo/`.
    pub fn hansolo_dir(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".hansolo")
    }

    pub fn sessions_dir(workspace_root: &Path) -> PathBuf {
        Self::hansolo_dir(workspace_root).join("sessions")
    }

    pub fn audit_log_path(workspace_root: &Path) -> PathBuf {
        Self::hansolo_dir(workspace_root).join("audit.log")
    }

    pub fn workspace_lock_path(workspace_root: &Path) -> PathBuf {
        Self::hansolo_dir(workspace_root).join("workspace.lock")
    }

    /// Parse a config record from its on-disk JSON representation. The real
    /// product stores this as `config.yaml`; this crate's contract is the
    /// typed struct, so tests and callers feed it JSON (or construct
    /// `Config` directly) rather than this crate owning a YAML parser,
    /// which spec.md §1 scopes to the external bootstrap layer.
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    /// Load `<workspace>/.hansolo/config.json` if present, else defaults.
    pub fn load(workspace_root: &Path) -> anyhow::Result<Self> {
        let path = Self::hansolo_dir(workspace_root).join("config.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Self::from_json(&data)?)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.session_ttl, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(c.session_lock_timeout, Duration::from_secs(30));
        assert_eq!(c.overall_timeout, Duration::from_secs(20 * 60));
    }

    #[test]
    fn round_trips_through_json() {
        let c = Config::default();
        let json = serde_json::to_string(&c).unwrap();
        let back = Config::from_json(&json).unwrap();
        assert_eq!(back.main_branch, c.main_branch);
        assert_eq!(back.session_ttl, c.session_ttl);
    }

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let c = Config::load(dir.path()).unwrap();
        assert_eq!(c.main_branch, "main");
    }
}
