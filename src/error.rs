//! Domain-wide error kind (spec §7), distinct from the narrower adapter
//! errors in [`crate::git::GitError`] and [`crate::forge::ForgeError`].

use thiserror::Error;

use crate::forge::ForgeError;
use crate::git::GitError;

/// A structured, user-facing error. Every variant corresponds to one of the
/// error kinds in the design's error table; `message` is the human string,
/// `suggestion` is advisory recovery guidance surfaced in `ToolResult`.
#[derive(Debug, Error)]
pub enum HansoloError {
    #[error("preflight check failed: {message}")]
    PreflightFailed { message: String },

    #[error("postflight verification failed: {message}")]
    PostflightFailed { message: String },

    #[error("illegal state transition: {from} -> {to} via {tool}")]
    InvalidTransition {
        from: String,
        to: String,
        tool: String,
    },

    #[error("session lock busy: {branch}")]
    Busy { branch: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("already exists: {message}")]
    AlreadyExists { message: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("operation timed out: {message}")]
    TimedOut { message: String },

    #[error("cancelled")]
    Cancelled,

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("unsupported: {message}")]
    Unsupported { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl HansoloError {
    /// Machine-readable kind name, used in `ToolResult.errors` entries and
    /// in audit-log digests.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PreflightFailed { .. } => "PreflightFailed",
            Self::PostflightFailed { .. } => "PostflightFailed",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::Busy { .. } => "Busy",
            Self::NotFound { .. } => "NotFound",
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::Conflict { .. } => "Conflict",
            Self::TimedOut { .. } => "TimedOut",
            Self::Cancelled => "Cancelled",
            Self::Unauthorized { .. } => "Unauthorized",
            Self::Unsupported { .. } => "Unsupported",
            Self::Internal { .. } => "Internal",
        }
    }

    /// Advisory recovery text, or `None` when there is nothing useful to say
    /// beyond the message itself.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Busy { .. } => Some("retry shortly; another invocation holds the session lock"),
            Self::Conflict { .. } => Some("resolve the conflict manually, then re-run the tool"),
            Self::TimedOut { .. } => Some("safe to retry"),
            Self::Cancelled => Some("safe to resume"),
            Self::Unauthorized { .. } => Some("reconfigure forge credentials"),
            Self::PreflightFailed { .. } => {
                Some("remedy the underlying condition; there is no override")
            }
            _ => None,
        }
    }
}

impl From<GitError> for HansoloError {
    fn from(e: GitError) -> Self {
        match e {
            GitError::Unsupported(msg) => Self::Unsupported { message: msg },
            GitError::BranchConflict(name) => Self::AlreadyExists {
                message: format!("branch already exists: {name}"),
            },
            GitError::NotFullyMerged(name) => Self::Conflict {
                message: format!("branch not fully merged: {name}"),
            },
            GitError::Empty => Self::PreflightFailed {
                message: "nothing to commit".into(),
            },
            GitError::RemoteRejected(msg) => Self::Conflict { message: msg },
            GitError::NotFastForward => Self::Conflict {
                message: "local main has diverged from origin/main".into(),
            },
            GitError::Conflicts(paths) => Self::Conflict {
                message: format!("conflicts in: {}", paths.join(", ")),
            },
            GitError::NotFound(msg) => Self::NotFound { message: msg },
            GitError::Timeout(msg) => Self::TimedOut { message: msg },
            GitError::Io(e) => Self::Internal {
                message: format!("git io error: {e}"),
            },
        }
    }
}

impl From<ForgeError> for HansoloError {
    fn from(e: ForgeError) -> Self {
        match e {
            ForgeError::NotFound(msg) => Self::NotFound { message: msg },
            ForgeError::Unauthorized(msg) => Self::Unauthorized { message: msg },
            ForgeError::RateLimited(msg) => Self::TimedOut { message: msg },
            ForgeError::Http(msg) => Self::Internal {
                message: format!("forge http error: {msg}"),
            },
            ForgeError::Timeout(msg) => Self::TimedOut { message: msg },
            ForgeError::Unsupported(msg) => Self::Unsupported { message: msg },
        }
    }
}

pub type HansoloResult<T> = Result<T, HansoloError>;
