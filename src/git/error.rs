//! Error classification owned by the Git adapter (spec §4.1 "Failure
//! semantics": the adapter owns Git error classification; callers never
//! inspect the working tree directly).

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("branch already exists: {0}")]
    BranchConflict(String),

    #[error("branch not fully merged: {0}")]
    NotFullyMerged(String),

    #[error("nothing to commit")]
    Empty,

    #[error("remote rejected push: {0}")]
    RemoteRejected(String),

    #[error("main is not a fast-forward of origin/main")]
    NotFastForward,

    #[error("rebase produced conflicts")]
    Conflicts(Vec<String>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("git operation timed out: {0}")]
    Timeout(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

pub type GitResult<T> = Result<T, GitError>;

/// Path helper shared by adapter implementations when a repo has no
/// worktree (bare repos are out of scope for every mutating operation).
pub fn require_workdir(path: Option<&Path>) -> GitResult<PathBuf> {
    path.map(Path::to_path_buf)
        .ok_or_else(|| GitError::unsupported("repository has no working directory"))
}
