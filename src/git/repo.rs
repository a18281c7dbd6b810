//! Thin handle over an open `gix::Repository`, mirroring the teacher's own
//! `RepoHandle`: cheap to clone (shares the ODB/refs database, clears
//! thread-local buffers), `Send` but not `Sync`, so gix-backed reads are
//! done from `tokio::task::spawn_blocking` with a cloned handle.

use std::path::{Path, PathBuf};

use super::error::{GitError, GitResult};

#[derive(Debug, Clone)]
pub struct RepoHandle {
    inner: gix::Repository,
}

impl RepoHandle {
    pub fn new(inner: gix::Repository) -> Self {
        Self { inner }
    }

    #[inline]
    pub fn raw(&self) -> &gix::Repository {
        &self.inner
    }

    #[inline]
    pub fn clone_inner(&self) -> gix::Repository {
        self.inner.clone()
    }

    pub fn workdir(&self) -> GitResult<PathBuf> {
        super::error::require_workdir(self.inner.workdir())
    }
}

/// Open a repository rooted at `path`, failing with `Unsupported` if `path`
/// is not inside a Git working tree (spec §4.1 `currentBranch`/"not a
/// repo").
pub fn open_repo(path: &Path) -> GitResult<RepoHandle> {
    let repo = gix::discover(path)
        .map_err(|e| GitError::unsupported(format!("not a git repository: {e}")))?;
    Ok(RepoHandle::new(repo))
}
