//! Forge Adapter (C2): wraps the hosted-forge API (GitHub/GitLab).

pub mod adapter;
pub mod error;
pub mod github;
pub mod gitlab;
pub mod poll;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

pub use adapter::{
    CheckState, CheckStatus, ForgeAdapter, Mergeable, MergeMethod, MergeOutcome, OpenPrOpts,
    PrDetails, PrHandle, PrState, UpdatePrOpts, WaitOutcome,
};
pub use error::{ForgeError, ForgeResult};
pub use github::GitHubForge;
pub use gitlab::GitLabForge;
pub use poll::{wait_for_checks, WaitForChecksOpts};

use crate::config::{Config, ForgeKind};

/// Builds the configured forge backend from `Config`, mirroring the way
/// `LocalGitAdapter::open` resolves a repository from a path.
pub fn build_forge(config: &Config, owner: &str, repo: &str) -> ForgeResult<Box<dyn ForgeAdapter>> {
    let token = config
        .forge_token
        .clone()
        .ok_or_else(|| ForgeError::Unauthorized("no forge token configured".to_string()))?;

    match config.forge_kind {
        ForgeKind::GitHub => Ok(Box::new(GitHubForge::new(token, owner, repo)?)),
        ForgeKind::GitLab => Ok(Box::new(GitLabForge::new(
            token,
            format!("{owner}/{repo}"),
        )?)),
    }
}
