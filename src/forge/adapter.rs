//! Forge Adapter (C2, spec §4.2): wraps the hosted-forge API (GitHub/GitLab).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ForgeResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mergeable {
    Yes,
    No,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Queued,
    Running,
    Success,
    Failure,
    Neutral,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStatus {
    pub name: String,
    pub state: CheckState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrHandle {
    pub number: u64,
    pub url: String,
    /// `true` when `openPR` returned a pre-existing PR instead of creating
    /// one (spec §4.2 idempotence / P4).
    pub already_existed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrDetails {
    pub number: u64,
    pub url: String,
    pub state: PrState,
    pub mergeable: Mergeable,
    pub checks: Vec<CheckStatus>,
    pub required_approvals_met: bool,
    pub base: String,
}

#[derive(Debug, Clone, Default)]
pub struct OpenPrOpts {
    pub branch: String,
    pub base: String,
    pub title: String,
    pub body: String,
    pub draft: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePrOpts {
    pub title: Option<String>,
    pub body: Option<String>,
    pub base: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMethod {
    Squash,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub merged_sha: String,
}

#[derive(Debug, Clone)]
pub enum WaitOutcome {
    AllSucceeded,
    Failed(Vec<String>),
    TimedOut,
}

/// Wraps the hosted-forge API (spec §4.2). All operations are idempotent
/// where spec.md calls for it (`openPR`, `deleteRemoteBranch`).
#[async_trait]
pub trait ForgeAdapter: Send + Sync {
    async fn whoami(&self) -> ForgeResult<String>;
    async fn open_pr(&self, opts: OpenPrOpts) -> ForgeResult<PrHandle>;
    async fn update_pr(&self, number: u64, opts: UpdatePrOpts) -> ForgeResult<()>;
    async fn get_pr_by_number(&self, number: u64) -> ForgeResult<PrDetails>;
    async fn get_pr_by_branch(&self, branch: &str) -> ForgeResult<Option<PrDetails>>;
    async fn merge_pr(&self, number: u64, method: MergeMethod) -> ForgeResult<MergeOutcome>;
    async fn delete_remote_branch(&self, name: &str) -> ForgeResult<()>;
}
