//! Git Adapter (C1, spec §4.1): a narrow, side-effecting interface. Every
//! operation returns a typed result or a [`GitError`]; the adapter owns all
//! Git error classification so callers (checks, tools) never inspect the
//! working tree directly.

use async_trait::async_trait;
use gix::bstr::ByteSlice;

use super::cli::{self, GitCommandOpts};
use super::error::{GitError, GitResult};
use super::repo::{open_repo, RepoHandle};

pub const MODIFIED_PATHS_SAMPLE: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct StatusSummary {
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
    /// Bounded sample of modified paths (spec §4.1: "bounded sample").
    pub modified_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AheadBehind {
    pub ahead: usize,
    pub behind: usize,
}

#[derive(Debug, Clone)]
pub enum RebaseOutcome {
    Ok,
    Conflicts(Vec<String>),
}

/// Trait-based interface over the local version-control tool (spec §4.1).
/// Implementations are free to mix a native-library backend (`gix`) with a
/// CLI-shelling backend for the operations the library doesn't expose,
/// exactly as the teacher's own `operations` modules do for `push`/`stash`.
#[async_trait]
pub trait GitAdapter: Send + Sync {
    async fn current_branch(&self) -> GitResult<String>;
    async fn is_clean(&self) -> GitResult<bool>;
    async fn status(&self) -> GitResult<StatusSummary>;
    async fn diff(&self, reference: Option<&str>) -> GitResult<String>;
    async fn checkout(&self, name: &str, create: bool) -> GitResult<()>;
    async fn create_branch(&self, name: &str, from: &str) -> GitResult<()>;
    async fn delete_branch(&self, name: &str, force: bool, remote: bool) -> GitResult<()>;
    /// Returns the new commit hash, or `GitError::Empty` if nothing staged.
    async fn commit(&self, stage_all: bool, message: &str) -> GitResult<String>;
    async fn push_current(&self, set_upstream: bool, force: bool) -> GitResult<()>;
    async fn pull_ff(&self, main_branch: &str) -> GitResult<()>;
    async fn rebase_onto(&self, reference: &str) -> GitResult<RebaseOutcome>;
    async fn stash(&self, message: Option<&str>) -> GitResult<String>;
    async fn stash_pop(&self, stash_ref: &str) -> GitResult<()>;
    async fn stash_list(&self) -> GitResult<Vec<String>>;
    async fn branch_exists(&self, name: &str, remote: bool) -> GitResult<bool>;
    async fn branch_ahead_behind(&self, name: &str, base: &str) -> GitResult<AheadBehind>;
    fn remote_name(&self) -> &str;
}

/// Default, real implementation: `gix` for cheap reads, the `git` CLI for
/// everything gix cannot do as a library.
pub struct LocalGitAdapter {
    repo: RepoHandle,
    remote: String,
    timeout_secs: u64,
}

impl LocalGitAdapter {
    pub fn open(path: &std::path::Path, remote: impl Into<String>) -> GitResult<Self> {
        Ok(Self {
            repo: open_repo(path)?,
            remote: remote.into(),
            timeout_secs: 60,
        })
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    fn opts(&self, work_dir: std::path::PathBuf) -> GitCommandOpts {
        GitCommandOpts::new(work_dir).with_timeout(self.timeout_secs)
    }

    async fn run(&self, args: &[&str]) -> GitResult<std::process::Output> {
        let work_dir = self.repo.workdir()?;
        cli::run_git_command(args, self.opts(work_dir)).await
    }
}

#[async_trait]
impl GitAdapter for LocalGitAdapter {
    async fn current_branch(&self) -> GitResult<String> {
        let repo = self.repo.clone_inner();
        tokio::task::spawn_blocking(move || {
            let head = repo
                .head()
                .map_err(|e| GitError::unsupported(format!("failed to read HEAD: {e}")))?;
            head.referent_name()
                .and_then(|n| n.shorten().to_str().ok().map(ToString::to_string))
                .ok_or_else(|| GitError::unsupported("HEAD is detached"))
        })
        .await
        .map_err(|e| GitError::unsupported(format!("task panicked: {e}")))?
    }

    async fn is_clean(&self) -> GitResult<bool> {
        let repo = self.repo.clone_inner();
        tokio::task::spawn_blocking(move || {
            repo.is_dirty()
                .map(|dirty| !dirty)
                .map_err(|e| GitError::unsupported(format!("failed to read status: {e}")))
        })
        .await
        .map_err(|e| GitError::unsupported(format!("task panicked: {e}")))?
    }

    async fn status(&self) -> GitResult<StatusSummary> {
        // Porcelain v1 is stable and trivial to parse; gix's status iterator
        // API is a heavier lift for what is purely a summary/sample here.
        let output = self.run(&["status", "--porcelain"]).await?;
        if !output.status.success() {
            return Err(GitError::unsupported(cli::stderr_string(&output)));
        }
        let mut summary = StatusSummary::default();
        for line in cli::stdout_string(&output).lines() {
            if line.len() < 3 {
                continue;
            }
            let (index_state, worktree_state) = (line.as_bytes()[0], line.as_bytes()[1]);
            let path = line[3..].to_string();
            match (index_state, worktree_state) {
                (b'?', b'?') => summary.untracked += 1,
                (idx, wt) => {
                    if idx != b' ' {
                        summary.staged += 1;
                    }
                    if wt != b' ' {
                        summary.unstaged += 1;
                    }
                }
            }
            if summary.modified_paths.len() < MODIFIED_PATHS_SAMPLE {
                summary.modified_paths.push(path);
            }
        }
        Ok(summary)
    }

    async fn diff(&self, reference: Option<&str>) -> GitResult<String> {
        let mut args = vec!["diff", "--stat"];
        if let Some(r) = reference {
            args.push(r);
        }
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(GitError::unsupported(cli::stderr_string(&output)));
        }
        Ok(cli::stdout_string(&output))
    }

    async fn checkout(&self, name: &str, create: bool) -> GitResult<()> {
        if create && self.branch_exists(name, false).await? {
            return Err(GitError::BranchConflict(name.to_string()));
        }
        let mut args = vec!["checkout"];
        if create {
            args.push("-b");
        }
        args.push(name);
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(GitError::unsupported(cli::stderr_string(&output)));
        }
        Ok(())
    }

    async fn create_branch(&self, name: &str, from: &str) -> GitResult<()> {
        if !name_matches_branch_regex(name) {
            return Err(GitError::unsupported(format!(
                "branch name '{name}' does not match the required naming convention"
            )));
        }
        if self.branch_exists(name, false).await? {
            return Err(GitError::BranchConflict(name.to_string()));
        }
        let output = self.run(&["branch", name, from]).await?;
        if !output.status.success() {
            return Err(GitError::unsupported(cli::stderr_string(&output)));
        }
        Ok(())
    }

    async fn delete_branch(&self, name: &str, force: bool, remote: bool) -> GitResult<()> {
        if remote {
            let output = self
                .run(&["push", &self.remote, "--delete", name])
                .await?;
            if !output.status.success() {
                let stderr = cli::stderr_string(&output);
                if stderr.contains("remote ref does not exist") {
                    return Ok(());
                }
                return Err(GitError::unsupported(stderr));
            }
            return Ok(());
        }
        let flag = if force { "-D" } else { "-d" };
        let output = self.run(&["branch", flag, name]).await?;
        if !output.status.success() {
            let stderr = cli::stderr_string(&output);
            if stderr.contains("not fully merged") {
                return Err(GitError::NotFullyMerged(name.to_string()));
            }
            return Err(GitError::unsupported(stderr));
        }
        Ok(())
    }

    async fn commit(&self, stage_all: bool, message: &str) -> GitResult<String> {
        if stage_all {
            let add = self.run(&["add", "-A"]).await?;
            if !add.status.success() {
                return Err(GitError::unsupported(cli::stderr_string(&add)));
            }
        }
        let diff_check = self.run(&["diff", "--cached", "--quiet"]).await?;
        if diff_check.status.success() {
            return Err(GitError::Empty);
        }
        let output = self.run(&["commit", "-m", message]).await?;
        if !output.status.success() {
            return Err(GitError::unsupported(cli::stderr_string(&output)));
        }
        let rev = self.run(&["rev-parse", "HEAD"]).await?;
        Ok(cli::stdout_string(&rev))
    }

    async fn push_current(&self, set_upstream: bool, force: bool) -> GitResult<()> {
        let branch = self.current_branch().await?;
        let mut args = vec!["push"];
        if set_upstream {
            args.push("--set-upstream");
        }
        if force {
            args.push("--force-with-lease");
        }
        args.push(&self.remote);
        args.push(&branch);
        let output = self.run(&args).await?;
        if !output.status.success() {
            let stderr = cli::stderr_string(&output);
            if stderr.contains("non-fast-forward") || stderr.contains("rejected") {
                return Err(GitError::RemoteRejected(stderr));
            }
            return Err(GitError::unsupported(stderr));
        }
        Ok(())
    }

    async fn pull_ff(&self, main_branch: &str) -> GitResult<()> {
        let output = self
            .run(&["pull", "--ff-only", &self.remote, main_branch])
            .await?;
        if !output.status.success() {
            let stderr = cli::stderr_string(&output);
            if stderr.contains("not possible to fast-forward") {
                return Err(GitError::NotFastForward);
            }
            return Err(GitError::unsupported(stderr));
        }
        Ok(())
    }

    async fn rebase_onto(&self, reference: &str) -> GitResult<RebaseOutcome> {
        let output = self.run(&["rebase", reference]).await?;
        if output.status.success() {
            return Ok(RebaseOutcome::Ok);
        }
        let combined = format!(
            "{}\n{}",
            cli::stdout_string(&output),
            cli::stderr_string(&output)
        );
        if combined.contains("CONFLICT") || combined.contains("could not apply") {
            let unmerged = self
                .run(&["diff", "--name-only", "--diff-filter=U"])
                .await?;
            let paths: Vec<String> = cli::stdout_string(&unmerged)
                .lines()
                .map(ToString::to_string)
                .collect();
            // Never leave a half-rebased tree: restore HEAD and surface the
            // conflict through the session state machine instead.
            let _ = self.run(&["rebase", "--abort"]).await;
            return Ok(RebaseOutcome::Conflicts(paths));
        }
        Err(GitError::unsupported(combined))
    }

    async fn stash(&self, message: Option<&str>) -> GitResult<String> {
        if self.is_clean().await? {
            return Err(GitError::Empty);
        }
        let mut args = vec!["stash", "push"];
        if let Some(m) = message {
            args.push("-m");
            args.push(m);
        }
        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(GitError::unsupported(cli::stderr_string(&output)));
        }
        Ok("stash@{0}".to_string())
    }

    async fn stash_pop(&self, stash_ref: &str) -> GitResult<()> {
        let output = self.run(&["stash", "pop", stash_ref]).await?;
        if !output.status.success() {
            let stderr = cli::stderr_string(&output);
            if stderr.contains("CONFLICT") {
                return Err(GitError::Conflicts(Vec::new()));
            }
            return Err(GitError::unsupported(stderr));
        }
        Ok(())
    }

    async fn stash_list(&self) -> GitResult<Vec<String>> {
        let output = self.run(&["stash", "list", "--format=%gd: %gs"]).await?;
        if !output.status.success() {
            return Err(GitError::unsupported(cli::stderr_string(&output)));
        }
        Ok(cli::stdout_string(&output)
            .lines()
            .map(ToString::to_string)
            .collect())
    }

    async fn branch_exists(&self, name: &str, remote: bool) -> GitResult<bool> {
        if remote {
            let output = self
                .run(&["ls-remote", "--heads", &self.remote, name])
                .await?;
            if !output.status.success() {
                return Err(GitError::unsupported(cli::stderr_string(&output)));
            }
            return Ok(!cli::stdout_string(&output).is_empty());
        }
        let repo = self.repo.clone_inner();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            let full = format!("refs/heads/{name}");
            Ok(repo
                .try_find_reference(full.as_bytes().as_bstr())
                .map_err(|e| GitError::unsupported(e.to_string()))?
                .is_some())
        })
        .await
        .map_err(|e| GitError::unsupported(format!("task panicked: {e}")))?
    }

    async fn branch_ahead_behind(&self, name: &str, base: &str) -> GitResult<AheadBehind> {
        let spec = format!("{base}...{name}");
        let output = self
            .run(&["rev-list", "--left-right", "--count", &spec])
            .await?;
        if !output.status.success() {
            return Err(GitError::unsupported(cli::stderr_string(&output)));
        }
        let text = cli::stdout_string(&output);
        let mut parts = text.split_whitespace();
        let behind = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| GitError::unsupported("unparseable rev-list output"))?;
        let ahead = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| GitError::unsupported("unparseable rev-list output"))?;
        Ok(AheadBehind { ahead, behind })
    }

    fn remote_name(&self) -> &str {
        &self.remote
    }
}

/// Branch-name validation shared by `createBranch` and the `launch`/`hotfix`
/// tools' naming rule (spec §4.6): `^(feature|bugfix|hotfix|release|chore|
/// docs|test|refactor)/[a-z0-9-]+$`, length <= 80.
pub fn name_matches_branch_regex(name: &str) -> bool {
    crate::tools::naming::BRANCH_NAME_RE.is_match(name) && name.len() <= 80
}
