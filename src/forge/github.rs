//! GitHub forge backend, built on `octocrab` — the crate already used for
//! PR/check-run access in the retrieved pack's task-orchestration stack.

use async_trait::async_trait;
use octocrab::models::pulls::MergeableState;
use octocrab::params::pulls::MergeMethod as OctoMergeMethod;
use octocrab::Octocrab;

use super::adapter::{
    CheckState, CheckStatus, ForgeAdapter, Mergeable, MergeMethod, MergeOutcome, OpenPrOpts,
    PrDetails, PrHandle, PrState, UpdatePrOpts,
};
use super::error::{ForgeError, ForgeResult};

pub struct GitHubForge {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubForge {
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> ForgeResult<Self> {
        let client = Octocrab::builder()
            .personal_token(token.into())
            .build()
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        Ok(Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
        })
    }

    fn classify_check_run_conclusion(conclusion: Option<&str>, status: &str) -> CheckState {
        match conclusion {
            Some("success") => CheckState::Success,
            Some("failure") => CheckState::Failure,
            Some("neutral") => CheckState::Neutral,
            Some("timed_out") => CheckState::TimedOut,
            Some("cancelled") => CheckState::Cancelled,
            _ if status == "queued" => CheckState::Queued,
            _ => CheckState::Running,
        }
    }
}

#[async_trait]
impl ForgeAdapter for GitHubForge {
    async fn whoami(&self) -> ForgeResult<String> {
        self.client
            .current()
            .user()
            .await
            .map(|u| u.login)
            .map_err(|e| ForgeError::Unauthorized(e.to_string()))
    }

    async fn open_pr(&self, opts: OpenPrOpts) -> ForgeResult<PrHandle> {
        if let Some(existing) = self.get_pr_by_branch(&opts.branch).await? {
            return Ok(PrHandle {
                number: existing.number,
                url: existing.url,
                already_existed: true,
            });
        }

        let pr = self
            .client
            .pulls(&self.owner, &self.repo)
            .create(&opts.title, &opts.branch, &opts.base)
            .body(&opts.body)
            .draft(Some(opts.draft))
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;

        Ok(PrHandle {
            number: pr.number,
            url: pr
                .html_url
                .map(|u| u.to_string())
                .unwrap_or_default(),
            already_existed: false,
        })
    }

    async fn update_pr(&self, number: u64, opts: UpdatePrOpts) -> ForgeResult<()> {
        let mut req = self.client.pulls(&self.owner, &self.repo).update(number);
        if let Some(title) = &opts.title {
            req = req.title(title);
        }
        if let Some(body) = &opts.body {
            req = req.body(body);
        }
        if let Some(base) = &opts.base {
            req = req.base(base);
        }
        req.send()
            .await
            .map(|_| ())
            .map_err(|e| ForgeError::Http(e.to_string()))
    }

    async fn get_pr_by_number(&self, number: u64) -> ForgeResult<PrDetails> {
        let pr = self
            .client
            .pulls(&self.owner, &self.repo)
            .get(number)
            .await
            .map_err(|e| ForgeError::NotFound(e.to_string()))?;

        let state = if pr.merged_at.is_some() {
            PrState::Merged
        } else if pr.state == Some(octocrab::models::IssueState::Closed) {
            PrState::Closed
        } else {
            PrState::Open
        };

        let mergeable = match pr.mergeable_state {
            Some(MergeableState::Clean) => Mergeable::Yes,
            Some(MergeableState::Dirty) | Some(MergeableState::Blocked) => Mergeable::No,
            _ => Mergeable::Unknown,
        };

        let head_sha = pr.head.sha.clone();
        let runs = self
            .client
            .checks(&self.owner, &self.repo)
            .list_check_runs_for_git_ref(head_sha.into())
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;

        let checks = runs
            .check_runs
            .into_iter()
            .map(|r| CheckStatus {
                name: r.name,
                state: Self::classify_check_run_conclusion(
                    r.conclusion.as_deref(),
                    &r.status,
                ),
            })
            .collect();

        let required_approvals_met = pr
            .requested_reviewers
            .map(|r| r.is_empty())
            .unwrap_or(true);

        Ok(PrDetails {
            number: pr.number,
            url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
            state,
            mergeable,
            checks,
            required_approvals_met,
            base: pr.base.ref_field,
        })
    }

    async fn get_pr_by_branch(&self, branch: &str) -> ForgeResult<Option<PrDetails>> {
        let head = format!("{}:{}", self.owner, branch);
        let page = self
            .client
            .pulls(&self.owner, &self.repo)
            .list()
            .head(&head)
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;

        match page.items.into_iter().next() {
            Some(pr) => self.get_pr_by_number(pr.number).await.map(Some),
            None => Ok(None),
        }
    }

    async fn merge_pr(&self, number: u64, method: MergeMethod) -> ForgeResult<MergeOutcome> {
        let MergeMethod::Squash = method;
        let result = self
            .client
            .pulls(&self.owner, &self.repo)
            .merge(number)
            .method(OctoMergeMethod::Squash)
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;

        if !result.merged {
            return Err(ForgeError::Http(
                result.message.unwrap_or_else(|| "merge failed".to_string()),
            ));
        }

        Ok(MergeOutcome {
            merged_sha: result.sha,
        })
    }

    async fn delete_remote_branch(&self, name: &str) -> ForgeResult<()> {
        let route = format!(
            "/repos/{}/{}/git/refs/heads/{}",
            self.owner, self.repo, name
        );
        match self.client.delete::<(), _, ()>(route, None::<&()>).await {
            Ok(_) => Ok(()),
            // Idempotent: a branch already gone is not an error (spec §4.2).
            Err(octocrab::Error::GitHub { source, .. }) if source.status_code.as_u16() == 422 => {
                Ok(())
            }
            Err(e) => Err(ForgeError::Http(e.to_string())),
        }
    }
}
