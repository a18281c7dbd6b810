//! GitLab forge backend: a small `reqwest`-based REST client. GitLab's merge
//! request API doesn't map cleanly onto octocrab's GitHub-shaped models, so
//! this backend talks to the v4 REST API directly, the way the teacher's own
//! HTTP surface (`operations::push`) shells out rather than wrapping every
//! remote call in a heavyweight client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::adapter::{
    CheckState, CheckStatus, ForgeAdapter, Mergeable, MergeMethod, MergeOutcome, OpenPrOpts,
    PrDetails, PrHandle, PrState, UpdatePrOpts,
};
use super::error::{ForgeError, ForgeResult};

pub struct GitLabForge {
    client: reqwest::Client,
    base_url: String,
    project: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct MrResponse {
    iid: u64,
    web_url: String,
    state: String,
    merge_status: Option<String>,
    target_branch: String,
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PipelineStatus {
    status: String,
}

#[derive(Debug, Deserialize)]
struct Job {
    name: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    sha: Option<String>,
    merge_commit_sha: Option<String>,
}

impl GitLabForge {
    pub fn new(token: impl Into<String>, project: impl Into<String>) -> ForgeResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: "https://gitlab.com/api/v4".to_string(),
            project: project.into(),
            token: token.into(),
        })
    }

    fn project_path(&self) -> String {
        urlencoding::encode(&self.project).into_owned()
    }

    fn classify_job_status(status: &str) -> CheckState {
        match status {
            "success" => CheckState::Success,
            "failed" => CheckState::Failure,
            "canceled" => CheckState::Cancelled,
            "skipped" => CheckState::Neutral,
            "running" => CheckState::Running,
            _ => CheckState::Queued,
        }
    }

    fn to_details(&self, mr: MrResponse, checks: Vec<CheckStatus>) -> PrDetails {
        let state = match mr.state.as_str() {
            "merged" => PrState::Merged,
            "closed" => PrState::Closed,
            _ => PrState::Open,
        };
        let mergeable = match mr.merge_status.as_deref() {
            Some("can_be_merged") => Mergeable::Yes,
            Some("cannot_be_merged") => Mergeable::No,
            _ => Mergeable::Unknown,
        };
        PrDetails {
            number: mr.iid,
            url: mr.web_url,
            state,
            mergeable,
            checks,
            // GitLab approval rules are a separate, paid-tier API; treat
            // unknown as met rather than blocking indefinitely.
            required_approvals_met: true,
            base: mr.target_branch,
        }
    }

    async fn checks_for_sha(&self, sha: &str) -> ForgeResult<Vec<CheckStatus>> {
        let url = format!(
            "{}/projects/{}/repository/commits/{}/statuses",
            self.base_url,
            self.project_path(),
            sha
        );
        let resp = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Ok(Vec::new());
        }
        let jobs: Vec<Job> = resp
            .json()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        Ok(jobs
            .into_iter()
            .map(|j| CheckStatus {
                name: j.name,
                state: Self::classify_job_status(&j.status),
            })
            .collect())
    }
}

#[async_trait]
impl ForgeAdapter for GitLabForge {
    async fn whoami(&self) -> ForgeResult<String> {
        #[derive(Deserialize)]
        struct UserResp {
            username: String,
        }
        let url = format!("{}/user", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ForgeError::Unauthorized("invalid GitLab token".to_string()));
        }
        resp.json::<UserResp>()
            .await
            .map(|u| u.username)
            .map_err(|e| ForgeError::Http(e.to_string()))
    }

    async fn open_pr(&self, opts: OpenPrOpts) -> ForgeResult<PrHandle> {
        if let Some(existing) = self.get_pr_by_branch(&opts.branch).await? {
            return Ok(PrHandle {
                number: existing.number,
                url: existing.url,
                already_existed: true,
            });
        }

        let url = format!(
            "{}/projects/{}/merge_requests",
            self.base_url,
            self.project_path()
        );
        let body = json!({
            "source_branch": opts.branch,
            "target_branch": opts.base,
            "title": opts.title,
            "description": opts.body,
            "draft": opts.draft,
        });
        let resp = self
            .client
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ForgeError::Http(format!(
                "gitlab merge request create failed: {}",
                resp.status()
            )));
        }
        let mr: MrResponse = resp
            .json()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        Ok(PrHandle {
            number: mr.iid,
            url: mr.web_url,
            already_existed: false,
        })
    }

    async fn update_pr(&self, number: u64, opts: UpdatePrOpts) -> ForgeResult<()> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}",
            self.base_url,
            self.project_path(),
            number
        );
        let mut body = serde_json::Map::new();
        if let Some(title) = opts.title {
            body.insert("title".to_string(), json!(title));
        }
        if let Some(b) = opts.body {
            body.insert("description".to_string(), json!(b));
        }
        if let Some(base) = opts.base {
            body.insert("target_branch".to_string(), json!(base));
        }
        self.client
            .put(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        Ok(())
    }

    async fn get_pr_by_number(&self, number: u64) -> ForgeResult<PrDetails> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}",
            self.base_url,
            self.project_path(),
            number
        );
        let resp = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ForgeError::NotFound(format!("merge request {number}")));
        }
        let mr: MrResponse = resp
            .json()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        let checks = match &mr.sha {
            Some(sha) => self.checks_for_sha(sha).await?,
            None => Vec::new(),
        };
        Ok(self.to_details(mr, checks))
    }

    async fn get_pr_by_branch(&self, branch: &str) -> ForgeResult<Option<PrDetails>> {
        let url = format!(
            "{}/projects/{}/merge_requests?source_branch={}&state=opened",
            self.base_url,
            self.project_path(),
            urlencoding::encode(branch)
        );
        let resp = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        let mrs: Vec<MrResponse> = resp
            .json()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        match mrs.into_iter().next() {
            Some(mr) => self.get_pr_by_number(mr.iid).await.map(Some),
            None => Ok(None),
        }
    }

    async fn merge_pr(&self, number: u64, method: MergeMethod) -> ForgeResult<MergeOutcome> {
        let MergeMethod::Squash = method;
        let url = format!(
            "{}/projects/{}/merge_requests/{}/merge",
            self.base_url,
            self.project_path(),
            number
        );
        let resp = self
            .client
            .put(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&json!({ "squash": true }))
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ForgeError::Http(format!(
                "gitlab merge failed: {}",
                resp.status()
            )));
        }
        let merged: MergeResponse = resp
            .json()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        let sha = merged
            .merge_commit_sha
            .or(merged.sha)
            .ok_or_else(|| ForgeError::Http("gitlab merge response missing sha".to_string()))?;
        Ok(MergeOutcome { merged_sha: sha })
    }

    async fn delete_remote_branch(&self, name: &str) -> ForgeResult<()> {
        let url = format!(
            "{}/projects/{}/repository/branches/{}",
            self.base_url,
            self.project_path(),
            urlencoding::encode(name)
        );
        let resp = self
            .client
            .delete(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| ForgeError::Http(e.to_string()))?;
        // Idempotent: 404 means already gone.
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(ForgeError::Http(format!(
                "gitlab branch delete failed: {}",
                resp.status()
            )))
        }
    }
}

#[allow(unused)]
mod urlencoding {
    /// Minimal percent-encoding for path/query segments; avoids pulling in
    /// a dedicated crate for the handful of reserved characters GitLab's API
    /// paths need escaped (`/`, `.`).
    pub fn encode(input: &str) -> std::borrow::Cow<'_, str> {
        if input.bytes().all(is_unreserved) {
            return std::borrow::Cow::Borrowed(input);
        }
        let mut out = String::with_capacity(input.len());
        for b in input.bytes() {
            if is_unreserved(b) {
                out.push(b as char);
            } else {
                out.push_str(&format!("%{:02X}", b));
            }
        }
        std::borrow::Cow::Owned(out)
    }

    fn is_unreserved(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'~')
    }
}
