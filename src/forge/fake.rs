//! In-memory forge double used by workflow integration tests — the same
//! role the teacher's test helpers give a throwaway repo fixture, just for
//! the forge side instead of the git side.

use std::sync::Mutex;

use async_trait::async_trait;

use super::adapter::{
    CheckState, CheckStatus, ForgeAdapter, Mergeable, MergeMethod, MergeOutcome, OpenPrOpts,
    PrDetails, PrHandle, PrState, UpdatePrOpts,
};
use super::error::{ForgeError, ForgeResult};

struct FakePr {
    details: PrDetails,
}

pub struct FakeForge {
    state: Mutex<FakeForgeState>,
}

struct FakeForgeState {
    next_number: u64,
    prs: Vec<FakePr>,
    whoami: String,
}

impl FakeForge {
    pub fn new(whoami: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(FakeForgeState {
                next_number: 1,
                prs: Vec::new(),
                whoami: whoami.into(),
            }),
        }
    }

    /// Test hook: force the named checks on a PR to a given state, as if a
    /// CI run had just reported in.
    pub fn set_checks(&self, number: u64, checks: Vec<CheckStatus>) {
        let mut state = self.state.lock().expect("fake forge lock poisoned");
        if let Some(pr) = state.prs.iter_mut().find(|p| p.details.number == number) {
            pr.details.checks = checks;
        }
    }

    pub fn set_mergeable(&self, number: u64, mergeable: Mergeable) {
        let mut state = self.state.lock().expect("fake forge lock poisoned");
        if let Some(pr) = state.prs.iter_mut().find(|p| p.details.number == number) {
            pr.details.mergeable = mergeable;
        }
    }

    pub fn set_required_approvals_met(&self, number: u64, met: bool) {
        let mut state = self.state.lock().expect("fake forge lock poisoned");
        if let Some(pr) = state.prs.iter_mut().find(|p| p.details.number == number) {
            pr.details.required_approvals_met = met;
        }
    }
}

fn branch_from_url(url: &str) -> Option<&str> {
    url.rsplit('/').next()
}

#[async_trait]
impl ForgeAdapter for FakeForge {
    async fn whoami(&self) -> ForgeResult<String> {
        Ok(self.state.lock().expect("fake forge lock poisoned").whoami.clone())
    }

    async fn open_pr(&self, opts: OpenPrOpts) -> ForgeResult<PrHandle> {
        let mut state = self.state.lock().expect("fake forge lock poisoned");
        if let Some(existing) = state
            .prs
            .iter()
            .find(|p| branch_from_url(&p.details.url) == Some(opts.branch.as_str()))
        {
            return Ok(PrHandle {
                number: existing.details.number,
                url: existing.details.url.clone(),
                already_existed: true,
            });
        }

        let number = state.next_number;
        state.next_number += 1;
        let url = format!("https://fake.forge/pr/{number}/{}", opts.branch);
        state.prs.push(FakePr {
            details: PrDetails {
                number,
                url: url.clone(),
                state: PrState::Open,
                mergeable: Mergeable::Unknown,
                checks: Vec::new(),
                required_approvals_met: false,
                base: opts.base,
            },
        });
        Ok(PrHandle {
            number,
            url,
            already_existed: false,
        })
    }

    async fn update_pr(&self, number: u64, opts: UpdatePrOpts) -> ForgeResult<()> {
        let mut state = self.state.lock().expect("fake forge lock poisoned");
        let pr = state
            .prs
            .iter_mut()
            .find(|p| p.details.number == number)
            .ok_or_else(|| ForgeError::NotFound(format!("pr {number}")))?;
        if let Some(base) = opts.base {
            pr.details.base = base;
        }
        Ok(())
    }

    async fn get_pr_by_number(&self, number: u64) -> ForgeResult<PrDetails> {
        let state = self.state.lock().expect("fake forge lock poisoned");
        state
            .prs
            .iter()
            .find(|p| p.details.number == number)
            .map(|p| p.details.clone())
            .ok_or_else(|| ForgeError::NotFound(format!("pr {number}")))
    }

    async fn get_pr_by_branch(&self, branch: &str) -> ForgeResult<Option<PrDetails>> {
        let state = self.state.lock().expect("fake forge lock poisoned");
        Ok(state
            .prs
            .iter()
            .find(|p| branch_from_url(&p.details.url) == Some(branch))
            .map(|p| p.details.clone()))
    }

    async fn merge_pr(&self, number: u64, method: MergeMethod) -> ForgeResult<MergeOutcome> {
        let MergeMethod::Squash = method;
        let mut state = self.state.lock().expect("fake forge lock poisoned");
        let pr = state
            .prs
            .iter_mut()
            .find(|p| p.details.number == number)
            .ok_or_else(|| ForgeError::NotFound(format!("pr {number}")))?;
        if pr.details.mergeable == Mergeable::No {
            return Err(ForgeError::Http("merge blocked: not mergeable".to_string()));
        }
        pr.details.state = PrState::Merged;
        Ok(MergeOutcome {
            merged_sha: format!("{number:040x}"),
        })
    }

    async fn delete_remote_branch(&self, _name: &str) -> ForgeResult<()> {
        Ok(())
    }
}

#[allow(unused)]
pub fn all_checks_success(names: &[&str]) -> Vec<CheckStatus> {
    names
        .iter()
        .map(|n| CheckStatus {
            name: (*n).to_string(),
            state: CheckState::Success,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_pr_is_idempotent() {
        let forge = FakeForge::new("octo-bot");
        let opts = OpenPrOpts {
            branch: "feature/widgets".to_string(),
            base: "main".to_string(),
            title: "Add widgets".to_string(),
            body: String::new(),
            draft: false,
        };
        let first = forge.open_pr(opts.clone()).await.unwrap();
        let second = forge.open_pr(opts).await.unwrap();
        assert!(!first.already_existed);
        assert!(second.already_existed);
        assert_eq!(first.number, second.number);
    }

    #[tokio::test]
    async fn merge_blocked_when_not_mergeable() {
        let forge = FakeForge::new("octo-bot");
        let pr = forge
            .open_pr(OpenPrOpts {
                branch: "feature/x".to_string(),
                base: "main".to_string(),
                title: "x".to_string(),
                body: String::new(),
                draft: false,
            })
            .await
            .unwrap();
        forge.set_mergeable(pr.number, Mergeable::No);
        let result = forge.merge_pr(pr.number, MergeMethod::Squash).await;
        assert!(result.is_err());
    }
}
