//! `hotfix` (spec §4.6): start an expedited hotfix workflow, branched from
//! main the same way `launch` does but tagged with the hotfix state machine
//! and an optional `skipReview` flag that later lets `ship` bypass human
//! approval (never the required CI checks).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::session::Session;
use crate::validation::{CheckContext, CheckReport};
use crate::workflow::{State, WorkflowType};

use super::naming::derive_branch_name;
use super::{ToolContext, ToolResult};

const PRE_FLIGHT: &[&str] = &[
    "hansolo-initialized",
    "in-git-repo",
    "on-main-branch",
    "working-directory-clean",
    "main-up-to-date",
    "no-existing-session",
    "branch-name-available",
];

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct HotfixInput {
    #[serde(default)]
    pub branch_name: Option<String>,
    pub issue: String,
    #[serde(default)]
    pub skip_review: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct HotfixOutput {
    pub branch_name: String,
    pub session_id: uuid::Uuid,
    pub skip_review: bool,
}

pub async fn run(ctx: &ToolContext, input: HotfixInput) -> ToolResult {
    let branch_name = match resolve_branch_name(&input) {
        Ok(name) => name,
        Err(message) => {
            return ToolResult::error(
                CheckReport::new(vec![crate::validation::CheckOutcome {
                    name: "branch-name-available",
                    severity: crate::validation::Severity::Error,
                    passed: false,
                    message: message.clone(),
                    details: Default::default(),
                }]),
                message,
            )
        }
    };

    let current_branch = ctx.git.current_branch().await.ok();
    let check_ctx = CheckContext {
        workspace_root: &ctx.workspace_root,
        git: ctx.git.as_ref(),
        forge: ctx.forge.as_ref(),
        sessions: ctx.sessions.as_ref(),
        config: ctx.config.as_ref(),
        current_branch: current_branch.as_deref(),
        proposed_branch: Some(&branch_name),
        session: None,
    };
    let Some(pre_flight_results) = crate::validation::evaluate(&check_ctx, PRE_FLIGHT).await else {
        return ToolResult::error(
            CheckReport::new(vec![crate::validation::CheckOutcome {
                name: "internal",
                severity: crate::validation::Severity::Error,
                passed: false,
                message: "unknown check name in hotfix's pre-flight set".to_string(),
                details: Default::default(),
            }]),
            "internal: unresolved check name",
        );
    };
    let pre_flight = CheckReport::new(pre_flight_results);
    if !pre_flight.passed() {
        return ToolResult::preflight_failed(pre_flight);
    }

    if ctx.cancel.is_cancelled() {
        return ToolResult::error(pre_flight, "cancelled before any side effect");
    }

    if let Err(e) = ctx.git.create_branch(&branch_name, &ctx.config.main_branch).await {
        return ToolResult::error(pre_flight, e.to_string());
    }
    if let Err(e) = ctx.git.checkout(&branch_name, false).await {
        return ToolResult::error(pre_flight, e.to_string());
    }

    let mut session = Session::new(
        branch_name.clone(),
        WorkflowType::Hotfix,
        chrono::Duration::from_std(ctx.config.session_ttl).unwrap_or(chrono::Duration::days(7)),
    );
    session.record_transition(State::HotfixReady, "hotfix", "agent");
    session.set_metadata("issue", input.issue.clone());
    if input.skip_review {
        session.set_metadata("skip_review", true);
    }

    let session = match ctx.sessions.create(session) {
        Ok(s) => s,
        Err(e) => return ToolResult::error(pre_flight, e.to_string()),
    };

    let check_ctx = CheckContext {
        workspace_root: &ctx.workspace_root,
        git: ctx.git.as_ref(),
        forge: ctx.forge.as_ref(),
        sessions: ctx.sessions.as_ref(),
        config: ctx.config.as_ref(),
        current_branch: Some(&branch_name),
        proposed_branch: Some(&branch_name),
        session: Some(&session),
    };
    let mut post_results = crate::validation::evaluate(&check_ctx, &["branch-checked-out", "session-created"])
        .await
        .unwrap_or_default();
    post_results.push(crate::validation::session_state_outcome(Some(&session), State::HotfixReady));
    let post_flight = CheckReport::new(post_results);
    let success = post_flight.passed();

    ToolResult {
        success,
        pre_flight,
        errors: if success { Vec::new() } else { post_flight.errors() },
        warnings: post_flight.warnings(),
        data: serde_json::to_value(HotfixOutput {
            branch_name: branch_name.clone(),
            session_id: session.id,
            skip_review: input.skip_review,
        })
        .unwrap_or_default(),
        next_steps: if success {
            vec!["commit the fix, then run ship to push and open a pull request".to_string()]
        } else {
            Vec::new()
        },
        post_flight: Some(post_flight),
    }
}

fn resolve_branch_name(input: &HotfixInput) -> Result<String, String> {
    if let Some(name) = &input.branch_name {
        return if super::naming::is_valid_branch_name(name) {
            Ok(name.clone())
        } else {
            Err(format!("branch name '{name}' does not satisfy the naming convention"))
        };
    }
    if input.issue.trim().is_empty() {
        return Err("either branchName or issue must be provided".to_string());
    }
    Ok(derive_branch_name("hotfix", &input.issue))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_branch_name_derives_hotfix_prefix() {
        let input = HotfixInput {
            issue: "payment webhook throws 500".to_string(),
            ..Default::default()
        };
        assert_eq!(
            resolve_branch_name(&input).unwrap(),
            "hotfix/payment-webhook-throws-500"
        );
    }

    #[test]
    fn resolve_branch_name_prefers_explicit_name() {
        let input = HotfixInput {
            branch_name: Some("hotfix/explicit".to_string()),
            issue: "ignored".to_string(),
            ..Default::default()
        };
        assert_eq!(resolve_branch_name(&input).unwrap(), "hotfix/explicit");
    }
}
