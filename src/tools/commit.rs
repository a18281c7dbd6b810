//! `commit` (spec §4.6): record a commit on the current session's branch.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::validation::{CheckContext, CheckReport};
use crate::workflow::{State, WorkflowType};

use super::{ToolContext, ToolResult};

const PRE_FLIGHT: &[&str] = &["session-exists", "not-on-main-branch", "has-uncommitted-changes"];

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CommitInput {
    pub message: String,
    #[serde(default)]
    pub staged_only: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CommitOutput {
    pub commit_hash: String,
}

pub async fn run(ctx: &ToolContext, input: CommitInput) -> ToolResult {
    let current_branch = match ctx.git.current_branch().await {
        Ok(b) => b,
        Err(e) => return ToolResult::error(CheckReport::new(vec![unresolved_outcome()]), e.to_string()),
    };

    let check_ctx = CheckContext {
        workspace_root: &ctx.workspace_root,
        git: ctx.git.as_ref(),
        forge: ctx.forge.as_ref(),
        sessions: ctx.sessions.as_ref(),
        config: ctx.config.as_ref(),
        current_branch: Some(&current_branch),
        proposed_branch: None,
        session: None,
    };
    let Some(results) = crate::validation::evaluate(&check_ctx, PRE_FLIGHT).await else {
        return ToolResult::error(CheckReport::new(vec![unresolved_outcome()]), "internal: unresolved check name");
    };
    let pre_flight = CheckReport::new(results);
    if !pre_flight.passed() {
        return ToolResult::preflight_failed(pre_flight);
    }

    if ctx.cancel.is_cancelled() {
        return ToolResult::error(pre_flight, "cancelled before any side effect");
    }

    let commit_hash = match ctx.git.commit(!input.staged_only, &input.message).await {
        Ok(hash) => hash,
        Err(e) => return ToolResult::error(pre_flight, e.to_string()),
    };

    // `BRANCH_READY|CHANGES_COMMITTED -> CHANGES_COMMITTED` for the standard
    // machine, `HOTFIX_READY|HOTFIX_COMMITTED -> HOTFIX_COMMITTED` for
    // hotfix (spec §4.5) — the two machines don't share this node.
    let session = match ctx.sessions.mutate(&current_branch, "commit", |s| {
        let to_state = if s.workflow_type == WorkflowType::Hotfix {
            State::HotfixCommitted
        } else {
            State::ChangesCommitted
        };
        s.record_transition(to_state, "commit", "agent");
        Ok(())
    }) {
        Ok(s) => s,
        Err(e) => return ToolResult::error(pre_flight, e.to_string()),
    };
    let to_state = session.state;

    let unstaged_remaining = ctx.git.status().await.map(|s| s.unstaged > 0).unwrap_or(false);
    let mut post_names = vec!["commit-created"];
    if !(input.staged_only && unstaged_remaining) {
        post_names.push("working-directory-clean");
    }
    let check_ctx = CheckContext {
        workspace_root: &ctx.workspace_root,
        git: ctx.git.as_ref(),
        forge: ctx.forge.as_ref(),
        sessions: ctx.sessions.as_ref(),
        config: ctx.config.as_ref(),
        current_branch: Some(&current_branch),
        proposed_branch: None,
        session: Some(&session),
    };
    let mut post_results = crate::validation::evaluate(&check_ctx, &post_names).await.unwrap_or_default();
    post_results.push(crate::validation::session_state_outcome(Some(&session), to_state));
    let post_flight = CheckReport::new(post_results);
    let success = post_flight.passed();

    ToolResult {
        success,
        pre_flight,
        errors: if success { Vec::new() } else { post_flight.errors() },
        warnings: post_flight.warnings(),
        data: serde_json::to_value(CommitOutput { commit_hash }).unwrap_or_default(),
        next_steps: if success {
            vec!["run ship to open or update the pull request".to_string()]
        } else {
            Vec::new()
        },
        post_flight: Some(post_flight),
    }
}

fn unresolved_outcome() -> crate::validation::CheckOutcome {
    crate::validation::CheckOutcome {
        name: "internal",
        severity: crate::validation::Severity::Error,
        passed: false,
        message: "could not resolve current branch or check name".to_string(),
        details: Default::default(),
    }
}
