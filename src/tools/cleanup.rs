//! `cleanup` (spec §4.6): sweep terminal sessions whose branches are merged
//! or already gone. Never removes a session whose branch is still around and
//! unmerged — there is no force override for that case (spec.md §9).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::validation::{CheckContext, CheckReport};

use super::{ToolContext, ToolResult};

const PRE_FLIGHT: &[&str] = &["in-git-repo"];

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct CleanupInput {
    #[serde(default)]
    pub delete_branches: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CleanupOutput {
    pub removed_sessions: Vec<String>,
    pub deleted_branches: Vec<String>,
    pub skipped: Vec<String>,
}

pub async fn run(ctx: &ToolContext, input: CleanupInput) -> ToolResult {
    let check_ctx = CheckContext {
        workspace_root: &ctx.workspace_root,
        git: ctx.git.as_ref(),
        forge: ctx.forge.as_ref(),
        sessions: ctx.sessions.as_ref(),
        config: ctx.config.as_ref(),
        current_branch: None,
        proposed_branch: None,
        session: None,
    };
    let Some(results) = crate::validation::evaluate(&check_ctx, PRE_FLIGHT).await else {
        return ToolResult::error(CheckReport::new(vec![internal_outcome()]), "internal: unresolved check name");
    };
    let pre_flight = CheckReport::new(results);
    if !pre_flight.passed() {
        return ToolResult::preflight_failed(pre_flight);
    }

    if ctx.cancel.is_cancelled() {
        return ToolResult::error(pre_flight, "cancelled before any side effect");
    }

    // Best-effort: cleanup may run from any branch, not just main.
    let _ = ctx.git.pull_ff(&ctx.config.main_branch).await;
    let current_branch = ctx.git.current_branch().await.ok();

    let sessions = match ctx.sessions.list_all(true) {
        Ok(s) => s,
        Err(e) => return ToolResult::error(pre_flight, e.to_string()),
    };

    let mut output = CleanupOutput::default();

    for session in sessions {
        if !session.is_terminal() {
            continue;
        }
        if current_branch.as_deref() == Some(session.branch_name.as_str()) {
            output.skipped.push(session.branch_name.clone());
            continue;
        }

        let exists_locally = ctx.git.branch_exists(&session.branch_name, false).await.unwrap_or(false);
        let merged_or_gone = if !exists_locally {
            true
        } else {
            match ctx.git.branch_ahead_behind(&session.branch_name, &ctx.config.main_branch).await {
                Ok(rel) => rel.ahead == 0,
                Err(_) => false,
            }
        };

        if !merged_or_gone {
            output.skipped.push(session.branch_name.clone());
            continue;
        }

        match ctx.sessions.remove(session.id) {
            Ok(true) => output.removed_sessions.push(session.branch_name.clone()),
            Ok(false) => {}
            Err(e) => return ToolResult::error(pre_flight, e.to_string()),
        }

        if input.delete_branches && exists_locally {
            let remote_exists = ctx.git.branch_exists(&session.branch_name, true).await.unwrap_or(false);
            if ctx.git.delete_branch(&session.branch_name, false, false).await.is_ok() {
                if remote_exists {
                    let _ = ctx.git.delete_branch(&session.branch_name, false, true).await;
                }
                output.deleted_branches.push(session.branch_name.clone());
            }
        }
    }

    ToolResult {
        success: true,
        pre_flight,
        errors: Vec::new(),
        warnings: Vec::new(),
        data: serde_json::to_value(output).unwrap_or_default(),
        next_steps: Vec::new(),
        post_flight: None,
    }
}

fn internal_outcome() -> crate::validation::CheckOutcome {
    crate::validation::CheckOutcome {
        name: "internal",
        severity: crate::validation::Severity::Error,
        passed: false,
        message: "could not evaluate cleanup pre-flight".to_string(),
        details: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_defaults_to_empty_lists() {
        let output = CleanupOutput::default();
        assert!(output.removed_sessions.is_empty());
        assert!(output.deleted_branches.is_empty());
    }
}
