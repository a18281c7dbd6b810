//! `abort` (spec §4.6): terminate a session without shipping it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::validation::{CheckContext, CheckReport};
use crate::workflow::State;

use super::{ToolContext, ToolResult};

const PRE_FLIGHT: &[&str] = &["session-exists"];

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct AbortInput {
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub delete_branch: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AbortOutput {
    pub branch_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stash_ref: Option<String>,
    pub branch_deleted: bool,
}

pub async fn run(ctx: &ToolContext, input: AbortInput) -> ToolResult {
    let branch_name = match resolve_branch(ctx, &input).await {
        Ok(b) => b,
        Err(e) => return ToolResult::error(CheckReport::new(vec![internal_outcome()]), e),
    };

    let check_ctx = CheckContext {
        workspace_root: &ctx.workspace_root,
        git: ctx.git.as_ref(),
        forge: ctx.forge.as_ref(),
        sessions: ctx.sessions.as_ref(),
        config: ctx.config.as_ref(),
        current_branch: Some(&branch_name),
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

    // Preserve uncommitted work rather than discarding it outright: a stash
    // is reversible, a hard reset is not, and spec.md §9 removed every
    // override path in this crate, so there is no "force, discard, proceed"
    // escape hatch to fall back to if that guess is wrong.
    let mut stash_ref = None;
    match ctx.git.is_clean().await {
        Ok(false) => match ctx.git.stash(Some(&format!("abort-{branch_name}"))).await {
            Ok(r) => stash_ref = Some(r),
            Err(e) => return ToolResult::error(pre_flight, e.to_string()),
        },
        Ok(true) => {}
        Err(e) => return ToolResult::error(pre_flight, e.to_string()),
    }

    let session = match ctx.sessions.mutate(&branch_name, "abort", |s| {
        if let Some(stash_ref) = &stash_ref {
            s.set_metadata("stash_ref", stash_ref.clone());
        }
        s.record_transition(State::Aborted, "abort", "agent");
        Ok(())
    }) {
        Ok(s) => s,
        Err(e) => return ToolResult::error(pre_flight, e.to_string()),
    };

    let mut branch_deleted = false;
    if input.delete_branch {
        if let Err(e) = ctx.git.checkout(&ctx.config.main_branch, false).await {
            return ToolResult::error(pre_flight, e.to_string());
        }
        let remote_exists = ctx.git.branch_exists(&branch_name, true).await.unwrap_or(false);
        if let Err(e) = ctx.git.delete_branch(&branch_name, true, false).await {
            return ToolResult::error(pre_flight, e.to_string());
        }
        if remote_exists {
            let _ = ctx.git.delete_branch(&branch_name, true, true).await;
        }
        branch_deleted = true;
    }

    let post_results = vec![crate::validation::session_state_outcome(Some(&session), State::Aborted)];
    let post_flight = CheckReport::new(post_results);
    let success = post_flight.passed();

    ToolResult {
        success,
        pre_flight,
        errors: if success { Vec::new() } else { post_flight.errors() },
        warnings: post_flight.warnings(),
        data: serde_json::to_value(AbortOutput { branch_name, stash_ref, branch_deleted }).unwrap_or_default(),
        next_steps: Vec::new(),
        post_flight: Some(post_flight),
    }
}

async fn resolve_branch(ctx: &ToolContext, input: &AbortInput) -> Result<String, String> {
    if let Some(name) = &input.branch_name {
        return Ok(name.clone());
    }
    ctx.git.current_branch().await.map_err(|e| e.to_string())
}

fn internal_outcome() -> crate::validation::CheckOutcome {
    crate::validation::CheckOutcome {
        name: "internal",
        severity: crate::validation::Severity::Error,
        passed: false,
        message: "could not resolve branch to abort".to_string(),
        details: Default::default(),
    }
}
