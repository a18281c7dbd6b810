//! `swap` (spec §4.6): switch to another session's branch, optionally
//! stashing the current tree and auto-popping the target's recorded stash.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::validation::{CheckContext, CheckReport};

use super::{ToolContext, ToolResult};

const PRE_FLIGHT_CLEAN: &[&str] = &["session-exists", "working-directory-clean"];
const PRE_FLIGHT_STASH: &[&str] = &["session-exists"];

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SwapInput {
    pub branch_name: String,
    #[serde(default)]
    pub stash: bool,
}

#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct SwapOutput {
    pub branch_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stash_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popped_stash_ref: Option<String>,
}

pub async fn run(ctx: &ToolContext, input: SwapInput) -> ToolResult {
    let current_branch = match ctx.git.current_branch().await {
        Ok(b) => b,
        Err(e) => return ToolResult::error(CheckReport::new(vec![internal_outcome()]), e.to_string()),
    };

    let names = if input.stash { PRE_FLIGHT_STASH } else { PRE_FLIGHT_CLEAN };
    // `session-exists` reads `ctx.current_branch`; here the thing that must
    // have a session is the *target*, so the context is built with the
    // target in that slot for pre-flight purposes.
    let check_ctx = CheckContext {
        workspace_root: &ctx.workspace_root,
        git: ctx.git.as_ref(),
        forge: ctx.forge.as_ref(),
        sessions: ctx.sessions.as_ref(),
        config: ctx.config.as_ref(),
        current_branch: Some(&input.branch_name),
        proposed_branch: None,
        session: None,
    };
    let Some(results) = crate::validation::evaluate(&check_ctx, names).await else {
        return ToolResult::error(CheckReport::new(vec![internal_outcome()]), "internal: unresolved check name");
    };
    let pre_flight = CheckReport::new(results);
    if !pre_flight.passed() {
        return ToolResult::preflight_failed(pre_flight);
    }

    if ctx.cancel.is_cancelled() {
        return ToolResult::error(pre_flight, "cancelled before any side effect");
    }

    let mut output = SwapOutput {
        branch_name: input.branch_name.clone(),
        ..Default::default()
    };

    if input.stash {
        match ctx.git.stash(Some(&format!("swap-from-{current_branch}"))).await {
            Ok(stash_ref) => {
                output.stash_ref = Some(stash_ref.clone());
                if ctx.sessions.get(&current_branch).ok().flatten().is_some() {
                    if let Err(e) = ctx.sessions.mutate(&current_branch, "swap", |s| {
                        s.set_metadata("stash_ref", stash_ref.clone());
                        Ok(())
                    }) {
                        return ToolResult::error(pre_flight, e.to_string());
                    }
                }
            }
            Err(e) => return ToolResult::error(pre_flight, e.to_string()),
        }
    }

    if let Err(e) = ctx.git.checkout(&input.branch_name, false).await {
        return ToolResult::error(pre_flight, e.to_string());
    }

    let target_session = match ctx.sessions.get(&input.branch_name) {
        Ok(Some(s)) => s,
        Ok(None) => return ToolResult::error(pre_flight, format!("session disappeared for {}", input.branch_name)),
        Err(e) => return ToolResult::error(pre_flight, e.to_string()),
    };

    if let Some(stash_ref) = target_session.metadata_str("stash_ref").map(ToString::to_string) {
        if let Err(e) = ctx.git.stash_pop(&stash_ref).await {
            return ToolResult::error(pre_flight, e.to_string());
        }
        output.popped_stash_ref = Some(stash_ref);
        if let Err(e) = ctx.sessions.mutate(&input.branch_name, "swap", |s| {
            s.metadata.remove("stash_ref");
            Ok(())
        }) {
            return ToolResult::error(pre_flight, e.to_string());
        }
    }

    let check_ctx = CheckContext {
        workspace_root: &ctx.workspace_root,
        git: ctx.git.as_ref(),
        forge: ctx.forge.as_ref(),
        sessions: ctx.sessions.as_ref(),
        config: ctx.config.as_ref(),
        current_branch: Some(&input.branch_name),
        proposed_branch: Some(&input.branch_name),
        session: Some(&target_session),
    };
    let post_results = crate::validation::evaluate(&check_ctx, &["branch-checked-out", "session-created"])
        .await
        .unwrap_or_default();
    let post_flight = CheckReport::new(post_results);
    let success = post_flight.passed();

    ToolResult {
        success,
        pre_flight,
        errors: if success { Vec::new() } else { post_flight.errors() },
        warnings: post_flight.warnings(),
        data: serde_json::to_value(output).unwrap_or_default(),
        next_steps: if success { Vec::new() } else { Vec::new() },
        post_flight: Some(post_flight),
    }
}

fn internal_outcome() -> crate::validation::CheckOutcome {
    crate::validation::CheckOutcome {
        name: "internal",
        severity: crate::validation::Severity::Error,
        passed: false,
        message: "could not resolve current branch".to_string(),
        details: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_serializes_without_empty_fields() {
        let output = SwapOutput {
            branch_name: "feature/b".to_string(),
            stash_ref: None,
            popped_stash_ref: None,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("stash_ref").is_none());
    }
}
