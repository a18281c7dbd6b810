//! `launch` (spec §4.6): start a standard feature workflow.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::session::Session;
use crate::validation::{CheckContext, CheckReport};
use crate::workflow::{State, WorkflowType};

use super::naming::derive_branch_name;
use super::{ToolContext, ToolResult};

const PRE_FLIGHT_CLEAN: &[&str] = &[
    "hansolo-initialized",
    "in-git-repo",
    "on-main-branch",
    "working-directory-clean",
    "main-up-to-date",
    "no-existing-session",
    "branch-name-available",
];

const PRE_FLIGHT_WITH_STASH: &[&str] = &[
    "hansolo-initialized",
    "in-git-repo",
    "on-main-branch",
    "main-up-to-date",
    "no-existing-session",
    "branch-name-available",
];

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct LaunchInput {
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stash_ref: Option<String>,
    #[serde(default = "default_true")]
    pub pop_stash: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct LaunchOutput {
    pub branch_name: String,
    pub session_id: uuid::Uuid,
}

pub async fn run(ctx: &ToolContext, input: LaunchInput) -> ToolResult {
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

    let names = if input.stash_ref.is_some() {
        PRE_FLIGHT_WITH_STASH
    } else {
        PRE_FLIGHT_CLEAN
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

    let Some(pre_flight_results) = crate::validation::evaluate(&check_ctx, names).await else {
        return ToolResult::error(
            CheckReport::new(vec![crate::validation::CheckOutcome {
                name: "internal",
                severity: crate::validation::Severity::Error,
                passed: false,
                message: "unknown check name in launch's pre-flight set".to_string(),
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

    let mut stash_popped = false;
    if let (Some(stash_ref), true) = (&input.stash_ref, input.pop_stash) {
        if let Err(e) = ctx.git.stash_pop(stash_ref).await {
            return ToolResult::error(pre_flight, e.to_string());
        }
        stash_popped = true;
    }

    let mut session = Session::new(
        branch_name.clone(),
        WorkflowType::Standard,
        chrono::Duration::from_std(ctx.config.session_ttl).unwrap_or(chrono::Duration::days(7)),
    );
    session.record_transition(State::BranchReady, "launch", "agent");
    if let Some(description) = &input.description {
        session.set_metadata("description", description.clone());
    }

    let session = match ctx.sessions.create(session) {
        Ok(s) => s,
        Err(e) => return ToolResult::error(pre_flight, e.to_string()),
    };

    let mut post_names = vec!["branch-checked-out", "session-created"];
    if !stash_popped {
        post_names.push("working-directory-clean");
    }
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
    let mut post_results = crate::validation::evaluate(&check_ctx, &post_names)
        .await
        .unwrap_or_default();
    post_results.push(crate::validation::session_state_outcome(
        Some(&session),
        State::BranchReady,
    ));
    let post_flight = CheckReport::new(post_results);
    let success = post_flight.passed();

    ToolResult {
        success,
        pre_flight,
        errors: if success { Vec::new() } else { post_flight.errors() },
        warnings: post_flight.warnings(),
        data: serde_json::to_value(LaunchOutput {
            branch_name: branch_name.clone(),
            session_id: session.id,
        })
        .unwrap_or_default(),
        next_steps: if success {
            vec!["commit your changes, then run ship to open a pull request".to_string()]
        } else {
            Vec::new()
        },
        post_flight: Some(post_flight),
    }
}

fn resolve_branch_name(input: &LaunchInput) -> Result<String, String> {
    if let Some(name) = &input.branch_name {
        return if super::naming::is_valid_branch_name(name) {
            Ok(name.clone())
        } else {
            Err(format!("branch name '{name}' does not satisfy the naming convention"))
        };
    }
    let description = input
        .description
        .as_deref()
        .ok_or_else(|| "either branchName or description must be provided".to_string())?;
    Ok(derive_branch_name("feature", description))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_branch_name_prefers_explicit_name() {
        let input = LaunchInput {
            branch_name: Some("feature/explicit-name".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_branch_name(&input).unwrap(), "feature/explicit-name");
    }

    #[test]
    fn resolve_branch_name_derives_from_description() {
        let input = LaunchInput {
            description: Some("Add user authentication".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_branch_name(&input).unwrap(),
            "feature/add-user-authentication"
        );
    }

    #[test]
    fn resolve_branch_name_requires_one_of_the_two() {
        let input = LaunchInput::default();
        assert!(resolve_branch_name(&input).is_err());
    }
}
