//! `ship` (spec §4.6): the most complex tool — a resumable sub-machine that
//! rebases, pushes, opens/updates a PR, waits for checks, merges, and cleans
//! up. Each step transitions and persists the session before the next, so a
//! cancelled or interrupted run resumes exactly where it left off by
//! re-invoking `ship` on the same non-terminal session.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::forge::{MergeMethod, OpenPrOpts, PrState, UpdatePrOpts, WaitForChecksOpts, WaitOutcome};
use crate::session::{PrInfo, Session};
use crate::validation::{CheckContext, CheckReport};
use crate::workflow::{State, WorkflowType};

use super::{ToolContext, ToolResult};

const PRE_FLIGHT: &[&str] = &[
    "session-exists",
    "not-on-main-branch",
    "has-commits-to-ship",
    "forge-authenticated",
    "no-merge-conflicts-with-main",
];

const POST_FLIGHT: &[&str] = &[
    "pr-merged",
    "on-main-branch",
    "working-directory-clean",
    "branch-deleted-local",
    "branch-deleted-remote",
];

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ShipInput {
    #[serde(default = "super::default_true")]
    pub push: bool,
    #[serde(default = "super::default_true")]
    pub create_pr: bool,
    #[serde(default = "super::default_true")]
    pub merge: bool,
    #[serde(default)]
    pub pr_description: Option<String>,
    #[serde(default)]
    pub pr_title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct ShipOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_sha: Option<String>,
    pub state: String,
}

pub async fn run(ctx: &ToolContext, input: ShipInput) -> ToolResult {
    let current_branch = match ctx.git.current_branch().await {
        Ok(b) => b,
        Err(e) => return ToolResult::error(CheckReport::new(vec![internal_outcome()]), e.to_string()),
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
        return ToolResult::error(CheckReport::new(vec![internal_outcome()]), "internal: unresolved check name");
    };
    let pre_flight = CheckReport::new(results);
    if !pre_flight.passed() {
        return ToolResult::preflight_failed(pre_flight);
    }

    let session = match ctx.sessions.get(&current_branch) {
        Ok(Some(s)) => s,
        Ok(None) => return ToolResult::error(pre_flight, "no session for current branch"),
        Err(e) => return ToolResult::error(pre_flight, e.to_string()),
    };

    if ctx.cancel.is_cancelled() {
        return ToolResult::error(pre_flight, "cancelled before any side effect");
    }

    // If the PR was already merged externally, skip straight to cleanup
    // (spec.md §4.6 tie-break).
    let existing_pr_merged = match session.pr.as_ref() {
        Some(pr) => matches!(
            ctx.forge.get_pr_by_number(pr.number).await,
            Ok(details) if details.state == PrState::Merged
        ),
        None => false,
    };

    // `has-commits-to-ship` in pre-flight already guarantees ahead > 0
    // (spec.md §4.6's `NothingToShip` tie-break), so there's nothing further
    // to guard here once a session exists.

    let outcome = drive(ctx, &current_branch, session, &input, existing_pr_merged).await;
    match outcome {
        Ok((final_session, output, warnings)) => finish(ctx, pre_flight, final_session, output, warnings).await,
        Err(message) => ToolResult::error(pre_flight, message),
    }
}

/// Drives the session through as many steps as it can in one call,
/// returning early (without error) at any suspension/conflict point.
async fn drive(
    ctx: &ToolContext,
    branch: &str,
    mut session: Session,
    input: &ShipInput,
    skip_to_cleanup: bool,
) -> Result<(Session, ShipOutput, Vec<String>), String> {
    let mut warnings = Vec::new();
    let remote = ctx.git.remote_name().to_string();
    let remote_main = format!("{remote}/{}", ctx.config.main_branch);
    let is_hotfix = session.workflow_type == WorkflowType::Hotfix;

    if skip_to_cleanup {
        session = transition_to_cleanup_stage(ctx, branch, session).await?;
        return finalize_cleanup(ctx, branch, session, &mut warnings).await.map(|(s, o)| (s, o, warnings));
    }

    loop {
        if ctx.cancel.is_cancelled() {
            return Ok((session, snapshot_output(&session), warnings));
        }

        match session.state {
            State::ChangesCommitted | State::HotfixCommitted => {
                if is_hotfix {
                    // Hotfix skips the rebase/conflict dance entirely.
                    session = push_step(ctx, branch, &session, &remote, false).await?;
                    continue;
                }
                if !input.push {
                    return Ok((session, snapshot_output(&session), warnings));
                }
                match ctx.git.rebase_onto(&remote_main).await {
                    Ok(crate::git::RebaseOutcome::Ok) => {
                        session = push_step(ctx, branch, &session, &remote, false).await?;
                    }
                    Ok(crate::git::RebaseOutcome::Conflicts(paths)) => {
                        session = mutate_transition(ctx, branch, State::Conflict, "ship")?;
                        session.set_metadata("conflict_paths", serde_json::json!(paths));
                        return Ok((session, snapshot_output(&session), warnings));
                    }
                    Err(e) => return Err(e.to_string()),
                }
            }

            State::Conflict => {
                match ctx.git.rebase_onto(&remote_main).await {
                    Ok(crate::git::RebaseOutcome::Ok) => {
                        session = mutate_transition(ctx, branch, State::Rebasing, "ship")?;
                    }
                    Ok(crate::git::RebaseOutcome::Conflicts(_)) => {
                        return Ok((session, snapshot_output(&session), warnings));
                    }
                    Err(e) => return Err(e.to_string()),
                }
            }

            State::Rebasing => {
                // The PR already exists from before the conflict (spec §4.5
                // `REBASING -> PR_CREATED`); force-push the rebased branch
                // but stay at `PrCreated` — there is no `PrCreated -> Pushed`
                // edge in `STANDARD_EDGES`, so `push_step`'s unconditional
                // transition to `Pushed` does not apply on this path.
                ctx.git.push_current(true, true).await.map_err(|e| e.to_string())?;
                session = mutate_transition(ctx, branch, State::PrCreated, "ship")?;
            }

            State::Pushed | State::HotfixPushed if session.pr.is_none() => {
                if !input.create_pr {
                    return Ok((session, snapshot_output(&session), warnings));
                }
                session = open_or_update_pr(ctx, branch, session, input, is_hotfix).await?;
            }

            // Hotfix has no PR_CREATED/WAITING_APPROVAL nodes (spec §4.5):
            // the PR sits under HOTFIX_PUSHED until checks (and, unless
            // skip_review, approvals) are satisfied, then jumps straight to
            // HOTFIX_VALIDATED.
            State::HotfixPushed => {
                match wait_then_validate_hotfix(ctx, branch, session, input, &mut warnings).await? {
                    Some(next) => session = next,
                    None => return Ok((session, snapshot_output(&session), warnings)),
                }
            }

            State::Pushed => {
                session = open_or_update_pr(ctx, branch, session, input, is_hotfix).await?;
            }

            State::PrCreated | State::WaitingApproval => {
                match wait_then_merge(ctx, branch, session, input, &mut warnings).await? {
                    Some(next) => session = next,
                    None => return Ok((session, snapshot_output(&session), warnings)),
                }
            }

            State::HotfixValidated => {
                if !input.merge {
                    return Ok((session, snapshot_output(&session), warnings));
                }
                session = merge_step(ctx, branch, session, State::HotfixDeployed).await?;
            }

            State::Merging | State::HotfixDeployed => {
                return finalize_cleanup(ctx, branch, session, &mut warnings)
                    .await
                    .map(|(s, o)| (s, o, warnings.clone()));
            }

            State::Cleanup | State::HotfixCleanup => {
                return finalize_cleanup(ctx, branch, session, &mut warnings)
                    .await
                    .map(|(s, o)| (s, o, warnings.clone()));
            }

            State::Complete | State::HotfixComplete | State::Aborted => {
                return Ok((session.clone(), snapshot_output(&session), warnings));
            }

            _ => return Err(format!("ship cannot resume from state {:?}", session.state)),
        }
    }
}

fn mutate_transition(ctx: &ToolContext, branch: &str, to: State, tool: &str) -> Result<Session, String> {
    ctx.sessions
        .mutate(branch, tool, |s| {
            s.record_transition(to, tool, "agent");
            Ok(())
        })
        .map_err(|e| e.to_string())
}

async fn push_step(
    ctx: &ToolContext,
    branch: &str,
    session: &Session,
    remote: &str,
    was_rebasing: bool,
) -> Result<Session, String> {
    let _ = remote;
    ctx.git
        .push_current(true, was_rebasing)
        .await
        .map_err(|e| e.to_string())?;
    let to = if session.workflow_type == WorkflowType::Hotfix {
        State::HotfixPushed
    } else {
        State::Pushed
    };
    mutate_transition(ctx, branch, to, "ship")
}

async fn open_or_update_pr(
    ctx: &ToolContext,
    branch: &str,
    session: Session,
    input: &ShipInput,
    is_hotfix: bool,
) -> Result<Session, String> {
    let title = input.pr_title.clone().unwrap_or_else(|| {
        let prefix = if is_hotfix { "[hotfix]" } else { "[launch]" };
        format!("{prefix} {branch}")
    });

    let session = match &session.pr {
        None => {
            let body = input
                .pr_description
                .clone()
                .ok_or_else(|| "prDescription is required the first time a PR is opened".to_string())?;
            let handle = ctx
                .forge
                .open_pr(OpenPrOpts {
                    branch: branch.to_string(),
                    base: ctx.config.main_branch.clone(),
                    title,
                    body,
                    draft: false,
                })
                .await
                .map_err(|e| e.to_string())?;
            // Hotfix has no PR_CREATED node (spec §4.5): record the PR but
            // stay at HOTFIX_PUSHED/PUSHED; only the standard machine
            // advances here.
            ctx.sessions
                .mutate(branch, "ship", |s| {
                    s.pr = Some(PrInfo {
                        number: handle.number,
                        url: handle.url.clone(),
                        base: ctx.config.main_branch.clone(),
                        draft: false,
                    });
                    if !is_hotfix {
                        s.record_transition(State::PrCreated, "ship", "agent");
                    }
                    Ok(())
                })
                .map_err(|e| e.to_string())?
        }
        Some(pr) => {
            ctx.forge
                .update_pr(
                    pr.number,
                    UpdatePrOpts {
                        title: Some(title),
                        body: input.pr_description.clone(),
                        base: None,
                    },
                )
                .await
                .map_err(|e| e.to_string())?;
            if is_hotfix {
                session
            } else {
                mutate_transition(ctx, branch, State::PrCreated, "ship")?
            }
        }
    };
    Ok(session)
}

/// Standard machine only: `PR_CREATED`/`WAITING_APPROVAL` -> `MERGING`, both
/// of which are legal `STANDARD_EDGES` sources for the merge transition.
async fn wait_then_merge(
    ctx: &ToolContext,
    branch: &str,
    session: Session,
    input: &ShipInput,
    warnings: &mut Vec<String>,
) -> Result<Option<Session>, String> {
    let pr = session
        .pr
        .as_ref()
        .ok_or_else(|| "ship reached PR_CREATED with no recorded PR".to_string())?;
    match poll_checks(ctx, pr.number).await? {
        WaitOutcome::AllSucceeded => {
            if !input.merge {
                return Ok(None);
            }
            let merged = merge_step(ctx, branch, session, State::Merging).await?;
            Ok(Some(merged))
        }
        WaitOutcome::Failed(names) => {
            warnings.extend(names);
            Ok(None)
        }
        WaitOutcome::TimedOut => Err("waitForChecks timed out".to_string()),
    }
}

/// Hotfix machine only: `HOTFIX_PUSHED` -> `HOTFIX_VALIDATED` once checks
/// pass and (unless `skip_review`) required approvals are met. spec.md §9's
/// resolution: `skip_review` bypasses only the human-approval wait, never
/// the required-check set — `poll_checks` always runs regardless.
async fn wait_then_validate_hotfix(
    ctx: &ToolContext,
    branch: &str,
    session: Session,
    input: &ShipInput,
    warnings: &mut Vec<String>,
) -> Result<Option<Session>, String> {
    let pr = session
        .pr
        .as_ref()
        .ok_or_else(|| "ship reached HOTFIX_PUSHED with no recorded PR".to_string())?
        .clone();
    match poll_checks(ctx, pr.number).await? {
        WaitOutcome::AllSucceeded => {
            let skip_review = session.metadata_bool("skip_review");
            if !skip_review {
                let details = ctx.forge.get_pr_by_number(pr.number).await.map_err(|e| e.to_string())?;
                if !details.required_approvals_met {
                    warnings.push("waiting for required approvals".to_string());
                    return Ok(None);
                }
            }
            let validated = mutate_transition(ctx, branch, State::HotfixValidated, "ship")?;
            Ok(Some(validated))
        }
        WaitOutcome::Failed(names) => {
            warnings.extend(names);
            Ok(None)
        }
        WaitOutcome::TimedOut => Err("waitForChecks timed out".to_string()),
    }
}

async fn poll_checks(ctx: &ToolContext, pr_number: u64) -> Result<WaitOutcome, String> {
    let required_set = if ctx.config.required_checks.is_empty() {
        None
    } else {
        Some(ctx.config.required_checks.as_slice())
    };
    let opts = WaitForChecksOpts {
        poll_interval: ctx.config.poll_interval,
        overall_timeout: ctx.config.overall_timeout,
        required_set,
    };
    crate::forge::wait_for_checks(ctx.forge.as_ref(), pr_number, opts, &ctx.cancel)
        .await
        .map_err(|e| e.to_string())
}

async fn merge_step(ctx: &ToolContext, branch: &str, session: Session, to: State) -> Result<Session, String> {
    let pr = session.pr.as_ref().ok_or_else(|| "no PR to merge".to_string())?;
    let outcome = ctx
        .forge
        .merge_pr(pr.number, MergeMethod::Squash)
        .await
        .map_err(|e| e.to_string())?;
    ctx.sessions
        .mutate(branch, "ship", |s| {
            s.set_metadata("merged_sha", outcome.merged_sha.clone());
            s.record_transition(to, "ship", "agent");
            Ok(())
        })
        .map_err(|e| e.to_string())
}

async fn transition_to_cleanup_stage(ctx: &ToolContext, branch: &str, session: Session) -> Result<Session, String> {
    if session.is_terminal() {
        return Ok(session);
    }
    let to = if session.workflow_type == WorkflowType::Hotfix {
        State::HotfixDeployed
    } else {
        State::Merging
    };
    if session.state == to {
        Ok(session)
    } else {
        mutate_transition(ctx, branch, to, "ship")
    }
}

async fn finalize_cleanup(
    ctx: &ToolContext,
    branch: &str,
    session: Session,
    _warnings: &mut [String],
) -> Result<(Session, ShipOutput), String> {
    ctx.git.checkout(&ctx.config.main_branch, false).await.map_err(|e| e.to_string())?;
    ctx.git.pull_ff(&ctx.config.main_branch).await.map_err(|e| e.to_string())?;
    let _ = ctx.git.delete_branch(branch, false, false).await;
    if let Some(pr) = &session.pr {
        let _ = pr;
        let _ = ctx.forge.delete_remote_branch(branch).await;
    }

    let cleanup_state = if session.workflow_type == WorkflowType::Hotfix {
        State::HotfixCleanup
    } else {
        State::Cleanup
    };
    let complete_state = if session.workflow_type == WorkflowType::Hotfix {
        State::HotfixComplete
    } else {
        State::Complete
    };

    let session = if session.state != cleanup_state && session.state != complete_state {
        mutate_transition(ctx, branch, cleanup_state, "ship")?
    } else {
        session
    };
    let session = if session.state != complete_state {
        mutate_transition(ctx, branch, complete_state, "ship")?
    } else {
        session
    };

    Ok((session.clone(), snapshot_output(&session)))
}

fn snapshot_output(session: &Session) -> ShipOutput {
    ShipOutput {
        pr_number: session.pr.as_ref().map(|p| p.number),
        pr_url: session.pr.as_ref().map(|p| p.url.clone()),
        merged_sha: session
            .metadata
            .get("merged_sha")
            .and_then(|v| v.as_str())
            .map(ToString::to_string),
        state: format!("{:?}", session.state),
    }
}

async fn finish(
    ctx: &ToolContext,
    pre_flight: CheckReport,
    session: Session,
    output: ShipOutput,
    warnings: Vec<String>,
) -> ToolResult {
    let is_complete = matches!(session.state, State::Complete | State::HotfixComplete);
    let post_flight = if is_complete {
        let check_ctx = CheckContext {
            workspace_root: &ctx.workspace_root,
            git: ctx.git.as_ref(),
            forge: ctx.forge.as_ref(),
            sessions: ctx.sessions.as_ref(),
            config: ctx.config.as_ref(),
            current_branch: Some(&ctx.config.main_branch),
            proposed_branch: None,
            session: Some(&session),
        };
        let mut results = crate::validation::evaluate(&check_ctx, POST_FLIGHT).await.unwrap_or_default();
        results.push(crate::validation::session_state_outcome(Some(&session), session.state));
        Some(CheckReport::new(results))
    } else {
        None
    };

    let success = is_complete && post_flight.as_ref().map(CheckReport::passed).unwrap_or(false);
    let mut errors = Vec::new();
    if let Some(report) = &post_flight {
        errors.extend(report.errors());
    }
    let mut all_warnings = warnings;
    if let Some(report) = &post_flight {
        all_warnings.extend(report.warnings());
    }

    let next_steps = match session.state {
        State::Conflict => vec!["resolve the rebase conflicts, then re-run ship".to_string()],
        State::PrCreated | State::WaitingApproval if !success => {
            vec!["re-run ship once checks pass or after addressing warnings".to_string()]
        }
        _ if success => vec!["workflow complete".to_string()],
        _ => Vec::new(),
    };

    ToolResult {
        success,
        pre_flight,
        post_flight,
        errors,
        warnings: all_warnings,
        data: serde_json::to_value(output).unwrap_or_default(),
        next_steps,
    }
}

fn internal_outcome() -> crate::validation::CheckOutcome {
    crate::validation::CheckOutcome {
        name: "internal",
        severity: crate::validation::Severity::Error,
        passed: false,
        message: "could not resolve current branch or check name".to_string(),
        details: Default::default(),
    }
}
