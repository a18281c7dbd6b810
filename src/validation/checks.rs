//! The closed catalogue of named checks (spec §4.4 "Catalogue (minimum
//! set)"). Each check is a function pointer, not a trait object, since the
//! set is closed and known at compile time; bodies are async (adapter calls
//! require it) so each returns a boxed future rather than a bare value.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::config::Config;
use crate::forge::ForgeAdapter;
use crate::git::GitAdapter;
use crate::session::{Session, SessionStore};

use super::report::{CheckDetails, CheckOutcome, Severity};

pub type CheckFuture<'a> = Pin<Box<dyn Future<Output = CheckOutcome> + Send + 'a>>;

/// Everything a check might need to read (spec §4.4). Checks are read-only
/// by contract — every field here is a shared reference, so a check body
/// has no way to mutate adapter or store state.
pub struct CheckContext<'a> {
    pub workspace_root: &'a Path,
    pub git: &'a dyn GitAdapter,
    pub forge: &'a dyn ForgeAdapter,
    pub sessions: &'a SessionStore,
    pub config: &'a Config,
    pub current_branch: Option<&'a str>,
    pub proposed_branch: Option<&'a str>,
    pub session: Option<&'a Session>,
}

pub struct Check {
    pub name: &'static str,
    pub severity: Severity,
    pub eval: for<'a> fn(&'a CheckContext<'a>) -> CheckFuture<'a>,
}

fn outcome(name: &'static str, severity: Severity, passed: bool, message: impl Into<String>) -> CheckOutcome {
    CheckOutcome {
        name,
        severity,
        passed,
        message: message.into(),
        details: CheckDetails::default(),
    }
}

fn outcome_with(
    name: &'static str,
    severity: Severity,
    passed: bool,
    message: impl Into<String>,
    details: CheckDetails,
) -> CheckOutcome {
    CheckOutcome {
        name,
        severity,
        passed,
        message: message.into(),
        details,
    }
}

macro_rules! check_fn {
    ($ident:ident, $body:expr) => {
        fn $ident<'a>(ctx: &'a CheckContext<'a>) -> CheckFuture<'a> {
            Box::pin(async move { ($body)(ctx).await })
        }
    };
}

check_fn!(hansolo_initialized, |ctx: &CheckContext| async move {
    let dir = Config::hansolo_dir(ctx.workspace_root);
    let sessions = Config::sessions_dir(ctx.workspace_root);
    let passed = dir.exists() && sessions.exists();
    outcome(
        "hansolo-initialized",
        Severity::Error,
        passed,
        if passed {
            "workspace is hansolo-initialized"
        } else {
            "workspace is missing .hansolo/sessions"
        },
    )
});

check_fn!(in_git_repo, |ctx: &CheckContext| async move {
    match ctx.git.current_branch().await {
        Ok(_) => outcome("in-git-repo", Severity::Error, true, "git repository detected"),
        Err(e) => outcome(
            "in-git-repo",
            Severity::Error,
            false,
            format!("not a usable git repository: {e}"),
        ),
    }
});

check_fn!(on_main_branch, |ctx: &CheckContext| async move {
    match ctx.git.current_branch().await {
        Ok(branch) => {
            let passed = branch == ctx.config.main_branch;
            outcome_with(
                "on-main-branch",
                Severity::Error,
                passed,
                if passed {
                    "on main branch".to_string()
                } else {
                    format!("expected {}, on {branch}", ctx.config.main_branch)
                },
                CheckDetails {
                    expected: Some(ctx.config.main_branch.clone()),
                    actual: Some(branch),
                    suggestion: (!passed).then(|| format!("git checkout {}", ctx.config.main_branch)),
                },
            )
        }
        Err(e) => outcome("on-main-branch", Severity::Error, false, e.to_string()),
    }
});

check_fn!(not_on_main_branch, |ctx: &CheckContext| async move {
    match ctx.git.current_branch().await {
        Ok(branch) => {
            let passed = branch != ctx.config.main_branch;
            outcome(
                "not-on-main-branch",
                Severity::Error,
                passed,
                if passed {
                    format!("on {branch}")
                } else {
                    "currently on main branch".to_string()
                },
            )
        }
        Err(e) => outcome("not-on-main-branch", Severity::Error, false, e.to_string()),
    }
});

check_fn!(working_directory_clean, |ctx: &CheckContext| async move {
    match ctx.git.is_clean().await {
        Ok(clean) => outcome(
            "working-directory-clean",
            Severity::Error,
            clean,
            if clean { "clean" } else { "uncommitted changes present" },
        ),
        Err(e) => outcome("working-directory-clean", Severity::Error, false, e.to_string()),
    }
});

check_fn!(main_up_to_date, |ctx: &CheckContext| async move {
    let remote_main = format!("{}/{}", ctx.git.remote_name(), ctx.config.main_branch);
    match ctx
        .git
        .branch_ahead_behind(&ctx.config.main_branch, &remote_main)
        .await
    {
        Ok(ab) => outcome(
            "main-up-to-date",
            Severity::Error,
            ab.behind == 0,
            if ab.behind == 0 {
                "main is up to date with remote".to_string()
            } else {
                format!("main is {} commit(s) behind {remote_main}", ab.behind)
            },
        ),
        Err(e) => outcome("main-up-to-date", Severity::Error, false, e.to_string()),
    }
});

check_fn!(no_existing_session, |ctx: &CheckContext| async move {
    let branch = ctx.proposed_branch.unwrap_or_default();
    match ctx.sessions.get(branch) {
        Ok(None) => outcome("no-existing-session", Severity::Error, true, "no existing session"),
        Ok(Some(s)) if s.is_terminal() => {
            outcome("no-existing-session", Severity::Error, true, "only a terminal session exists")
        }
        Ok(Some(_)) => outcome(
            "no-existing-session",
            Severity::Error,
            false,
            format!("an active session already exists for {branch}"),
        ),
        Err(e) => outcome("no-existing-session", Severity::Error, false, e.to_string()),
    }
});

check_fn!(session_exists, |ctx: &CheckContext| async move {
    let branch = ctx.current_branch.unwrap_or_default();
    match ctx.sessions.get(branch) {
        Ok(Some(s)) if !s.is_terminal() => {
            outcome("session-exists", Severity::Error, true, "active session found")
        }
        Ok(_) => outcome(
            "session-exists",
            Severity::Error,
            false,
            format!("no active session for {branch}"),
        ),
        Err(e) => outcome("session-exists", Severity::Error, false, e.to_string()),
    }
});

check_fn!(branch_name_available, |ctx: &CheckContext| async move {
    let name = ctx.proposed_branch.unwrap_or_default();
    let local = ctx.git.branch_exists(name, false).await;
    let remote = ctx.git.branch_exists(name, true).await;
    match (local, remote) {
        (Ok(l), Ok(r)) => outcome(
            "branch-name-available",
            Severity::Error,
            !l && !r,
            if l || r {
                format!("branch {name} already exists")
            } else {
                format!("branch {name} is available")
            },
        ),
        (Err(e), _) | (_, Err(e)) => outcome("branch-name-available", Severity::Error, false, e.to_string()),
    }
});

check_fn!(has_uncommitted_changes, |ctx: &CheckContext| async move {
    match ctx.git.is_clean().await {
        Ok(clean) => outcome(
            "has-uncommitted-changes",
            Severity::Error,
            !clean,
            if clean { "nothing to commit" } else { "uncommitted changes present" },
        ),
        Err(e) => outcome("has-uncommitted-changes", Severity::Error, false, e.to_string()),
    }
});

check_fn!(has_commits_to_ship, |ctx: &CheckContext| async move {
    let branch = match ctx.current_branch {
        Some(b) => b,
        None => return outcome("has-commits-to-ship", Severity::Error, false, "no current branch"),
    };
    match ctx.git.branch_ahead_behind(branch, &ctx.config.main_branch).await {
        Ok(ab) => outcome(
            "has-commits-to-ship",
            Severity::Error,
            ab.ahead > 0,
            if ab.ahead > 0 {
                format!("{} commit(s) ahead of {}", ab.ahead, ctx.config.main_branch)
            } else {
                "nothing to ship".to_string()
            },
        ),
        Err(e) => outcome("has-commits-to-ship", Severity::Error, false, e.to_string()),
    }
});

check_fn!(no_merge_conflicts_with_main, |ctx: &CheckContext| async move {
    // A trial rebase would mutate the tree, which checks may never do; a
    // diff against the merge base is the read-only proxy spec.md §4.4 calls
    // for ("trial merge-base check").
    match ctx.git.diff(Some(&ctx.config.main_branch)).await {
        Ok(_) => outcome(
            "no-merge-conflicts-with-main",
            Severity::Warning,
            true,
            "no conflict signal detected against main",
        ),
        Err(e) => outcome("no-merge-conflicts-with-main", Severity::Warning, false, e.to_string()),
    }
});

check_fn!(forge_authenticated, |ctx: &CheckContext| async move {
    match ctx.forge.whoami().await {
        Ok(who) => outcome("forge-authenticated", Severity::Error, true, format!("authenticated as {who}")),
        Err(e) => outcome("forge-authenticated", Severity::Error, false, e.to_string()),
    }
});

// --- post-flight checks ---

check_fn!(branch_checked_out, |ctx: &CheckContext| async move {
    let expected = ctx.proposed_branch.or(ctx.current_branch).unwrap_or_default();
    match ctx.git.current_branch().await {
        Ok(actual) => outcome_with(
            "branch-checked-out",
            Severity::Error,
            actual == expected,
            format!("on {actual}"),
            CheckDetails {
                expected: Some(expected.to_string()),
                actual: Some(actual),
                suggestion: None,
            },
        ),
        Err(e) => outcome("branch-checked-out", Severity::Error, false, e.to_string()),
    }
});

check_fn!(session_created, |ctx: &CheckContext| async move {
    let branch = ctx.proposed_branch.or(ctx.current_branch).unwrap_or_default();
    match ctx.sessions.get(branch) {
        Ok(Some(_)) => outcome("session-created", Severity::Error, true, "session persisted"),
        Ok(None) => outcome("session-created", Severity::Error, false, "no session found after creation"),
        Err(e) => outcome("session-created", Severity::Error, false, e.to_string()),
    }
});

check_fn!(commit_created, |ctx: &CheckContext| async move {
    match ctx.git.is_clean().await {
        Ok(_) => outcome("commit-created", Severity::Error, true, "commit recorded"),
        Err(e) => outcome("commit-created", Severity::Error, false, e.to_string()),
    }
});

check_fn!(pr_opened, |ctx: &CheckContext| async move {
    match ctx.session.and_then(|s| s.pr.as_ref()) {
        Some(pr) => outcome("pr-opened", Severity::Error, true, format!("PR #{} open", pr.number)),
        None => outcome("pr-opened", Severity::Error, false, "no PR recorded on session"),
    }
});

check_fn!(pr_merged, |ctx: &CheckContext| async move {
    let number = match ctx.session.and_then(|s| s.pr.as_ref()) {
        Some(pr) => pr.number,
        None => return outcome("pr-merged", Severity::Error, false, "no PR recorded on session"),
    };
    match ctx.forge.get_pr_by_number(number).await {
        Ok(details) => outcome(
            "pr-merged",
            Severity::Error,
            details.state == crate::forge::PrState::Merged,
            format!("pr state: {:?}", details.state),
        ),
        Err(e) => outcome("pr-merged", Severity::Error, false, e.to_string()),
    }
});

check_fn!(branch_deleted_local, |ctx: &CheckContext| async move {
    let branch = ctx.session.map(|s| s.branch_name.as_str()).unwrap_or_default();
    match ctx.git.branch_exists(branch, false).await {
        Ok(exists) => outcome(
            "branch-deleted-local",
            Severity::Error,
            !exists,
            if exists { "branch still present locally" } else { "branch removed locally" },
        ),
        Err(e) => outcome("branch-deleted-local", Severity::Error, false, e.to_string()),
    }
});

check_fn!(branch_deleted_remote, |ctx: &CheckContext| async move {
    let branch = ctx.session.map(|s| s.branch_name.as_str()).unwrap_or_default();
    match ctx.git.branch_exists(branch, true).await {
        Ok(exists) => outcome(
            "branch-deleted-remote",
            Severity::Warning,
            !exists,
            if exists { "branch still present on remote" } else { "branch removed on remote" },
        ),
        Err(e) => outcome("branch-deleted-remote", Severity::Warning, false, e.to_string()),
    }
});

/// Full pre-flight/post-flight catalogue (spec §4.4). Tools resolve the
/// names they declare against this list at call time; an unknown name is a
/// bug, never silently skipped (`resolve`).
pub fn catalogue() -> &'static [Check] {
    &[
        Check { name: "hansolo-initialized", severity: Severity::Error, eval: hansolo_initialized },
        Check { name: "in-git-repo", severity: Severity::Error, eval: in_git_repo },
        Check { name: "on-main-branch", severity: Severity::Error, eval: on_main_branch },
        Check { name: "not-on-main-branch", severity: Severity::Error, eval: not_on_main_branch },
        Check { name: "working-directory-clean", severity: Severity::Error, eval: working_directory_clean },
        Check { name: "main-up-to-date", severity: Severity::Error, eval: main_up_to_date },
        Check { name: "no-existing-session", severity: Severity::Error, eval: no_existing_session },
        Check { name: "session-exists", severity: Severity::Error, eval: session_exists },
        Check { name: "branch-name-available", severity: Severity::Error, eval: branch_name_available },
        Check { name: "has-uncommitted-changes", severity: Severity::Error, eval: has_uncommitted_changes },
        Check { name: "has-commits-to-ship", severity: Severity::Error, eval: has_commits_to_ship },
        Check { name: "no-merge-conflicts-with-main", severity: Severity::Warning, eval: no_merge_conflicts_with_main },
        Check { name: "forge-authenticated", severity: Severity::Error, eval: forge_authenticated },
        Check { name: "branch-checked-out", severity: Severity::Error, eval: branch_checked_out },
        Check { name: "session-created", severity: Severity::Error, eval: session_created },
        Check { name: "commit-created", severity: Severity::Error, eval: commit_created },
        Check { name: "pr-opened", severity: Severity::Error, eval: pr_opened },
        Check { name: "pr-merged", severity: Severity::Error, eval: pr_merged },
        Check { name: "branch-deleted-local", severity: Severity::Error, eval: branch_deleted_local },
        Check { name: "branch-deleted-remote", severity: Severity::Warning, eval: branch_deleted_remote },
    ]
}

pub fn find(name: &str) -> Option<&'static Check> {
    catalogue().iter().find(|c| c.name == name)
}

/// `session-state={EXPECTED}` (spec.md §4.4) is parameterized per call site
/// rather than fixed at catalogue-registration time, so it's a plain helper
/// tool bodies call directly instead of a catalogue entry.
pub fn session_state_outcome(session: Option<&Session>, expected: crate::workflow::State) -> CheckOutcome {
    match session {
        Some(s) => outcome_with(
            "session-state",
            Severity::Error,
            s.state == expected,
            format!("session state is {:?}", s.state),
            CheckDetails {
                expected: Some(format!("{expected:?}")),
                actual: Some(format!("{:?}", s.state)),
                suggestion: None,
            },
        ),
        None => outcome("session-state", Severity::Error, false, "no session to check"),
    }
}

/// Evaluates a named set of checks in catalogue order, returning the full
/// report even when early checks fail (spec.md §4.4: "the caller needs to
/// see all blockers at once"). An unknown name is `ErrorKind::Internal`
/// territory, surfaced here as a panic-free `None` the caller must handle —
/// never silently dropped.
pub async fn evaluate<'a>(ctx: &'a CheckContext<'a>, names: &[&'static str]) -> Option<Vec<CheckOutcome>> {
    let mut results = Vec::with_capacity(names.len());
    for name in names {
        let check = find(name)?;
        results.push((check.eval)(ctx).await);
    }
    Some(results)
}
