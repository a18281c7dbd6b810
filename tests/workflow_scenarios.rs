//! End-to-end scenarios (spec.md §8) against a real temporary Git repository
//! plus its bare "remote", a `FakeForge`, and a real `SessionStore` — no
//! mocked Git layer, matching the teacher's own preference for exercising
//! its `operations::*` against throwaway repos rather than stubbed traits.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use hansolo_core::audit::AuditLog;
use hansolo_core::config::{Config, ForgeKind};
use hansolo_core::forge::fake::FakeForge;
use hansolo_core::forge::{CheckState, CheckStatus, ForgeAdapter};
use hansolo_core::git::{GitAdapter, LocalGitAdapter};
use hansolo_core::session::SessionStore;
use hansolo_core::tools::{abort, cleanup, commit, hotfix, launch, ship, swap, ToolContext};
use hansolo_core::workflow::State;

struct Workspace {
    _remote_dir: tempfile::TempDir,
    work_dir: tempfile::TempDir,
}

fn run_git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .status()
        .expect("git should run");
    assert!(status.success(), "git {args:?} failed in {dir:?}");
}

/// Builds a bare "remote" plus a clone with one commit on `main`, pushed.
fn init_workspace() -> Workspace {
    let remote_dir = tempfile::tempdir().unwrap();
    run_git(remote_dir.path(), &["init", "--bare", "--initial-branch=main"]);

    let work_dir = tempfile::tempdir().unwrap();
    run_git(
        Path::new("."),
        &["clone", remote_dir.path().to_str().unwrap(), work_dir.path().to_str().unwrap()],
    );
    std::fs::write(work_dir.path().join("README.md"), "hello\n").unwrap();
    run_git(work_dir.path(), &["add", "README.md"]);
    run_git(work_dir.path(), &["commit", "-m", "initial commit"]);
    run_git(work_dir.path(), &["push", "-u", "origin", "main"]);

    std::fs::create_dir_all(work_dir.path().join(".hansolo").join("sessions")).unwrap();

    Workspace { _remote_dir: remote_dir, work_dir }
}

fn build_ctx(ws: &Workspace) -> (ToolContext, Arc<FakeForge>) {
    let config = Arc::new(Config {
        main_branch: "main".to_string(),
        remote_name: "origin".to_string(),
        forge_kind: ForgeKind::GitHub,
        forge_token: None,
        required_checks: Vec::new(),
        auto_merge: true,
        poll_interval: Duration::from_millis(10),
        overall_timeout: Duration::from_secs(5),
        session_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        session_lock_timeout: Duration::from_secs(5),
    });

    let git: Arc<dyn GitAdapter> =
        Arc::new(LocalGitAdapter::open(ws.work_dir.path(), "origin").unwrap().with_timeout(30));
    let forge = Arc::new(FakeForge::new("test-agent"));
    let forge_adapter: Arc<dyn ForgeAdapter> = forge.clone();

    let audit = AuditLog::new(Config::audit_log_path(ws.work_dir.path()), config.session_lock_timeout);
    let sessions = Arc::new(SessionStore::new(
        Config::sessions_dir(ws.work_dir.path()),
        config.session_lock_timeout,
        chrono::Duration::from_std(config.session_ttl).unwrap(),
        audit.clone(),
    ));

    (
        ToolContext::new(ws.work_dir.path().to_path_buf(), config, git, forge_adapter, sessions, Arc::new(audit)),
        forge,
    )
}

/// Scenario 1: fresh launch on a clean main branch.
#[tokio::test]
async fn fresh_launch_succeeds() {
    let ws = init_workspace();
    let (ctx, _forge) = build_ctx(&ws);

    let result = launch::run(
        &ctx,
        launch::LaunchInput {
            description: Some("Add user authentication".to_string()),
            ..Default::default()
        },
    )
    .await;

    assert!(result.success, "launch should succeed: {result:?}");
    let branch = ctx.git.current_branch().await.unwrap();
    assert_eq!(branch, "feature/add-user-authentication");

    let session = ctx.sessions.get(&branch).unwrap().expect("session should exist");
    assert_eq!(session.state, State::BranchReady);
}

/// Scenario 2: launch fails pre-flight on a dirty tree, with no side effects.
#[tokio::test]
async fn launch_on_dirty_tree_fails_preflight() {
    let ws = init_workspace();
    let (ctx, _forge) = build_ctx(&ws);

    std::fs::write(ws.work_dir.path().join("foo.ts"), "oops\n").unwrap();

    let result = launch::run(&ctx, launch::LaunchInput { description: Some("x".to_string()), ..Default::default() }).await;

    assert!(!result.success);
    assert!(result.pre_flight.results.iter().any(|r| r.name == "working-directory-clean" && !r.passed));

    let branch = ctx.git.current_branch().await.unwrap();
    assert_eq!(branch, "main", "no branch should have been created");
    assert!(ctx.sessions.list_all(true).unwrap().is_empty());
}

/// Scenario 3: commit then ship drives a session to completion end-to-end.
#[tokio::test]
async fn commit_then_ship_happy_path() {
    let ws = init_workspace();
    let (ctx, _forge) = build_ctx(&ws);

    let launch_result = launch::run(
        &ctx,
        launch::LaunchInput { description: Some("add login".to_string()), ..Default::default() },
    )
    .await;
    assert!(launch_result.success);
    let branch = ctx.git.current_branch().await.unwrap();

    std::fs::write(ws.work_dir.path().join("login.rs"), "fn login() {}\n").unwrap();
    let commit_result =
        commit::run(&ctx, commit::CommitInput { message: "feat: add login".to_string(), staged_only: false }).await;
    assert!(commit_result.success, "commit should succeed: {commit_result:?}");

    let ship_result = ship::run(
        &ctx,
        ship::ShipInput { pr_description: Some("adds login".to_string()), ..Default::default() },
    )
    .await;
    assert!(ship_result.success, "ship should reach completion: {ship_result:?}");

    let current_branch = ctx.git.current_branch().await.unwrap();
    assert_eq!(current_branch, "main");
    assert!(!ctx.git.branch_exists(&branch, false).await.unwrap());

    let session = ctx.sessions.get(&branch).unwrap().expect("terminal session retained until cleanup");
    assert_eq!(session.state, State::Complete);
}

/// Scenario 4: ship suspends at `PR_CREATED` on CI failure, then resumes.
#[tokio::test]
async fn ship_resumes_after_ci_failure() {
    let ws = init_workspace();
    let (ctx, forge) = build_ctx(&ws);

    launch::run(&ctx, launch::LaunchInput { description: Some("fix bug".to_string()), ..Default::default() })
        .await;
    let branch = ctx.git.current_branch().await.unwrap();
    std::fs::write(ws.work_dir.path().join("fix.rs"), "fn fix() {}\n").unwrap();
    commit::run(&ctx, commit::CommitInput { message: "fix: bug".to_string(), staged_only: false }).await;

    // PR #1 is the first one FakeForge will mint; force its checks to fail
    // before ship ever polls them.
    forge.set_checks(1, vec![CheckStatus { name: "lint".to_string(), state: CheckState::Failure }]);

    let first = ship::run(&ctx, ship::ShipInput { pr_description: Some("fixes bug".to_string()), ..Default::default() }).await;
    assert!(!first.success, "ship should not complete while checks are failing");
    assert!(first.warnings.iter().any(|w| w == "lint"));

    let session = ctx.sessions.get(&branch).unwrap().unwrap();
    assert_eq!(session.state, State::PrCreated);

    forge.set_checks(1, vec![CheckStatus { name: "lint".to_string(), state: CheckState::Success }]);
    let second = ship::run(&ctx, ship::ShipInput::default()).await;
    assert!(second.success, "ship should complete once checks pass: {second:?}");

    let session = ctx.sessions.get(&branch).unwrap().unwrap();
    assert_eq!(session.state, State::Complete);
}

/// Scenario 5: swap with stash preserves and restores uncommitted work.
#[tokio::test]
async fn swap_with_stash_round_trips_work() {
    let ws = init_workspace();
    let (ctx, _forge) = build_ctx(&ws);

    launch::run(&ctx, launch::LaunchInput { description: Some("session a".to_string()), ..Default::default() }).await;
    let branch_a = ctx.git.current_branch().await.unwrap();

    ctx.git.checkout("main", false).await.unwrap();
    launch::run(&ctx, launch::LaunchInput { description: Some("session b".to_string()), ..Default::default() }).await;
    let branch_b = ctx.git.current_branch().await.unwrap();

    ctx.git.checkout(&branch_a, false).await.unwrap();
    std::fs::write(ws.work_dir.path().join("dirty.txt"), "wip\n").unwrap();

    let swap_result = swap::run(&ctx, swap::SwapInput { branch_name: branch_b.clone(), stash: true }).await;
    assert!(swap_result.success, "swap should succeed: {swap_result:?}");

    let current = ctx.git.current_branch().await.unwrap();
    assert_eq!(current, branch_b);

    let session_a = ctx.sessions.get(&branch_a).unwrap().unwrap();
    assert!(session_a.metadata_str("stash_ref").is_some(), "A's stash should be recorded");
}

/// Scenario 6: two launches deriving the same branch name race; exactly one wins.
#[tokio::test]
async fn concurrent_launch_with_same_name_has_one_winner() {
    let ws = init_workspace();
    let (ctx, _forge) = build_ctx(&ws);

    let input = launch::LaunchInput { branch_name: Some("feature/same-name".to_string()), ..Default::default() };

    let first = launch::run(&ctx, input.clone()).await;
    assert!(first.success);

    // Simulate the second racer by resetting back to main as the source
    // branch for the duplicate attempt, the way a second agent invocation
    // would start from the same pre-state.
    ctx.git.checkout("main", false).await.unwrap();
    let second = launch::run(&ctx, input).await;

    assert!(!second.success, "second launch on the same branch name must fail pre-flight");
    assert!(second
        .pre_flight
        .results
        .iter()
        .any(|r| r.name == "branch-name-available" || r.name == "no-existing-session"));
}

/// Scenario 7: cleanup removes a session whose branch was merged externally.
#[tokio::test]
async fn cleanup_removes_externally_merged_session() {
    let ws = init_workspace();
    let (ctx, _forge) = build_ctx(&ws);

    launch::run(&ctx, launch::LaunchInput { description: Some("squash merged".to_string()), ..Default::default() })
        .await;
    let branch = ctx.git.current_branch().await.unwrap();

    // Walk the session to COMPLETE one legal hop per `mutate` call, the way
    // a prior `commit`+`ship` invocation would have before a human merged the
    // PR from the forge UI on a later, separate visit.
    let hops = [
        (State::ChangesCommitted, "commit"),
        (State::Pushed, "ship"),
        (State::PrCreated, "ship"),
        (State::Merging, "ship"),
        (State::Cleanup, "ship"),
        (State::Complete, "ship"),
    ];
    for (to, tool) in hops {
        ctx.sessions
            .mutate(&branch, tool, |s| {
                s.record_transition(to, tool, "agent");
                Ok(())
            })
            .unwrap();
    }

    ctx.git.checkout("main", false).await.unwrap();
    ctx.git.delete_branch(&branch, true, false).await.unwrap();

    let cleanup_result = cleanup::run(&ctx, cleanup::CleanupInput { delete_branches: true }).await;
    assert!(cleanup_result.success);

    assert!(ctx.sessions.get(&branch).unwrap().is_none(), "terminal+merged session should be swept");
}

/// `hotfix` starts a `HOTFIX_READY` session distinct from the standard machine.
#[tokio::test]
async fn hotfix_launch_starts_hotfix_state_machine() {
    let ws = init_workspace();
    let (ctx, _forge) = build_ctx(&ws);

    let result = hotfix::run(
        &ctx,
        hotfix::HotfixInput { issue: "payment webhook throws 500".to_string(), ..Default::default() },
    )
    .await;
    assert!(result.success, "hotfix should succeed: {result:?}");

    let branch = ctx.git.current_branch().await.unwrap();
    assert_eq!(branch, "hotfix/payment-webhook-throws-500");
    let session = ctx.sessions.get(&branch).unwrap().unwrap();
    assert_eq!(session.state, State::HotfixReady);
}

/// `abort` is legal from any non-terminal state and stashes dirty work first.
#[tokio::test]
async fn abort_preserves_dirty_work_and_marks_aborted() {
    let ws = init_workspace();
    let (ctx, _forge) = build_ctx(&ws);

    launch::run(&ctx, launch::LaunchInput { description: Some("will be aborted".to_string()), ..Default::default() })
        .await;
    let branch = ctx.git.current_branch().await.unwrap();
    std::fs::write(ws.work_dir.path().join("partial.txt"), "wip\n").unwrap();

    let result = abort::run(&ctx, abort::AbortInput { branch_name: None, delete_branch: false }).await;
    assert!(result.success, "abort should succeed: {result:?}");

    let session = ctx.sessions.get(&branch).unwrap().unwrap();
    assert_eq!(session.state, State::Aborted);
    assert!(ctx.git.is_clean().await.unwrap(), "dirty tree should have been stashed");
}
