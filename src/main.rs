//! `hansolo`: a thin CLI wrapper around `hansolo_core`. Defaults to serving
//! the MCP tools over stdio (spec §5); `hansolo run <tool> [json]` invokes a
//! single tool directly for local/manual use, printing its `ToolResult` as
//! JSON and exiting non-zero on failure — mirroring the teacher's own
//! `main.rs` in spirit (one binary, tools registered once) without its
//! internal HTTP-daemon machinery, which this crate cannot depend on.

use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rmcp::transport::stdio;
use rmcp::ServiceExt;

use hansolo_core::audit::AuditLog;
use hansolo_core::config::Config;
use hansolo_core::forge::{build_forge, ForgeAdapter};
use hansolo_core::git::{GitAdapter, LocalGitAdapter};
use hansolo_core::mcp::HansoloServer;
use hansolo_core::session::SessionStore;
use hansolo_core::tools::ToolContext;

#[derive(Parser)]
#[command(name = "hansolo", version, about = "Deterministic Git workflow orchestrator")]
struct Cli {
    /// Workspace root; defaults to the current directory.
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the workflow tools over MCP stdio (the default when no subcommand is given).
    Mcp,
    /// Invoke a single tool by name with a JSON input payload.
    Run {
        /// One of launch, commit, ship, swap, abort, hotfix, cleanup, sessions, status.
        tool: String,
        /// JSON input. Reads stdin if omitted.
        json: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let workspace_root = cli
        .workspace
        .map(Ok)
        .unwrap_or_else(std::env::current_dir)
        .context("resolving workspace root")?;

    match cli.command.unwrap_or(Command::Mcp) {
        Command::Mcp => run_mcp(workspace_root).await,
        Command::Run { tool, json } => run_tool(workspace_root, &tool, json).await,
    }
}

async fn run_mcp(workspace_root: PathBuf) -> Result<()> {
    let ctx = Arc::new(build_context(workspace_root)?);
    log::info!(target: "hansolo", "serving MCP tools over stdio");
    let server = HansoloServer::new(ctx);
    let service = server.serve(stdio()).await.context("starting MCP server")?;
    service.waiting().await.context("MCP server loop")?;
    Ok(())
}

async fn run_tool(workspace_root: PathBuf, tool: &str, json: Option<String>) -> Result<()> {
    let ctx = build_context(workspace_root)?;
    let payload = match json {
        Some(j) => j,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading tool input from stdin")?;
            if buf.trim().is_empty() {
                "{}".to_string()
            } else {
                buf
            }
        }
    };

    let result = match tool {
        "launch" => {
            hansolo_core::tools::launch::run(&ctx, serde_json::from_str(&payload)?).await
        }
        "commit" => {
            hansolo_core::tools::commit::run(&ctx, serde_json::from_str(&payload)?).await
        }
        "ship" => hansolo_core::tools::ship::run(&ctx, serde_json::from_str(&payload)?).await,
        "swap" => hansolo_core::tools::swap::run(&ctx, serde_json::from_str(&payload)?).await,
        "abort" => hansolo_core::tools::abort::run(&ctx, serde_json::from_str(&payload)?).await,
        "hotfix" => {
            hansolo_core::tools::hotfix::run(&ctx, serde_json::from_str(&payload)?).await
        }
        "cleanup" => {
            hansolo_core::tools::cleanup::run(&ctx, serde_json::from_str(&payload)?).await
        }
        "sessions" => {
            hansolo_core::tools::sessions::run(&ctx, serde_json::from_str(&payload)?).await
        }
        "status" => {
            hansolo_core::tools::status::run(&ctx, serde_json::from_str(&payload)?).await
        }
        other => bail!("unknown tool '{other}'"),
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn build_context(workspace_root: PathBuf) -> Result<ToolContext> {
    let config = Arc::new(Config::load(&workspace_root).context("loading .hansolo/config.json")?);

    let git: Arc<dyn GitAdapter> = Arc::new(
        LocalGitAdapter::open(&workspace_root, config.remote_name.clone())
            .context("opening git repository")?,
    );

    let (owner, repo) = remote_owner_repo(&workspace_root, &config.remote_name)
        .context("resolving forge owner/repo from the configured remote")?;
    let forge: Arc<dyn ForgeAdapter> =
        Arc::from(build_forge(&config, &owner, &repo).context("configuring forge adapter")?);

    let audit = AuditLog::new(Config::audit_log_path(&workspace_root), config.session_lock_timeout);
    let sessions = Arc::new(SessionStore::new(
        Config::sessions_dir(&workspace_root),
        config.session_lock_timeout,
        chrono::Duration::from_std(config.session_ttl).unwrap_or(chrono::Duration::days(7)),
        audit.clone(),
    ));

    Ok(ToolContext::new(workspace_root, config, git, forge, sessions, Arc::new(audit)))
}

/// Parses `owner/repo` out of a remote's URL (`git@host:owner/repo.git` or
/// `https://host/owner/repo.git`), the way `build_forge` needs it but no
/// adapter method currently surfaces directly.
fn remote_owner_repo(workspace_root: &std::path::Path, remote_name: &str) -> Result<(String, String)> {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(workspace_root)
        .args(["remote", "get-url", remote_name])
        .output()
        .context("running git remote get-url")?;
    if !output.status.success() {
        bail!("no '{remote_name}' remote configured");
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();

    let re = regex::Regex::new(r"[:/]([^/:]+)/([^/]+?)(\.git)?/?$").unwrap();
    let caps = re.captures(&url).with_context(|| format!("could not parse owner/repo from '{url}'"))?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}
