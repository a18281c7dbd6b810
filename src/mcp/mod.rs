//! MCP surface (C7, spec §5): a stdio-only `rmcp` server exposing the nine
//! workflow tools. No SSE/HTTP transport, no prompt templates — spec.md §1's
//! "single agent, single workspace, local execution" scope keeps this module
//! deliberately thin rather than mirroring the teacher's multi-transport
//! `kodegen_server_http` setup (not a real crate we can depend on anyway).

use std::sync::Arc;

use rmcp::handler::server::tool::{Parameters, ToolRouter};
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};

use crate::tools::{
    abort::{self, AbortInput},
    cleanup::{self, CleanupInput},
    commit::{self, CommitInput},
    hotfix::{self, HotfixInput},
    launch::{self, LaunchInput},
    sessions::{self, SessionsInput},
    ship::{self, ShipInput},
    status::{self, StatusInput},
    swap::{self, SwapInput},
    ToolContext, ToolResult,
};

fn to_call_result(result: ToolResult) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(&result)
        .map_err(|e| McpError::internal_error(format!("could not serialize tool result: {e}"), None))?;
    if result.success {
        Ok(CallToolResult::success(vec![Content::text(json)]))
    } else {
        Ok(CallToolResult::error(vec![Content::text(json)]))
    }
}

/// Holds the shared [`ToolContext`] and wires each workflow tool to an MCP
/// tool name via `rmcp`'s router macros.
#[derive(Clone)]
pub struct HansoloServer {
    ctx: Arc<ToolContext>,
    tool_router: ToolRouter<HansoloServer>,
}

#[tool_router]
impl HansoloServer {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Start a standard feature workflow: branch from main and open a session")]
    async fn launch(&self, Parameters(input): Parameters<LaunchInput>) -> Result<CallToolResult, McpError> {
        to_call_result(launch::run(&self.ctx, input).await)
    }

    #[tool(description = "Commit staged or all changes on the current session branch")]
    async fn commit(&self, Parameters(input): Parameters<CommitInput>) -> Result<CallToolResult, McpError> {
        to_call_result(commit::run(&self.ctx, input).await)
    }

    #[tool(description = "Push, open or update a pull request, wait for checks, and merge")]
    async fn ship(&self, Parameters(input): Parameters<ShipInput>) -> Result<CallToolResult, McpError> {
        to_call_result(ship::run(&self.ctx, input).await)
    }

    #[tool(description = "Switch to another session's branch, stashing and restoring work as needed")]
    async fn swap(&self, Parameters(input): Parameters<SwapInput>) -> Result<CallToolResult, McpError> {
        to_call_result(swap::run(&self.ctx, input).await)
    }

    #[tool(description = "Terminate a session without shipping it")]
    async fn abort(&self, Parameters(input): Parameters<AbortInput>) -> Result<CallToolResult, McpError> {
        to_call_result(abort::run(&self.ctx, input).await)
    }

    #[tool(description = "Start an expedited hotfix workflow from main")]
    async fn hotfix(&self, Parameters(input): Parameters<HotfixInput>) -> Result<CallToolResult, McpError> {
        to_call_result(hotfix::run(&self.ctx, input).await)
    }

    #[tool(description = "Remove terminal sessions whose branches are merged or already gone")]
    async fn cleanup(&self, Parameters(input): Parameters<CleanupInput>) -> Result<CallToolResult, McpError> {
        to_call_result(cleanup::run(&self.ctx, input).await)
    }

    #[tool(description = "List known sessions")]
    async fn sessions(&self, Parameters(input): Parameters<SessionsInput>) -> Result<CallToolResult, McpError> {
        to_call_result(sessions::run(&self.ctx, input).await)
    }

    #[tool(description = "Snapshot the current branch and its session, if any")]
    async fn status(&self, Parameters(input): Parameters<StatusInput>) -> Result<CallToolResult, McpError> {
        to_call_result(status::run(&self.ctx, input).await)
    }
}

#[tool_handler]
impl ServerHandler for HansoloServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "hansolo".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Deterministic Git workflow orchestrator. Use launch/hotfix to start a session, \
                 commit to record work, ship to push/PR/merge, swap/abort/cleanup to manage sessions, \
                 and sessions/status to inspect them."
                    .to_string(),
            ),
        }
    }
}
