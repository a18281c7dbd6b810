//! `sessions` (spec §4.6): read-only listing of known sessions, with an
//! optional maintenance sweep and per-session audit trail.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::session::Session;
use crate::validation::CheckReport;

use super::{ToolContext, ToolResult};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SessionsInput {
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub cleanup: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SessionSummary {
    pub id: uuid::Uuid,
    pub branch_name: String,
    pub workflow_type: String,
    pub state: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct SessionsOutput {
    pub sessions: Vec<SessionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<super::cleanup::CleanupOutput>,
}

pub async fn run(ctx: &ToolContext, input: SessionsInput) -> ToolResult {
    let mut cleanup_output = None;
    if input.cleanup {
        let result = super::cleanup::run(ctx, super::cleanup::CleanupInput { delete_branches: false }).await;
        if let Ok(output) = serde_json::from_value::<super::cleanup::CleanupOutput>(result.data) {
            cleanup_output = Some(output);
        }
    }

    let sessions = if input.all {
        ctx.sessions.list_all(true)
    } else {
        ctx.sessions.list_active()
    };
    let sessions = match sessions {
        Ok(s) => s,
        Err(e) => return ToolResult::error(CheckReport::new(vec![internal_outcome()]), e.to_string()),
    };

    let summaries = sessions
        .into_iter()
        .map(|s| summarize(ctx, s, input.verbose))
        .collect();

    ToolResult {
        success: true,
        pre_flight: CheckReport::new(vec![internal_pass()]),
        errors: Vec::new(),
        warnings: Vec::new(),
        data: serde_json::to_value(SessionsOutput {
            sessions: summaries,
            cleanup: cleanup_output,
        })
        .unwrap_or_default(),
        next_steps: Vec::new(),
        post_flight: None,
    }
}

fn summarize(ctx: &ToolContext, session: Session, verbose: bool) -> SessionSummary {
    let audit = if verbose {
        ctx.audit
            .read_for(session.id)
            .ok()
            .map(|entries| entries.into_iter().filter_map(|e| serde_json::to_value(e).ok()).collect())
    } else {
        None
    };
    SessionSummary {
        id: session.id,
        branch_name: session.branch_name,
        workflow_type: format!("{:?}", session.workflow_type).to_lowercase(),
        state: format!("{:?}", session.state),
        created_at: session.created_at,
        updated_at: session.updated_at,
        expires_at: session.expires_at,
        pr_number: session.pr.as_ref().map(|pr| pr.number),
        pr_url: session.pr.as_ref().map(|pr| pr.url.clone()),
        audit,
    }
}

fn internal_outcome() -> crate::validation::CheckOutcome {
    crate::validation::CheckOutcome {
        name: "internal",
        severity: crate::validation::Severity::Error,
        passed: false,
        message: "could not list sessions".to_string(),
        details: Default::default(),
    }
}

fn internal_pass() -> crate::validation::CheckOutcome {
    crate::validation::CheckOutcome {
        name: "read-only",
        severity: crate::validation::Severity::Info,
        passed: true,
        message: "sessions is a read-only query".to_string(),
        details: Default::default(),
    }
}
