//! `status` (spec §4.6): a read-only snapshot of the current branch and its
//! session, if any.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::validation::CheckReport;

use super::{ToolContext, ToolResult};

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct StatusInput {}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StatusOutput {
    pub branch_name: String,
    pub clean: bool,
    pub has_session: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<uuid::Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
}

pub async fn run(ctx: &ToolContext, _input: StatusInput) -> ToolResult {
    let branch_name = match ctx.git.current_branch().await {
        Ok(b) => b,
        Err(e) => return ToolResult::error(CheckReport::new(vec![internal_outcome()]), e.to_string()),
    };
    let clean = ctx.git.is_clean().await.unwrap_or(false);

    let session = match ctx.sessions.get(&branch_name) {
        Ok(s) => s,
        Err(e) => return ToolResult::error(CheckReport::new(vec![internal_outcome()]), e.to_string()),
    };

    let output = match &session {
        Some(s) => StatusOutput {
            branch_name: branch_name.clone(),
            clean,
            has_session: true,
            session_id: Some(s.id),
            workflow_type: Some(format!("{:?}", s.workflow_type).to_lowercase()),
            state: Some(format!("{:?}", s.state)),
            pr_number: s.pr.as_ref().map(|pr| pr.number),
            pr_url: s.pr.as_ref().map(|pr| pr.url.clone()),
        },
        None => StatusOutput {
            branch_name: branch_name.clone(),
            clean,
            has_session: false,
            session_id: None,
            workflow_type: None,
            state: None,
            pr_number: None,
            pr_url: None,
        },
    };

    ToolResult {
        success: true,
        pre_flight: CheckReport::new(vec![internal_pass()]),
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
        message: "could not read status".to_string(),
        details: Default::default(),
    }
}

fn internal_pass() -> crate::validation::CheckOutcome {
    crate::validation::CheckOutcome {
        name: "read-only",
        severity: crate::validation::Severity::Info,
        passed: true,
        message: "status is a read-only query".to_string(),
        details: Default::default(),
    }
}
