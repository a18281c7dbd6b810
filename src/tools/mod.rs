//! Workflow Tools (C6, spec §4.6): one file per tool, each exporting an
//! `{Tool}Input`/`{Tool}Output` pair and a `run(ctx, input) -> ToolResult`
//! function — the same one-operation-per-file layout the teacher uses under
//! its own `src/tools/`.

pub mod abort;
pub mod cleanup;
pub mod commit;
pub mod context;
pub mod hotfix;
pub mod launch;
pub mod naming;
pub mod sessions;
pub mod ship;
pub mod status;
pub mod swap;

pub use context::{CancellationToken, ToolContext};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::validation::CheckReport;

/// `serde(default = "...")` needs a free function; shared by every tool
/// input whose boolean flags default to `true` (spec §4.6: launch's
/// `popStash`, ship's `push`/`createPR`/`merge`).
pub(crate) fn default_true() -> bool {
    true
}

/// The shape every tool returns (spec §4.6). `data` is tool-specific and
/// left as a free-form JSON value rather than a per-tool enum, so the MCP
/// and local-CLI surfaces can serialize it uniformly.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolResult {
    pub success: bool,
    pub pre_flight: CheckReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_flight: Option<CheckReport>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Advisory, never required (spec §4.6).
    #[serde(default)]
    pub next_steps: Vec<String>,
}

impl ToolResult {
    pub fn preflight_failed(pre_flight: CheckReport) -> Self {
        let errors = pre_flight.errors();
        let warnings = pre_flight.warnings();
        Self {
            success: false,
            pre_flight,
            post_flight: None,
            errors,
            warnings,
            data: serde_json::Value::Null,
            next_steps: Vec::new(),
        }
    }

    pub fn error(pre_flight: CheckReport, message: impl Into<String>) -> Self {
        let mut warnings = pre_flight.warnings();
        let _ = &mut warnings;
        Self {
            success: false,
            pre_flight,
            post_flight: None,
            errors: vec![message.into()],
            warnings,
            data: serde_json::Value::Null,
            next_steps: Vec::new(),
        }
    }
}
