//! `hansolo_core`: the library half of the `hansolo` crate (spec.md
//! OVERVIEW). Implements the session-tracked Git workflow orchestrator —
//! launch/commit/ship/swap/abort/hotfix/cleanup/sessions/status — behind
//! adapter traits so the MCP server and the CLI binary share one engine.

pub mod audit;
pub mod config;
pub mod error;
pub mod forge;
pub mod git;
pub mod mcp;
pub mod session;
pub mod tools;
pub mod validation;
pub mod workflow;

pub use config::Config;
pub use error::{HansoloError, HansoloResult};
