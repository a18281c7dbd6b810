//! State Machines (C5): standard and hotfix workflow transition tables.

pub mod machine;

pub use machine::{Machine, State, WorkflowType};
