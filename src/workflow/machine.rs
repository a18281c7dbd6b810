//! State Machines (C5, spec §4.5): standard and hotfix workflows as static
//! transition tables, not trait objects — the edge set is closed and known
//! at compile time, the same reason the teacher keeps its own tool catalogue
//! as plain data rather than a dispatch hierarchy.

use serde::{Deserialize, Serialize};

/// Node in either workflow's state graph. Both machines share one enum so
/// `Session.state` doesn't need a sum type keyed on `workflowType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Init,
    BranchReady,
    ChangesCommitted,
    Pushed,
    PrCreated,
    WaitingApproval,
    Rebasing,
    Conflict,
    Merging,
    Cleanup,
    Complete,
    Aborted,

    HotfixInit,
    HotfixReady,
    HotfixCommitted,
    HotfixPushed,
    HotfixValidated,
    HotfixDeployed,
    HotfixCleanup,
    HotfixComplete,
}

impl State {
    /// I5 "terminal freeze": once here, no further transitions are legal.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Complete | State::Aborted | State::HotfixComplete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    Standard,
    Hotfix,
}

impl WorkflowType {
    pub fn initial_state(self) -> State {
        match self {
            WorkflowType::Standard => State::Init,
            WorkflowType::Hotfix => State::HotfixInit,
        }
    }

    fn edges(self) -> &'static [(State, State, &'static str)] {
        match self {
            WorkflowType::Standard => STANDARD_EDGES,
            WorkflowType::Hotfix => HOTFIX_EDGES,
        }
    }
}

/// Standard machine (spec §4.5). `abort` is allowed from every non-terminal
/// state, so it's generated rather than spelled out per source state.
static STANDARD_EDGES: &[(State, State, &str)] = &[
    (State::Init, State::BranchReady, "launch"),
    (State::BranchReady, State::ChangesCommitted, "commit"),
    (State::ChangesCommitted, State::ChangesCommitted, "commit"),
    (State::ChangesCommitted, State::Pushed, "ship"),
    (State::Pushed, State::PrCreated, "ship"),
    (State::PrCreated, State::WaitingApproval, "ship"),
    (State::WaitingApproval, State::Rebasing, "ship"),
    (State::Rebasing, State::PrCreated, "ship"),
    (State::Rebasing, State::Conflict, "ship"),
    (State::Conflict, State::PrCreated, "ship"),
    (State::Conflict, State::Rebasing, "ship"),
    (State::PrCreated, State::Merging, "ship"),
    (State::WaitingApproval, State::Merging, "ship"),
    (State::Merging, State::Cleanup, "ship"),
    (State::Cleanup, State::Complete, "ship"),
];

/// Hotfix machine (spec §4.5). `skipReview` never removes an edge here — it
/// is a runtime guard evaluated by `Machine::is_legal`, not a second table,
/// per spec.md §9's resolution ("route PR_CREATED -> MERGING directly").
static HOTFIX_EDGES: &[(State, State, &str)] = &[
    (State::HotfixInit, State::HotfixReady, "hotfix"),
    (State::HotfixReady, State::HotfixCommitted, "commit"),
    (State::HotfixCommitted, State::HotfixCommitted, "commit"),
    (State::HotfixCommitted, State::HotfixPushed, "ship"),
    (State::HotfixPushed, State::HotfixValidated, "ship"),
    (State::HotfixValidated, State::HotfixDeployed, "ship"),
    (State::HotfixDeployed, State::HotfixCleanup, "ship"),
    (State::HotfixCleanup, State::HotfixComplete, "ship"),
];

const ABORT_TOOL: &str = "abort";

pub struct Machine;

impl Machine {
    /// I4: `(from, to, tool)` is legal iff it is `abort` from a non-terminal
    /// state, or it appears in the workflow's static edge table.
    pub fn is_legal(workflow: WorkflowType, from: State, to: State, tool: &str) -> bool {
        if tool == ABORT_TOOL {
            return to == State::Aborted && !from.is_terminal();
        }
        workflow
            .edges()
            .iter()
            .any(|(f, t, edge_tool)| *f == from && *t == to && *edge_tool == tool)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_then_commit_is_legal() {
        assert!(Machine::is_legal(
            WorkflowType::Standard,
            State::Init,
            State::BranchReady,
            "launch"
        ));
        assert!(Machine::is_legal(
            WorkflowType::Standard,
            State::BranchReady,
            State::ChangesCommitted,
            "commit"
        ));
    }

    #[test]
    fn skipping_a_node_is_illegal() {
        assert!(!Machine::is_legal(
            WorkflowType::Standard,
            State::Init,
            State::ChangesCommitted,
            "commit"
        ));
    }

    #[test]
    fn abort_legal_from_any_nonterminal_state() {
        assert!(Machine::is_legal(
            WorkflowType::Standard,
            State::PrCreated,
            State::Aborted,
            "abort"
        ));
        assert!(!Machine::is_legal(
            WorkflowType::Standard,
            State::Complete,
            State::Aborted,
            "abort"
        ));
    }

    #[test]
    fn hotfix_conflict_requeues_into_prcreated() {
        assert!(Machine::is_legal(
            WorkflowType::Standard,
            State::Conflict,
            State::PrCreated,
            "ship"
        ));
    }
}
