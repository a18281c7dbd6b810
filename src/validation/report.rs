//! Check reports (spec §4.4): the structured result every pre-flight and
//! post-flight evaluation produces.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
    #[serde(default)]
    pub details: CheckDetails,
}

/// A non-empty list of check results (spec.md §4.4: "a non-empty list of
/// results"). Evaluated in catalogue order even when an early check fails,
/// so the caller sees every blocker in one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub results: Vec<CheckOutcome>,
}

impl CheckReport {
    pub fn new(results: Vec<CheckOutcome>) -> Self {
        debug_assert!(!results.is_empty(), "check report must not be empty");
        Self { results }
    }

    /// Passes iff no `error`-severity check failed (spec.md §4.4). Warnings
    /// are surfaced but never block.
    pub fn passed(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.passed || r.severity != Severity::Error)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.passed && r.severity == Severity::Warning)
            .map(|r| r.message.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.passed && r.severity == Severity::Error)
            .map(|r| r.message.clone())
            .collect()
    }

    /// A stable short digest for the audit log (spec.md §3 "check-report
    /// digest"), not a cryptographic hash — just enough to tell two reports
    /// apart at a glance.
    pub fn digest(&self) -> String {
        let summary: Vec<String> = self
            .results
            .iter()
            .map(|r| format!("{}:{}", r.name, if r.passed { "ok" } else { "fail" }))
            .collect();
        summary.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &'static str, severity: Severity, passed: bool) -> CheckOutcome {
        CheckOutcome {
            name,
            severity,
            passed,
            message: String::new(),
            details: CheckDetails::default(),
        }
    }

    #[test]
    fn warning_failure_does_not_block() {
        let report = CheckReport::new(vec![outcome("a", Severity::Warning, false)]);
        assert!(report.passed());
        assert_eq!(report.warnings().len(), 1);
        assert!(report.errors().is_empty());
    }

    #[test]
    fn error_failure_blocks() {
        let report = CheckReport::new(vec![
            outcome("a", Severity::Warning, false),
            outcome("b", Severity::Error, false),
        ]);
        assert!(!report.passed());
        assert_eq!(report.errors().len(), 1);
    }
}
