//! Report model: the structured outcome of checking one URL.
//!
//! A report carries two maps of findings, keyed by a stable finding name
//! (e.g. `"404 error (page not found)"`, `"Slow page load"`) with
//! human-readable detail messages, plus a `problem_summary` and
//! `suggested_fix` derived from the most severe finding. Findings are data,
//! not failures: a report full of errors is still a successful check.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one engine run over a single URL.
///
/// Errors take precedence over warnings when deriving the summary and fix:
/// the first error recorded wins, otherwise the first warning does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub errors: BTreeMap<String, Vec<String>>,
    pub warnings: BTreeMap<String, Vec<String>>,
    pub problem_summary: Option<String>,
    pub suggested_fix: Option<String>,
    #[serde(skip)]
    summary_from_error: bool,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error finding. The first error recorded sets the summary
    /// and fix, displacing any warning-derived summary.
    pub fn add_error(
        &mut self,
        key: impl Into<String>,
        message: impl Into<String>,
        summary: &str,
        fix: &str,
    ) {
        if !self.summary_from_error {
            self.problem_summary = Some(summary.to_string());
            self.suggested_fix = Some(fix.to_string());
            self.summary_from_error = true;
        }
        self.errors
            .entry(key.into())
            .or_default()
            .push(message.into());
    }

    /// Record a warning finding. Sets the summary and fix only when no
    /// finding has set them yet.
    pub fn add_warning(
        &mut self,
        key: impl Into<String>,
        message: impl Into<String>,
        summary: &str,
        fix: &str,
    ) {
        if self.problem_summary.is_none() {
            self.problem_summary = Some(summary.to_string());
            self.suggested_fix = Some(fix.to_string());
        }
        self.warnings
            .entry(key.into())
            .or_default()
            .push(message.into());
    }

    /// Fold another report into this one, keeping error-derived summaries
    /// ahead of warning-derived ones.
    pub fn merge(&mut self, other: Report) {
        if other.summary_from_error && !self.summary_from_error {
            self.problem_summary = other.problem_summary.clone();
            self.suggested_fix = other.suggested_fix.clone();
            self.summary_from_error = true;
        } else if self.problem_summary.is_none() {
            self.problem_summary = other.problem_summary.clone();
            self.suggested_fix = other.suggested_fix.clone();
        }

        for (key, mut messages) in other.errors {
            self.errors.entry(key).or_default().append(&mut messages);
        }
        for (key, mut messages) in other.warnings {
            self.warnings.entry(key).or_default().append(&mut messages);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_sets_summary_and_fix() {
        let mut report = Report::new();
        report.add_error("Invalid URL", "not a link", "Invalid link", "Fix the address");

        assert_eq!(report.errors["Invalid URL"], vec!["not a link"]);
        assert_eq!(report.problem_summary.as_deref(), Some("Invalid link"));
        assert_eq!(report.suggested_fix.as_deref(), Some("Fix the address"));
    }

    #[test]
    fn error_summary_displaces_warning_summary() {
        let mut report = Report::new();
        report.add_warning("Slow page load", "slow", "Slow page", "Wait");
        report.add_error("Connection failed", "down", "Unavailable", "Retry");

        assert_eq!(report.problem_summary.as_deref(), Some("Unavailable"));
        assert_eq!(report.suggested_fix.as_deref(), Some("Retry"));
    }

    #[test]
    fn first_error_wins() {
        let mut report = Report::new();
        report.add_error("Connection failed", "down", "Unavailable", "Retry");
        report.add_error("Unsafe link", "bad cert", "Unsafe", "Contact owner");

        assert_eq!(report.problem_summary.as_deref(), Some("Unavailable"));
    }

    #[test]
    fn merge_combines_maps_and_prefers_error_summary() {
        let mut base = Report::new();
        base.add_warning("Suspicious URL", "risky tld", "Suspicious domain", "Check trust");

        let mut other = Report::new();
        other.add_error("Timeout error", "timed out", "Unavailable", "Retry later");

        base.merge(other);

        assert!(base.errors.contains_key("Timeout error"));
        assert!(base.warnings.contains_key("Suspicious URL"));
        assert_eq!(base.problem_summary.as_deref(), Some("Unavailable"));
    }

    #[test]
    fn repeated_key_appends_messages() {
        let mut report = Report::new();
        report.add_warning("Suspicious URL", "first", "Suspicious domain", "Check");
        report.add_warning("Suspicious URL", "second", "Suspicious domain", "Check");

        assert_eq!(report.warnings["Suspicious URL"].len(), 2);
    }

    #[test]
    fn clean_report_has_no_summary() {
        let report = Report::new();
        assert!(report.is_clean());
        assert!(report.problem_summary.is_none());
        assert!(report.suggested_fix.is_none());
    }
}
