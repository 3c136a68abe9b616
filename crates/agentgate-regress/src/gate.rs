//! Regression gate: pass/fail verdict and report rendering.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fixture::{Mode, Selection};
use crate::suite::SuiteResult;

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Passed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
        }
    }
}

/// A suite result tagged with the suite that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportEntry {
    pub suite: String,
    pub fixture_id: String,
    pub assertion: String,
    pub passed: bool,
    pub detail: String,
}

impl ReportEntry {
    pub fn from_result(suite: &str, result: SuiteResult) -> Self {
        Self {
            suite: suite.to_string(),
            fixture_id: result.fixture_id,
            assertion: result.assertion,
            passed: result.passed,
            detail: result.detail,
        }
    }
}

/// Aggregated outcome of one regression run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegressionReport {
    pub mode: Mode,

    /// Suite requested with `--suite`, if any.
    pub suite_filter: Option<String>,

    /// Digest of the ordered selection.
    pub selection_digest: String,

    pub status: RunStatus,

    /// Suites that were dispatched, in execution order.
    pub suites: Vec<String>,

    /// Number of passing results.
    pub passed: usize,

    /// Number of failing results.
    pub failed: usize,

    /// True when no fixture matched the selection.
    pub empty_selection: bool,

    /// Every result, in execution order.
    pub results: Vec<ReportEntry>,
}

impl RegressionReport {
    /// Failing results sorted by `(fixture_id, assertion)`.
    pub fn failures(&self) -> Vec<&ReportEntry> {
        let mut failures: Vec<&ReportEntry> = self.results.iter().filter(|r| !r.passed).collect();
        failures.sort_by(|a, b| {
            a.fixture_id
                .cmp(&b.fixture_id)
                .then_with(|| a.assertion.cmp(&b.assertion))
        });
        failures
    }

    /// Render the report as printed on stdout, one line per entry.
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();

        if self.empty_selection {
            out.push_str("FAIL fixture_index semantic no fixtures matched selection\n");
            return out;
        }

        if verbose {
            for entry in &self.results {
                out.push_str(&format!(
                    "{} {} {} {} {}\n",
                    entry.suite.to_ascii_uppercase(),
                    entry.fixture_id,
                    entry.assertion,
                    if entry.passed { "PASS" } else { "FAIL" },
                    entry.detail
                ));
            }
        }

        match self.status {
            RunStatus::Failed => {
                for failure in self.failures() {
                    out.push_str(&format!(
                        "FAIL {} {} {}\n",
                        failure.fixture_id, failure.assertion, failure.detail
                    ));
                }
                out.push_str(&format!(
                    "SUMMARY status=failed mode={} passed={} failed={}\n",
                    self.mode, self.passed, self.failed
                ));
            }
            RunStatus::Passed => {
                out.push_str(&format!(
                    "SUMMARY status=passed mode={} suites={} checks={}\n",
                    self.mode,
                    self.suites.len(),
                    self.passed
                ));
            }
        }

        out
    }

    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Passed => 0,
            RunStatus::Failed => 1,
        }
    }
}

/// Regression gate rules.
pub struct RegressionGate;

impl RegressionGate {
    /// Evaluate a run.
    ///
    /// Gate rule:
    /// - An empty selection fails
    /// - Any result with `passed == false` fails
    /// - Otherwise the run passes
    pub fn evaluate(
        selection: &Selection,
        suites: Vec<String>,
        results: Vec<ReportEntry>,
    ) -> RegressionReport {
        let passed = results.iter().filter(|r| r.passed).count();
        let failed = results.len() - passed;
        let empty_selection = selection.is_empty();

        let status = if empty_selection || failed > 0 {
            RunStatus::Failed
        } else {
            RunStatus::Passed
        };

        RegressionReport {
            mode: selection.mode,
            suite_filter: selection.suite.clone(),
            selection_digest: selection.digest(),
            status,
            suites,
            passed,
            failed,
            empty_selection,
            results,
        }
    }
}

/// Write the report as pretty JSON.
pub fn write_report_json(path: &Path, report: &RegressionReport) -> Result<()> {
    let mut content = serde_json::to_string_pretty(report)?;
    content.push('\n');
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureIndex;
    use serde_json::json;

    fn selection() -> Selection {
        let index: FixtureIndex = serde_json::from_value(json!({
            "fixtures": [
                {"fixture_id": "b", "suite": "parser", "path": "b.bin"},
                {"fixture_id": "a", "suite": "smoke", "path": "a.json"}
            ]
        }))
        .unwrap();
        index.select(Mode::Quick, None)
    }

    fn entry(suite: &str, id: &str, assertion: &str, passed: bool) -> ReportEntry {
        ReportEntry {
            suite: suite.to_string(),
            fixture_id: id.to_string(),
            assertion: assertion.to_string(),
            passed,
            detail: "d".to_string(),
        }
    }

    #[test]
    fn test_all_passed() {
        let report = RegressionGate::evaluate(
            &selection(),
            vec!["parser".into(), "smoke".into()],
            vec![
                entry("parser", "b", "reject_continue", true),
                entry("smoke", "a", "callback_semantic_match", true),
            ],
        );
        assert_eq!(report.status, RunStatus::Passed);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            report.render(false),
            "SUMMARY status=passed mode=quick suites=2 checks=2\n"
        );
    }

    #[test]
    fn test_failures_sorted_by_fixture_then_assertion() {
        let report = RegressionGate::evaluate(
            &selection(),
            vec!["parser".into(), "smoke".into()],
            vec![
                entry("parser", "z", "reject_continue", false),
                entry("parser", "b", "reject_continue", true),
                entry("smoke", "a", "zeta", false),
                entry("smoke", "a", "alpha", false),
            ],
        );
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            report.render(false),
            "FAIL a alpha d\nFAIL a zeta d\nFAIL z reject_continue d\nSUMMARY status=failed mode=quick passed=1 failed=3\n"
        );
    }

    #[test]
    fn test_verbose_lists_every_result_in_order() {
        let report = RegressionGate::evaluate(
            &selection(),
            vec!["parser".into()],
            vec![entry("parser", "b", "reject_continue", true)],
        );
        assert_eq!(
            report.render(true),
            "PARSER b reject_continue PASS d\nSUMMARY status=passed mode=quick suites=1 checks=1\n"
        );
    }

    #[test]
    fn test_empty_selection_fails() {
        let empty = FixtureIndex::default().select(Mode::Full, Some("parser"));
        let report = RegressionGate::evaluate(&empty, Vec::new(), Vec::new());
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(
            report.render(true),
            "FAIL fixture_index semantic no fixtures matched selection\n"
        );
    }

    #[test]
    fn test_write_report_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = RegressionGate::evaluate(
            &selection(),
            vec!["parser".into()],
            vec![entry("parser", "b", "reject_continue", false)],
        );
        write_report_json(&path, &report).unwrap();

        let written: RegressionReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, report);
        assert_eq!(written.status, RunStatus::Failed);
    }
}
