//! Regression orchestration: selection, suite dispatch and aggregation.

use tracing::{debug, info, warn};

use crate::fixture::{FixtureIndex, Mode, Selection};
use crate::gate::{RegressionGate, RegressionReport, ReportEntry};
use crate::suite::{SuiteContext, SuiteRegistry, SuiteResult};

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: Mode,
    /// Restrict the run to one suite.
    pub suite: Option<String>,
}

impl RunOptions {
    pub fn new(mode: Mode) -> Self {
        Self { mode, suite: None }
    }

    pub fn with_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }
}

/// Selection listing produced by `--dry-run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRun {
    pub selection: Selection,
}

impl DryRun {
    pub fn render(&self) -> String {
        let mut out = format!(
            "DRY-RUN mode={} suite={} fixtures={}\n",
            self.selection.mode,
            self.selection.suite.as_deref().unwrap_or("all"),
            self.selection.len()
        );
        for fixture in &self.selection.fixtures {
            out.push_str(&format!("- {} ({})\n", fixture.fixture_id, fixture.suite));
        }
        out
    }

    /// An empty selection is a failure even when nothing runs.
    pub fn exit_code(&self) -> i32 {
        if self.selection.is_empty() {
            1
        } else {
            0
        }
    }
}

/// Regression orchestrator.
pub struct Orchestrator<'a> {
    registry: &'a SuiteRegistry,
    ctx: SuiteContext,
}

impl<'a> Orchestrator<'a> {
    pub fn new(registry: &'a SuiteRegistry, ctx: SuiteContext) -> Self {
        Self { registry, ctx }
    }

    pub fn context(&self) -> &SuiteContext {
        &self.ctx
    }

    /// Report the selection without running anything.
    pub fn dry_run(&self, index: &FixtureIndex, options: &RunOptions) -> DryRun {
        DryRun {
            selection: index.select(options.mode, options.suite.as_deref()),
        }
    }

    /// Run every selected suite and evaluate the gate.
    ///
    /// Suites run in sorted-name order and each receives its fixtures in
    /// sorted-id order, so identical inputs produce identical reports.
    pub fn run(&self, index: &FixtureIndex, options: &RunOptions) -> RegressionReport {
        let selection = index.select(options.mode, options.suite.as_deref());
        let suites = selection.suite_names();

        info!(
            mode = %options.mode,
            suite = options.suite.as_deref().unwrap_or("all"),
            fixtures = selection.len(),
            "Starting regression run"
        );

        if selection.is_empty() {
            warn!("No fixtures matched selection");
        }

        let mut entries = Vec::new();
        for name in &suites {
            let Some(suite) = self.registry.resolve(name) else {
                warn!(suite = %name, "No runner registered for suite");
                entries.push(ReportEntry::from_result(
                    name,
                    SuiteResult::new(
                        format!("suite-{}", name),
                        "runner_available",
                        false,
                        format!("no runner registered for suite '{}'", name),
                    ),
                ));
                continue;
            };

            let fixtures = selection.for_suite(name);
            info!(suite = %name, fixtures = fixtures.len(), "Executing suite");

            let results = suite.run(options.mode, &fixtures, &self.ctx);
            for result in results {
                debug!(
                    suite = %name,
                    fixture_id = %result.fixture_id,
                    assertion = %result.assertion,
                    passed = result.passed,
                    "Suite result"
                );
                entries.push(ReportEntry::from_result(name, result));
            }
        }

        let report = RegressionGate::evaluate(&selection, suites, entries);
        info!(
            status = report.status.as_str(),
            passed = report.passed,
            failed = report.failed,
            "Regression run finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureDescriptor;
    use crate::gate::RunStatus;
    use crate::suite::Suite;
    use serde_json::json;
    use std::path::PathBuf;

    /// Passes every fixture whose id does not start with `bad`.
    struct EchoSuite;

    impl Suite for EchoSuite {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn run(
            &self,
            mode: Mode,
            fixtures: &[FixtureDescriptor],
            _ctx: &SuiteContext,
        ) -> Vec<SuiteResult> {
            fixtures
                .iter()
                .map(|f| {
                    SuiteResult::new(
                        &f.fixture_id,
                        "echo",
                        !f.fixture_id.starts_with("bad"),
                        format!("mode={}", mode),
                    )
                })
                .collect()
        }
    }

    fn index() -> FixtureIndex {
        serde_json::from_value(json!({
            "fixtures": [
                {"fixture_id": "ok-2", "suite": "echo", "path": "x"},
                {"fixture_id": "ok-1", "suite": "echo", "path": "x", "modes": ["quick"]},
                {"fixture_id": "bad-1", "suite": "echo", "path": "x", "modes": ["full"]},
                {"fixture_id": "lost", "suite": "ghost", "path": "x"}
            ]
        }))
        .unwrap()
    }

    fn ctx() -> SuiteContext {
        SuiteContext::new(PathBuf::from("/nonexistent/tests"))
    }

    #[test]
    fn test_run_filters_and_orders() {
        let registry = SuiteRegistry::new().with(Box::new(EchoSuite));
        let orchestrator = Orchestrator::new(&registry, ctx());

        let report = orchestrator.run(&index(), &RunOptions::new(Mode::Quick).with_suite("echo"));
        assert_eq!(report.status, RunStatus::Passed);
        let ids: Vec<&str> = report.results.iter().map(|r| r.fixture_id.as_str()).collect();
        assert_eq!(ids, vec!["ok-1", "ok-2"]);
        assert_eq!(report.results[0].detail, "mode=quick");
    }

    #[test]
    fn test_missing_runner_is_a_failure() {
        let registry = SuiteRegistry::new().with(Box::new(EchoSuite));
        let orchestrator = Orchestrator::new(&registry, ctx());

        let report = orchestrator.run(&index(), &RunOptions::new(Mode::Full));
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.suites, vec!["echo", "ghost"]);
        let failures = report.failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].fixture_id, "bad-1");
        assert_eq!(failures[1].fixture_id, "suite-ghost");
        assert_eq!(failures[1].assertion, "runner_available");
    }

    #[test]
    fn test_empty_selection_fails() {
        let registry = SuiteRegistry::builtin();
        let orchestrator = Orchestrator::new(&registry, ctx());

        let report = orchestrator.run(&index(), &RunOptions::new(Mode::Quick).with_suite("parser"));
        assert_eq!(report.status, RunStatus::Failed);
        assert!(report.empty_selection);
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_dry_run_render() {
        let registry = SuiteRegistry::builtin();
        let orchestrator = Orchestrator::new(&registry, ctx());

        let dry = orchestrator.dry_run(&index(), &RunOptions::new(Mode::Quick));
        assert_eq!(
            dry.render(),
            "DRY-RUN mode=quick suite=all fixtures=3\n- lost (ghost)\n- ok-1 (echo)\n- ok-2 (echo)\n"
        );
        assert_eq!(dry.exit_code(), 0);

        let empty = orchestrator.dry_run(&index(), &RunOptions::new(Mode::Full).with_suite("smoke"));
        assert_eq!(empty.render(), "DRY-RUN mode=full suite=smoke fixtures=0\n");
        assert_eq!(empty.exit_code(), 1);
    }
}
