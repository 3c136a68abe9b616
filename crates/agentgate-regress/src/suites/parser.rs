//! Malformed task-frame checks for the reject-and-continue contract.

use std::collections::BTreeMap;
use std::path::Path;

use agentgate_core::anchors::SourceAnchor;
use agentgate_core::frame::{parse_tasks, Outcome};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RegressError;
use crate::fixture::{FixtureDescriptor, Mode};
use crate::suite::{Suite, SuiteContext, SuiteResult};

/// Expectation matrix, relative to the tests directory.
pub const MATRIX_PATH: &str = "cases/parser_reject_continue.json";

const ANCHORS: &[SourceAnchor] = &[SourceAnchor {
    file: "src/commands.c",
    symbols: &["validate_task_layout", "commands_parse_tasks"],
}];

/// Expected dispatcher behaviour for one fixture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Expected {
    #[serde(default = "default_outcome")]
    pub outcome: Outcome,
    #[serde(default = "default_continue")]
    pub reject_continue: bool,
}

impl Default for Expected {
    fn default() -> Self {
        Self {
            outcome: default_outcome(),
            reject_continue: default_continue(),
        }
    }
}

fn default_outcome() -> Outcome {
    Outcome::Reject
}

fn default_continue() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixCase {
    pub fixture_id: String,
    #[serde(default)]
    pub expected: Expected,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Matrix {
    #[serde(default)]
    pub cases: Vec<MatrixCase>,
}

impl Matrix {
    fn into_map(self) -> BTreeMap<String, Expected> {
        self.cases
            .into_iter()
            .map(|case| (case.fixture_id, case.expected))
            .collect()
    }
}

/// Runs each fixture's bytes through the task dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserSuite;

impl ParserSuite {
    fn load_matrix(
        ctx: &SuiteContext,
    ) -> Result<BTreeMap<String, Expected>, RegressError> {
        let relative = Path::new(MATRIX_PATH);
        if !ctx.fixture_path(relative).exists() {
            warn!(path = ?ctx.fixture_path(relative), "No parser expectation matrix; expecting reject/continue");
            return Ok(BTreeMap::new());
        }
        ctx.load_json::<Matrix>(relative).map(Matrix::into_map)
    }

    fn check(fixture: &FixtureDescriptor, expected: Expected, data: &[u8]) -> SuiteResult {
        let observed = parse_tasks(data);
        let passed =
            observed.outcome == expected.outcome && observed.continue_loop == expected.reject_continue;
        let detail = format!(
            "expected={}/{} actual={}/{} reason={}",
            expected.outcome,
            expected.reject_continue,
            observed.outcome,
            observed.continue_loop,
            observed.reason
        );
        SuiteResult::new(&fixture.fixture_id, "reject_continue", passed, detail)
    }
}

impl Suite for ParserSuite {
    fn name(&self) -> &'static str {
        "parser"
    }

    fn run(
        &self,
        _mode: Mode,
        fixtures: &[FixtureDescriptor],
        ctx: &SuiteContext,
    ) -> Vec<SuiteResult> {
        let mut results = vec![ctx.anchor_result(
            "parser-source-anchor",
            "commands_source_anchor",
            ANCHORS,
            "source anchors present",
            "missing parser anchors in commands.c",
        )];

        let matrix = match Self::load_matrix(ctx) {
            Ok(matrix) => matrix,
            Err(e) => {
                results.push(SuiteResult::fixture_load_failure("parser-matrix", &e));
                BTreeMap::new()
            }
        };

        for fixture in fixtures {
            let data = match ctx.load_bytes(&fixture.path) {
                Ok(data) => data,
                Err(e) => {
                    results.push(SuiteResult::fixture_load_failure(&fixture.fixture_id, &e));
                    continue;
                }
            };
            let expected = matrix
                .get(&fixture.fixture_id)
                .copied()
                .unwrap_or_default();
            debug!(fixture_id = %fixture.fixture_id, bytes = data.len(), "Checking task frame");
            results.push(Self::check(fixture, expected, &data));
        }

        results
    }
}
