//! AgentGate regression - fixture-driven verdicts for agent builds
//!
//! Provides a regression orchestrator that:
//! - Loads a fixture index and selects fixtures by mode and suite
//! - Dispatches each suite's fixtures to a statically registered runner
//! - Aggregates results into a deterministic, diffable report

pub mod error;
pub mod fixture;
pub mod gate;
pub mod orchestrator;
pub mod suite;
pub mod suites;

// Re-export key types
pub use error::{RegressError, Result};
pub use fixture::{FixtureDescriptor, FixtureIndex, Mode, Selection};
pub use gate::{write_report_json, RegressionGate, RegressionReport, ReportEntry, RunStatus};
pub use orchestrator::{DryRun, Orchestrator, RunOptions};
pub use suite::{Suite, SuiteContext, SuiteRegistry, SuiteResult};

/// Index file name inside the regression tests directory.
pub const FIXTURE_INDEX_FILE: &str = "fixture_index.json";
