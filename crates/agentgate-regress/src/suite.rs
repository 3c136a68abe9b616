//! Suite capability, per-check results and the static suite registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use agentgate_core::anchors::{check_anchors, SourceAnchor};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{RegressError, Result};
use crate::fixture::{FixtureDescriptor, Mode};
use crate::suites::{ParserSuite, ProfileSuite, ProtocolSuite, SmokeSuite};

/// Outcome of a single assertion against a single fixture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuiteResult {
    pub fixture_id: String,
    pub assertion: String,
    pub passed: bool,
    pub detail: String,
}

impl SuiteResult {
    pub fn new(
        fixture_id: impl Into<String>,
        assertion: impl Into<String>,
        passed: bool,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            fixture_id: fixture_id.into(),
            assertion: assertion.into(),
            passed,
            detail: detail.into(),
        }
    }

    /// Failing `fixture_load` result for a fixture whose file could not be used.
    pub fn fixture_load_failure(fixture_id: impl Into<String>, error: &RegressError) -> Self {
        Self::new(fixture_id, "fixture_load", false, error.to_string())
    }
}

/// Filesystem roots a suite reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteContext {
    /// Regression tests directory; fixture paths are relative to it.
    pub tests_root: PathBuf,
    /// Agent source tree (parent of the tests directory by default).
    pub agent_root: PathBuf,
}

impl SuiteContext {
    pub fn new(tests_root: PathBuf) -> Self {
        let agent_root = tests_root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| tests_root.clone());
        Self {
            tests_root,
            agent_root,
        }
    }

    pub fn with_agent_root(mut self, agent_root: PathBuf) -> Self {
        self.agent_root = agent_root;
        self
    }

    pub fn fixture_path(&self, relative: &Path) -> PathBuf {
        self.tests_root.join(relative)
    }

    pub fn agent_path(&self, relative: &str) -> PathBuf {
        self.agent_root.join(relative)
    }

    /// Read a JSON file under the tests directory.
    pub fn load_json<T: DeserializeOwned>(&self, relative: &Path) -> Result<T> {
        let path = self.fixture_path(relative);
        let content = std::fs::read_to_string(&path).map_err(|source| {
            RegressError::FixtureRead {
                path: path.clone(),
                source,
            }
        })?;
        serde_json::from_str(&content).map_err(|e| RegressError::FixtureDecode {
            path,
            message: e.to_string(),
        })
    }

    /// Read a fixture's raw bytes.
    pub fn load_bytes(&self, relative: &Path) -> Result<Vec<u8>> {
        let path = self.fixture_path(relative);
        std::fs::read(&path).map_err(|source| RegressError::FixtureRead { path, source })
    }

    /// Run an anchor check and express it as a suite result.
    pub fn anchor_result(
        &self,
        fixture_id: &str,
        assertion: &str,
        anchors: &[SourceAnchor],
        present_detail: &str,
        missing_detail: &str,
    ) -> SuiteResult {
        let report = check_anchors(&self.agent_root, anchors);
        if report.passed() {
            return SuiteResult::new(fixture_id, assertion, true, present_detail);
        }

        let mut missing = report.missing.clone();
        missing.extend(
            report
                .unreadable
                .iter()
                .map(|p| format!("unreadable {}", p.display())),
        );
        SuiteResult::new(
            fixture_id,
            assertion,
            false,
            format!("{} ({})", missing_detail, missing.join(", ")),
        )
    }
}

/// A regression suite: turns its fixtures into assertion results.
///
/// Results must come back in a deterministic order; fixtures arrive sorted
/// by id.
pub trait Suite {
    fn name(&self) -> &'static str;

    fn run(&self, mode: Mode, fixtures: &[FixtureDescriptor], ctx: &SuiteContext)
        -> Vec<SuiteResult>;
}

/// Static mapping of suite names to implementations.
#[derive(Default)]
pub struct SuiteRegistry {
    suites: BTreeMap<&'static str, Box<dyn Suite>>,
}

impl SuiteRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the four built-in suites.
    pub fn builtin() -> Self {
        Self::new()
            .with(Box::new(ParserSuite))
            .with(Box::new(ProfileSuite))
            .with(Box::new(ProtocolSuite))
            .with(Box::new(SmokeSuite))
    }

    /// Register a suite under its own name, replacing any previous one.
    pub fn with(mut self, suite: Box<dyn Suite>) -> Self {
        self.suites.insert(suite.name(), suite);
        self
    }

    pub fn resolve(&self, name: &str) -> Option<&dyn Suite> {
        self.suites.get(name).map(|s| s.as_ref())
    }

    /// Registered suite names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.suites.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = SuiteRegistry::builtin();
        assert_eq!(registry.names(), vec!["parser", "profile", "protocol", "smoke"]);
        assert!(registry.resolve("parser").is_some());
        assert!(registry.resolve("fuzz").is_none());
    }

    #[test]
    fn test_context_agent_root_is_parent() {
        let ctx = SuiteContext::new(PathBuf::from("/repo/implant/tests"));
        assert_eq!(ctx.agent_root, PathBuf::from("/repo/implant"));
        assert_eq!(
            ctx.agent_path("src/commands.c"),
            PathBuf::from("/repo/implant/src/commands.c")
        );
        assert_eq!(
            ctx.fixture_path(Path::new("cases/a.json")),
            PathBuf::from("/repo/implant/tests/cases/a.json")
        );
    }

    #[test]
    fn test_load_json_errors_become_fixture_load() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SuiteContext::new(dir.path().to_path_buf());
        std::fs::write(dir.path().join("bad.json"), "{").unwrap();

        let err = ctx
            .load_json::<serde_json::Value>(Path::new("bad.json"))
            .unwrap_err();
        assert!(matches!(err, RegressError::FixtureDecode { .. }));

        let err = ctx
            .load_json::<serde_json::Value>(Path::new("missing.json"))
            .unwrap_err();
        let result = SuiteResult::fixture_load_failure("f1", &err);
        assert_eq!(result.assertion, "fixture_load");
        assert!(!result.passed);
        assert!(result.detail.starts_with("cannot read fixture"));
    }

    #[test]
    fn test_anchor_result_details() {
        let dir = tempfile::tempdir().unwrap();
        let agent = dir.path().join("implant");
        std::fs::create_dir_all(agent.join("src")).unwrap();
        std::fs::write(agent.join("src/beacon.c"), "void beacon_generate_metadata(void) {}\n")
            .unwrap();
        let ctx = SuiteContext::new(agent.join("tests"));

        const ANCHORS: &[SourceAnchor] = &[SourceAnchor {
            file: "src/beacon.c",
            symbols: &["beacon_generate_metadata", "0x0000BEEF"],
        }];
        let result = ctx.anchor_result("a", "metadata_anchor", ANCHORS, "present", "missing");
        assert!(!result.passed);
        assert_eq!(result.detail, "missing (src/beacon.c: 0x0000BEEF)");
    }
}
