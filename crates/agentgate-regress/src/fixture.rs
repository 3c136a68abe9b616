//! Fixture index and selection.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{RegressError, Result};

/// Regression depth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Quick,
    Full,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Quick, Mode::Full];

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Quick => "quick",
            Mode::Full => "full",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = RegressError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "quick" => Ok(Mode::Quick),
            "full" => Ok(Mode::Full),
            other => Err(RegressError::UnknownMode(other.to_string())),
        }
    }
}

fn default_modes() -> Vec<Mode> {
    Mode::ALL.to_vec()
}

/// One entry of the fixture index.
///
/// `suite` stays a free string so that an index naming a suite with no
/// registered runner is reported at run time instead of failing to load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixtureDescriptor {
    pub fixture_id: String,

    pub suite: String,

    /// Modes this fixture runs in (both when absent).
    #[serde(default = "default_modes")]
    pub modes: Vec<Mode>,

    /// Fixture file, relative to the regression tests directory.
    pub path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl FixtureDescriptor {
    pub fn runs_in(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }
}

/// The fixture index file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixtureIndex {
    #[serde(default)]
    pub fixtures: Vec<FixtureDescriptor>,
}

impl FixtureIndex {
    /// Load and check an index file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RegressError::IndexNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(RegressError::Io(e)),
        };
        let index: FixtureIndex =
            serde_json::from_str(&content).map_err(|source| RegressError::InvalidIndex {
                path: path.to_path_buf(),
                source,
            })?;
        index.check_unique()?;
        Ok(index)
    }

    /// Reject a `fixture_id` used twice within one suite.
    pub fn check_unique(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for fixture in &self.fixtures {
            if !seen.insert((fixture.suite.as_str(), fixture.fixture_id.as_str())) {
                return Err(RegressError::DuplicateFixtureId {
                    suite: fixture.suite.clone(),
                    fixture_id: fixture.fixture_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Fixtures that run in `mode` and, when given, belong to `suite`,
    /// sorted by fixture id.
    pub fn select(&self, mode: Mode, suite: Option<&str>) -> Selection {
        let mut fixtures: Vec<FixtureDescriptor> = self
            .fixtures
            .iter()
            .filter(|f| f.runs_in(mode))
            .filter(|f| suite.map_or(true, |s| f.suite == s))
            .cloned()
            .collect();
        fixtures.sort_by(|a, b| {
            a.fixture_id
                .cmp(&b.fixture_id)
                .then_with(|| a.suite.cmp(&b.suite))
        });

        Selection {
            mode,
            suite: suite.map(str::to_string),
            fixtures,
        }
    }
}

/// Fixtures chosen for one run, in deterministic order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub mode: Mode,
    pub suite: Option<String>,
    pub fixtures: Vec<FixtureDescriptor>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    /// Distinct suite names present in the selection, sorted.
    pub fn suite_names(&self) -> Vec<String> {
        self.fixtures
            .iter()
            .map(|f| f.suite.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Fixtures belonging to `suite`, still in fixture-id order.
    pub fn for_suite(&self, suite: &str) -> Vec<FixtureDescriptor> {
        self.fixtures
            .iter()
            .filter(|f| f.suite == suite)
            .cloned()
            .collect()
    }

    /// SHA-256 over the ordered `(suite, fixture_id)` pairs.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.mode.name().as_bytes());
        hasher.update(b"\0");
        for fixture in &self.fixtures {
            hasher.update(fixture.suite.as_bytes());
            hasher.update(b"\0");
            hasher.update(fixture.fixture_id.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}
