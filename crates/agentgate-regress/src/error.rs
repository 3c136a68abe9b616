//! Error taxonomy for regression runs.
//!
//! Only index problems abort a run. A fixture that cannot be loaded becomes a
//! failing `fixture_load` result and the run continues.

use std::path::PathBuf;

/// Regression orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum RegressError {
    #[error("fixture index not found: {}", .0.display())]
    IndexNotFound(PathBuf),

    #[error("invalid fixture index {}: {source}", .path.display())]
    InvalidIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate fixture_id '{fixture_id}' in suite '{suite}'")]
    DuplicateFixtureId { suite: String, fixture_id: String },

    #[error("cannot read fixture {}: {source}", .path.display())]
    FixtureRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode fixture {}: {message}", .path.display())]
    FixtureDecode { path: PathBuf, message: String },

    #[error("unknown mode '{0}' (expected quick or full)")]
    UnknownMode(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for regression operations.
pub type Result<T> = std::result::Result<T, RegressError>;
