//! Error taxonomy for AgentGate core operations.
//!
//! Schema and semantic problems in a profile are not errors: they are
//! [`Violation`](crate::profile::Violation) values collected exhaustively.
//! The types here cover the boundary failures (I/O, decode, external
//! processes) that stop an operation outright.

use std::path::PathBuf;

use crate::profile::Violation;

/// Failures loading a profile document from disk.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid JSON: {message} (line {line})")]
    InvalidJson { message: String, line: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProfileError {
    pub(crate) fn from_json(err: &serde_json::Error) -> Self {
        // serde_json appends " at line L column C" to its Display output.
        let full = err.to_string();
        let message = match full.rfind(" at line ") {
            Some(idx) => full[..idx].to_string(),
            None => full,
        };
        ProfileError::InvalidJson {
            message,
            line: err.line(),
        }
    }
}

/// Failures from the external header renderer.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("header renderer command is empty")]
    EmptyCommand,

    #[error("failed to spawn header renderer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("header renderer exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },
}

/// Failures resolving a listener-specific profile artifact.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("template profile {} is not a JSON object", .0.display())]
    TemplateNotObject(PathBuf),

    #[error("resolved profile {} has {} violation(s)", .path.display(), .violations.len())]
    InvalidProfile {
        path: PathBuf,
        violations: Vec<Violation>,
    },

    #[error("header rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error writing {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures decoding an encoded protocol metadata record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("record truncated: needed {needed} byte(s) at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("body length mismatch: header declares {declared}, body has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("field '{field}' is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("{0} trailing byte(s) after record")]
    TrailingBytes(usize),

    #[error("field '{field}' is {len} bytes, exceeds the u16 length prefix")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("field '{field}' has invalid value '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_json_strips_position_suffix() {
        let err = serde_json::from_str::<serde_json::Value>("{\n  \"a\": }").unwrap_err();
        let profile_err = ProfileError::from_json(&err);
        let msg = profile_err.to_string();
        assert!(msg.starts_with("invalid JSON: "));
        assert!(msg.ends_with("(line 2)"));
        assert!(!msg.contains("column"));
    }

    #[test]
    fn test_not_found_display() {
        let err = ProfileError::NotFound(PathBuf::from("/tmp/missing.json"));
        assert_eq!(err.to_string(), "profile file not found: /tmp/missing.json");
    }

    #[test]
    fn test_invalid_profile_counts_violations() {
        let err = ResolveError::InvalidProfile {
            path: PathBuf::from("selected_profile.json"),
            violations: vec![Violation::PortOutOfRange, Violation::NoHeaders],
        };
        assert!(err.to_string().contains("2 violation(s)"));
    }
}
