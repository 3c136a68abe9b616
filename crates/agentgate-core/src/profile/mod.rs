//! HTTP/S communication profiles: validation, resolution and rendering.

pub mod render;
pub mod resolve;
pub mod schema;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProfileError;

pub use render::{CommandRenderer, HeaderRenderer, NoopRenderer};
pub use resolve::{
    canonical_json, resolve, ListenerOverrides, Platform, ResolveReport, ResolveRequest,
    Transport, DEFAULT_TEMPLATE, GENERATED_HEADER_FILE, SELECTED_PROFILE_FILE,
};
pub use schema::{validate, FieldType, Violation, OPTIONAL_FIELDS, PROFILE_FIELDS};

/// A profile document that passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub profile_id: String,
    pub schema_version: String,
    pub host: String,
    pub port: u16,
    pub use_https: bool,
    pub http_get_uri: String,
    pub http_post_uri: String,
    pub user_agent: String,
    pub http_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub ssl_ignore_verify: bool,
}

impl Profile {
    /// Validate a decoded document and convert it into a typed profile.
    pub fn from_value(value: &Value) -> std::result::Result<Self, Vec<Violation>> {
        let violations = validate(value);
        if !violations.is_empty() {
            return Err(violations);
        }
        serde_json::from_value(value.clone()).map_err(|e| {
            vec![Violation::Undecodable {
                message: e.to_string(),
            }]
        })
    }

    /// Transport scheme implied by `use_https`.
    pub fn scheme(&self) -> &'static str {
        if self.use_https {
            "https"
        } else {
            "http"
        }
    }

    /// Headers rendered as `Name: value`, sorted by name.
    pub fn rendered_headers(&self) -> Vec<String> {
        self.http_headers
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect()
    }
}

/// Read and decode a JSON document from disk.
pub fn load_profile_value(path: &Path) -> Result<Value, ProfileError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProfileError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(ProfileError::Io(e)),
    };
    serde_json::from_str(&content).map_err(|e| ProfileError::from_json(&e))
}

/// Load a profile file and validate it.
///
/// Decode and I/O failures are returned as a single [`ProfileError`]; schema
/// problems come back as the violation list alongside the decoded document.
pub fn validate_profile_file(path: &Path) -> Result<(Value, Vec<Violation>), ProfileError> {
    let value = load_profile_value(path)?;
    let violations = validate(&value);
    Ok((value, violations))
}
