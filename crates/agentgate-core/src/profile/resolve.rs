//! Listener resolution: template profile + listener overrides -> build artifact.
//!
//! The written artifact is canonical (recursively sorted keys, two-space
//! indentation, trailing newline) so identical inputs always produce
//! byte-identical files. The artifact is re-read and validated after it is
//! written; any violation fails the whole resolution.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::info;

use super::render::HeaderRenderer;
use super::{load_profile_value, validate_profile_file};
use crate::error::ResolveError;

/// Name of the resolved profile artifact inside the generated directory.
pub const SELECTED_PROFILE_FILE: &str = "selected_profile.json";

/// Name of the rendered configuration header inside the generated directory.
pub const GENERATED_HEADER_FILE: &str = "profile_config.h";

/// Template used when none is given, relative to the repository root.
pub const DEFAULT_TEMPLATE: &str = "profiles/http/default-profile.json";

/// Build platform; selects where generated artifacts land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Macos,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Macos => "macos",
        }
    }

    /// Generated-artifact directory relative to the repository root.
    pub fn generated_dir(&self) -> &'static str {
        match self {
            Platform::Linux => "implant/generated",
            Platform::Macos => "implant-macos/generated",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux" => Ok(Platform::Linux),
            "macos" => Ok(Platform::Macos),
            other => Err(format!("unknown platform '{}' (expected linux or macos)", other)),
        }
    }
}

/// Listener transport requested for the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Http,
    Tcp,
}

impl Transport {
    pub fn name(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Transport::Http),
            "tcp" => Ok(Transport::Tcp),
            other => Err(format!("unknown transport '{}' (expected http or tcp)", other)),
        }
    }
}

/// The four listener fields a resolution overwrites.
///
/// `port` is kept wide so out-of-range requests reach the validator and are
/// reported as violations instead of being truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerOverrides {
    pub host: String,
    pub port: i64,
    pub use_https: bool,
    pub ssl_ignore_verify: bool,
}

impl ListenerOverrides {
    fn apply(&self, profile: &mut Map<String, Value>) {
        profile.insert("host".to_string(), Value::from(self.host.clone()));
        profile.insert("port".to_string(), Value::from(self.port));
        profile.insert("use_https".to_string(), Value::from(self.use_https));
        profile.insert(
            "ssl_ignore_verify".to_string(),
            Value::from(self.ssl_ignore_verify),
        );
    }
}

/// Inputs to a single resolution.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    /// Repository root; generated directories are placed beneath it.
    pub root: PathBuf,
    /// Template profile. Relative paths are taken from `root`.
    pub template: PathBuf,
    pub overrides: ListenerOverrides,
    pub platform: Platform,
    pub transport: Transport,
}

impl ResolveRequest {
    pub fn template_path(&self) -> PathBuf {
        if self.template.is_absolute() {
            self.template.clone()
        } else {
            self.root.join(&self.template)
        }
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.root.join(self.platform.generated_dir())
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    pub source_path: PathBuf,
    pub profile_path: PathBuf,
    pub header_path: PathBuf,
    pub platform: Platform,
    pub transport: Transport,
    /// SHA-256 hex digest of the written profile artifact.
    pub artifact_digest: String,
}

/// Serialize a JSON document canonically: sorted keys at every level,
/// two-space indentation, trailing newline.
pub fn canonical_json(value: &Value) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(&sort_keys(value))?;
    out.push('\n');
    Ok(out)
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Resolve a template profile for a listener and hand it to the renderer.
///
/// Writes `<root>/<platform dir>/selected_profile.json`, validates the
/// written file, then renders `profile_config.h` next to it. On violations
/// the error carries every violation found.
pub fn resolve(
    request: &ResolveRequest,
    renderer: &dyn HeaderRenderer,
) -> Result<ResolveReport, ResolveError> {
    let source_path = request.template_path();
    let template = load_profile_value(&source_path)?;
    let Value::Object(mut profile) = template else {
        return Err(ResolveError::TemplateNotObject(source_path));
    };

    request.overrides.apply(&mut profile);

    let generated_dir = request.generated_dir();
    let profile_path = generated_dir.join(SELECTED_PROFILE_FILE);
    let header_path = generated_dir.join(GENERATED_HEADER_FILE);

    let content = canonical_json(&Value::Object(profile))?;
    std::fs::create_dir_all(&generated_dir).map_err(|source| ResolveError::Write {
        path: generated_dir.clone(),
        source,
    })?;
    std::fs::write(&profile_path, content.as_bytes()).map_err(|source| ResolveError::Write {
        path: profile_path.clone(),
        source,
    })?;

    let (_, violations) = validate_profile_file(&profile_path)?;
    if !violations.is_empty() {
        return Err(ResolveError::InvalidProfile {
            path: profile_path,
            violations,
        });
    }

    renderer.render(&profile_path, &header_path)?;

    let artifact_digest = hex::encode(Sha256::digest(content.as_bytes()));

    info!(
        source = ?source_path,
        platform = %request.platform,
        transport = %request.transport,
        digest = %artifact_digest,
        "Profile selection resolved"
    );

    Ok(ResolveReport {
        source_path,
        profile_path,
        header_path,
        platform: request.platform,
        transport: request.transport,
        artifact_digest,
    })
}
