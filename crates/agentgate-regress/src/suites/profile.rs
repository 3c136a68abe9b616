//! Profile compatibility matrix: non-default profiles must keep the
//! runtime semantics the agent relies on.

use std::collections::BTreeSet;
use std::path::PathBuf;

use agentgate_core::anchors::SourceAnchor;
use agentgate_core::profile::{load_profile_value, validate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::RegressError;
use crate::fixture::{FixtureDescriptor, Mode};
use crate::suite::{Suite, SuiteContext, SuiteResult};

/// Invariants a profile fixture may declare; all of them are required.
pub const ALLOWED_INVARIANTS: &[&str] = &["metadata_magic_unchanged", "task_exchange_compatible"];

const ANCHORS: &[SourceAnchor] = &[
    SourceAnchor {
        file: "src/profile.c",
        symbols: &["profile_get_http_get_uri", "profile_get_header_count"],
    },
    SourceAnchor {
        file: "src/http.c",
        symbols: &["profile_get_server", "profile_get_user_agent"],
    },
];

/// Matrix entry pointing at a profile and describing what it must preserve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileMatrixFixture {
    #[serde(default)]
    pub fixture_id: Option<String>,
    /// Profile document, relative to the tests directory.
    pub profile_fixture: PathBuf,
    #[serde(default)]
    pub expected: Value,
    #[serde(default)]
    pub semantic_invariants: Vec<String>,
}

/// Runtime-relevant view of a profile document.
///
/// Built from the raw document so that a profile failing validation still
/// yields a comparable snapshot.
pub fn semantic_snapshot(profile: &Value) -> Value {
    let transport = if profile.get("use_https").and_then(Value::as_bool) == Some(true) {
        "https"
    } else {
        "http"
    };
    let required_headers: Vec<String> = profile
        .get("http_headers")
        .and_then(Value::as_object)
        .map(|headers| {
            // serde_json maps iterate in key order.
            headers
                .iter()
                .map(|(k, v)| match v.as_str() {
                    Some(text) => format!("{}: {}", k, text),
                    None => format!("{}: {}", k, v),
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "transport": transport,
        "server": profile.get("host").cloned().unwrap_or(Value::Null),
        "port": snapshot_port(profile.get("port")),
        "get_uri": profile.get("http_get_uri").cloned().unwrap_or(Value::Null),
        "post_uri": profile.get("http_post_uri").cloned().unwrap_or(Value::Null),
        "user_agent": profile.get("user_agent").cloned().unwrap_or(Value::Null),
        "required_headers": required_headers,
    })
}

/// Numeric port, accepting a decimal string as well as an integer.
///
/// A missing port reads as 0; a value that is not numeric is kept as-is so
/// the comparison against the expected snapshot fails visibly.
fn snapshot_port(port: Option<&Value>) -> Value {
    match port {
        None => Value::from(0),
        Some(Value::String(text)) => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(text.clone())),
        Some(value) => value.as_i64().map(Value::from).unwrap_or_else(|| value.clone()),
    }
}

/// Check declared invariants for `mode`; returns `(passed, detail)`.
pub fn check_invariants(invariants: &[String], mode: Mode) -> (bool, String) {
    let unique: BTreeSet<&str> = invariants.iter().map(String::as_str).collect();
    let only_allowed = unique.iter().all(|i| ALLOWED_INVARIANTS.contains(i));
    let has_required = ALLOWED_INVARIANTS.iter().all(|i| unique.contains(i));
    let no_duplicates = unique.len() == invariants.len();

    let passed = match mode {
        Mode::Quick => only_allowed && has_required,
        Mode::Full => only_allowed && has_required && no_duplicates && invariants.len() >= 2,
    };
    let detail = format!(
        "invariants={} allowed={} required={} unique={}",
        invariants.join(","),
        only_allowed,
        has_required,
        no_duplicates
    );
    (passed, detail)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileSuite;

impl ProfileSuite {
    fn check(
        fixture_id: &str,
        matrix: &ProfileMatrixFixture,
        profile: &Value,
        mode: Mode,
    ) -> Vec<SuiteResult> {
        let violations = validate(profile);
        let schema = if violations.is_empty() {
            SuiteResult::new(fixture_id, "profile_schema", true, "profile schema valid")
        } else {
            let messages: Vec<String> = violations.iter().map(ToString::to_string).collect();
            SuiteResult::new(fixture_id, "profile_schema", false, messages.join("; "))
        };

        let aligned = matrix.fixture_id.as_deref() == Some(fixture_id);
        let alignment = SuiteResult::new(
            fixture_id,
            "fixture_id_alignment",
            aligned,
            if aligned {
                "fixture IDs aligned".to_string()
            } else {
                format!(
                    "index fixture_id={} metadata fixture_id={}",
                    fixture_id,
                    matrix.fixture_id.as_deref().unwrap_or("missing")
                )
            },
        );

        let observed = semantic_snapshot(profile);
        let compatible = observed == matrix.expected;
        let semantic = SuiteResult::new(
            fixture_id,
            "profile_semantic_compatibility",
            compatible,
            if compatible {
                "semantic equivalence preserved".to_string()
            } else {
                format!("expected={} observed={}", matrix.expected, observed)
            },
        );

        let (invariants_ok, invariants_detail) =
            check_invariants(&matrix.semantic_invariants, mode);
        let invariants = SuiteResult::new(
            fixture_id,
            "semantic_invariants",
            invariants_ok,
            invariants_detail,
        );

        vec![schema, alignment, semantic, invariants]
    }

    fn load(
        ctx: &SuiteContext,
        fixture: &FixtureDescriptor,
    ) -> Result<(ProfileMatrixFixture, Value), RegressError> {
        let matrix: ProfileMatrixFixture = ctx.load_json(&fixture.path)?;
        let profile_path = ctx.fixture_path(&matrix.profile_fixture);
        let profile = load_profile_value(&profile_path).map_err(|e| RegressError::FixtureDecode {
            path: profile_path,
            message: e.to_string(),
        })?;
        Ok((matrix, profile))
    }
}

impl Suite for ProfileSuite {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn run(
        &self,
        mode: Mode,
        fixtures: &[FixtureDescriptor],
        ctx: &SuiteContext,
    ) -> Vec<SuiteResult> {
        let mut results = vec![ctx.anchor_result(
            "profile-source-anchor",
            "profile_runtime_anchor",
            ANCHORS,
            "profile/http anchors present",
            "missing profile/http integration anchors",
        )];

        for fixture in fixtures {
            match Self::load(ctx, fixture) {
                Ok((matrix, profile)) => {
                    results.extend(Self::check(&fixture.fixture_id, &matrix, &profile, mode))
                }
                Err(e) => results.push(SuiteResult::fixture_load_failure(&fixture.fixture_id, &e)),
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Value {
        json!({
            "profile_id": "cdn-https",
            "schema_version": "1.0",
            "host": "cdn.example.com",
            "port": 443,
            "use_https": true,
            "http_get_uri": "/assets/app.js",
            "http_post_uri": "/api/v2/upload",
            "user_agent": "Mozilla/5.0 (X11; Linux x86_64)",
            "http_headers": {"X-Requested-With": "XMLHttpRequest", "Accept": "*/*"}
        })
    }

    fn snapshot() -> Value {
        json!({
            "transport": "https",
            "server": "cdn.example.com",
            "port": 443,
            "get_uri": "/assets/app.js",
            "post_uri": "/api/v2/upload",
            "user_agent": "Mozilla/5.0 (X11; Linux x86_64)",
            "required_headers": ["Accept: */*", "X-Requested-With: XMLHttpRequest"]
        })
    }

    fn matrix(id: &str, invariants: &[&str]) -> ProfileMatrixFixture {
        ProfileMatrixFixture {
            fixture_id: Some(id.to_string()),
            profile_fixture: PathBuf::from("profiles/cdn.json"),
            expected: snapshot(),
            semantic_invariants: invariants.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_semantic_snapshot() {
        assert_eq!(semantic_snapshot(&profile()), snapshot());
    }

    #[test]
    fn test_semantic_snapshot_non_string_values() {
        let mut loose = profile();
        loose["port"] = json!("443");
        loose["http_headers"] = json!({"Accept": "*/*", "X-Retry": 3, "X-Debug": false});

        let observed = semantic_snapshot(&loose);
        assert_eq!(observed["port"], json!(443));
        assert_eq!(
            observed["required_headers"],
            json!(["Accept: */*", "X-Debug: false", "X-Retry: 3"])
        );

        loose.as_object_mut().unwrap().remove("port");
        assert_eq!(semantic_snapshot(&loose)["port"], json!(0));
    }

    #[test]
    fn test_all_checks_pass() {
        let results = ProfileSuite::check(
            "profile-cdn",
            &matrix("profile-cdn", ALLOWED_INVARIANTS),
            &profile(),
            Mode::Full,
        );
        let assertions: Vec<&str> = results.iter().map(|r| r.assertion.as_str()).collect();
        assert_eq!(
            assertions,
            vec![
                "profile_schema",
                "fixture_id_alignment",
                "profile_semantic_compatibility",
                "semantic_invariants"
            ]
        );
        assert!(results.iter().all(|r| r.passed), "{:?}", results);
    }

    #[test]
    fn test_misaligned_id_and_drift() {
        let mut drifted = profile();
        drifted["http_get_uri"] = json!("/other.js");
        let results = ProfileSuite::check(
            "profile-cdn",
            &matrix("profile-cdn-old", ALLOWED_INVARIANTS),
            &drifted,
            Mode::Quick,
        );
        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert_eq!(
            results[1].detail,
            "index fixture_id=profile-cdn metadata fixture_id=profile-cdn-old"
        );
        assert!(!results[2].passed);
        assert!(results[2].detail.starts_with("expected="));
    }

    #[test]
    fn test_invalid_profile_reports_violations() {
        let mut bad = profile();
        bad["port"] = json!(0);
        let results = ProfileSuite::check("p", &matrix("p", ALLOWED_INVARIANTS), &bad, Mode::Quick);
        assert!(!results[0].passed);
        assert_eq!(results[0].detail, "port must be between 1 and 65535");
    }

    #[test]
    fn test_invariants_quick_vs_full() {
        let duplicated: Vec<String> = vec![
            "metadata_magic_unchanged".into(),
            "task_exchange_compatible".into(),
            "task_exchange_compatible".into(),
        ];
        assert!(check_invariants(&duplicated, Mode::Quick).0);
        let (passed, detail) = check_invariants(&duplicated, Mode::Full);
        assert!(!passed);
        assert!(detail.ends_with("allowed=true required=true unique=false"));

        let unknown: Vec<String> = vec![
            "metadata_magic_unchanged".into(),
            "task_exchange_compatible".into(),
            "jitter_bounded".into(),
        ];
        assert!(!check_invariants(&unknown, Mode::Quick).0);

        let missing: Vec<String> = vec!["metadata_magic_unchanged".into()];
        assert!(!check_invariants(&missing, Mode::Quick).0);
    }
}
