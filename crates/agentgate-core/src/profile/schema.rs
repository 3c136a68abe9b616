//! Schema and semantic validation for HTTP/S profile documents.
//!
//! [`validate`] is a pure function over a decoded JSON document. It never
//! stops at the first problem: every missing field, type mismatch and
//! semantic defect is reported so a single run surfaces all of them.
//!
//! Semantic checks only run on fields that are already well-typed, so a
//! mistyped field produces exactly one violation.

use std::fmt;

use serde_json::{Map, Value};

/// JSON type expected for a profile field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    Object,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            // Booleans are a distinct JSON type, so `true` never passes as an integer.
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every field a profile may carry, with its expected type, in report order.
pub const PROFILE_FIELDS: &[(&str, FieldType)] = &[
    ("profile_id", FieldType::String),
    ("schema_version", FieldType::String),
    ("host", FieldType::String),
    ("port", FieldType::Integer),
    ("use_https", FieldType::Boolean),
    ("http_get_uri", FieldType::String),
    ("http_post_uri", FieldType::String),
    ("user_agent", FieldType::String),
    ("http_headers", FieldType::Object),
    ("ssl_ignore_verify", FieldType::Boolean),
];

/// Fields whose absence is not a violation.
pub const OPTIONAL_FIELDS: &[&str] = &["ssl_ignore_verify"];

/// Fields that hold request URIs.
pub const URI_FIELDS: &[&str] = &["http_get_uri", "http_post_uri"];

pub const MIN_PORT: i64 = 1;
pub const MAX_PORT: i64 = 65535;
pub const MIN_USER_AGENT_LEN: usize = 10;

/// A single schema or semantic defect in a profile document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    NotAnObject,
    MissingField {
        field: &'static str,
    },
    WrongType {
        field: &'static str,
        expected: FieldType,
        actual: &'static str,
    },
    EmptyField {
        field: &'static str,
    },
    PortOutOfRange,
    UriMissingSlash {
        field: &'static str,
    },
    UriContainsSpace {
        field: &'static str,
    },
    UserAgentTooShort,
    NoHeaders,
    EmptyHeaderKey,
    EmptyHeaderValue {
        key: String,
    },
    Undecodable {
        message: String,
    },
}

impl Violation {
    /// Name of the field this violation concerns, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Violation::MissingField { field }
            | Violation::WrongType { field, .. }
            | Violation::EmptyField { field }
            | Violation::UriMissingSlash { field }
            | Violation::UriContainsSpace { field } => Some(*field),
            Violation::PortOutOfRange => Some("port"),
            Violation::UserAgentTooShort => Some("user_agent"),
            Violation::NoHeaders | Violation::EmptyHeaderKey | Violation::EmptyHeaderValue { .. } => {
                Some("http_headers")
            }
            Violation::NotAnObject | Violation::Undecodable { .. } => None,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NotAnObject => write!(f, "profile must be a JSON object"),
            Violation::MissingField { field } => write!(f, "missing required field '{}'", field),
            Violation::WrongType {
                field,
                expected,
                actual,
            } => write!(f, "field '{}' must be {}, got {}", field, expected, actual),
            Violation::EmptyField { field } => write!(f, "{} cannot be empty", field),
            Violation::PortOutOfRange => {
                write!(f, "port must be between {} and {}", MIN_PORT, MAX_PORT)
            }
            Violation::UriMissingSlash { field } => write!(f, "{} must start with '/'", field),
            Violation::UriContainsSpace { field } => write!(f, "{} must not contain spaces", field),
            Violation::UserAgentTooShort => write!(f, "user_agent appears too short"),
            Violation::NoHeaders => write!(f, "http_headers must include at least one header"),
            Violation::EmptyHeaderKey => write!(f, "http_headers keys must be non-empty strings"),
            Violation::EmptyHeaderValue { key } => {
                write!(f, "http_headers['{}'] must be non-empty string", key)
            }
            Violation::Undecodable { message } => {
                write!(f, "profile could not be decoded: {}", message)
            }
        }
    }
}

/// JSON type name used in type-mismatch messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a decoded profile document.
///
/// Returns an empty list for a valid profile. Identical input always yields
/// an identical list in an identical order.
pub fn validate(profile: &Value) -> Vec<Violation> {
    let Some(fields) = profile.as_object() else {
        return vec![Violation::NotAnObject];
    };

    let mut violations = check_required_fields(fields);
    violations.extend(check_semantics(fields));
    violations
}

fn check_required_fields(fields: &Map<String, Value>) -> Vec<Violation> {
    let mut violations = Vec::new();

    for &(field, expected) in PROFILE_FIELDS {
        match fields.get(field) {
            None if OPTIONAL_FIELDS.contains(&field) => {}
            None => violations.push(Violation::MissingField { field }),
            Some(value) if !expected.matches(value) => violations.push(Violation::WrongType {
                field,
                expected,
                actual: json_type_name(value),
            }),
            Some(_) => {}
        }
    }

    violations
}

fn check_semantics(fields: &Map<String, Value>) -> Vec<Violation> {
    let mut violations = Vec::new();

    for field in ["profile_id", "host"] {
        if let Some(Value::String(s)) = fields.get(field) {
            if s.trim().is_empty() {
                violations.push(Violation::EmptyField { field });
            }
        }
    }

    if let Some(port) = fields.get("port") {
        if FieldType::Integer.matches(port) {
            let in_range = port
                .as_i64()
                .map(|p| (MIN_PORT..=MAX_PORT).contains(&p))
                .unwrap_or(false);
            if !in_range {
                violations.push(Violation::PortOutOfRange);
            }
        }
    }

    for &field in URI_FIELDS {
        if let Some(Value::String(uri)) = fields.get(field) {
            if !uri.starts_with('/') {
                violations.push(Violation::UriMissingSlash { field });
            }
            if uri.contains(' ') {
                violations.push(Violation::UriContainsSpace { field });
            }
        }
    }

    if let Some(Value::String(agent)) = fields.get("user_agent") {
        if agent.trim().chars().count() < MIN_USER_AGENT_LEN {
            violations.push(Violation::UserAgentTooShort);
        }
    }

    if let Some(Value::Object(headers)) = fields.get("http_headers") {
        if headers.is_empty() {
            violations.push(Violation::NoHeaders);
        }
        for (key, value) in headers {
            if key.trim().is_empty() {
                violations.push(Violation::EmptyHeaderKey);
            }
            let value_ok = value.as_str().map(|v| !v.trim().is_empty()).unwrap_or(false);
            if !value_ok {
                violations.push(Violation::EmptyHeaderValue { key: key.clone() });
            }
        }
    }

    violations
}
