//! Protocol metadata model.
//!
//! Fixtures declare the metadata an agent build is expected to announce.
//! [`MetadataRecord`] turns those expectations into a canonical binary record
//! and decodes it back; a fixture passes only when the decoded record equals
//! the declared one and the generated configuration header agrees with the
//! fixture's profile values.
//!
//! Wire layout (all integers big-endian, strings as `u16` length + UTF-8):
//!
//! ```text
//! [magic:4][body_len:4]
//! [session_key_length:2][port:2][transport][server][get_uri][post_uri]
//! [flag_count:2][flag]...
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::defines::parse_number;
use crate::error::MetadataError;

/// Magic number the agent places at the start of its metadata blob.
pub const METADATA_MAGIC: u32 = 0x0000_BEEF;

const HEADER_LEN: usize = 8;

/// Configuration header keys compared against a fixture's profile.
pub const CONFIG_KEYS: &[(&str, &str)] = &[
    ("server", "C2_SERVER"),
    ("port", "C2_PORT"),
    ("get_uri", "HTTP_GET_URI"),
    ("post_uri", "HTTP_POST_URI"),
    ("user_agent", "USER_AGENT"),
];

/// A number that fixtures may write as a JSON integer or as a
/// decimal / `0x` hex string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixtureNumber {
    Int(u64),
    Text(String),
}

impl FixtureNumber {
    pub fn to_u64(&self) -> Option<u64> {
        match self {
            FixtureNumber::Int(n) => Some(*n),
            FixtureNumber::Text(s) => parse_number(s).map(u64::from),
        }
    }

    fn to_u32(&self, field: &'static str) -> Result<u32, MetadataError> {
        self.to_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| self.invalid(field))
    }

    fn to_u16(&self, field: &'static str) -> Result<u16, MetadataError> {
        self.to_u64()
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| self.invalid(field))
    }

    fn invalid(&self, field: &'static str) -> MetadataError {
        let value = match self {
            FixtureNumber::Int(n) => n.to_string(),
            FixtureNumber::Text(s) => s.clone(),
        };
        MetadataError::InvalidNumber { field, value }
    }
}

/// Listener profile values declared by a metadata fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureProfile {
    pub transport: String,
    pub server: String,
    pub port: FixtureNumber,
    pub get_uri: String,
    pub post_uri: String,
    pub user_agent: String,
}

/// Protocol-level expectations declared by a metadata fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticExpectations {
    pub magic: FixtureNumber,
    pub session_key_length: FixtureNumber,
    #[serde(default)]
    pub metadata_flags: Vec<String>,
}

/// A protocol metadata fixture file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFixture {
    pub profile: FixtureProfile,
    pub semantic_expectations: SemanticExpectations,
}

/// Canonical metadata record. Flags are a set: order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub magic: u32,
    pub session_key_length: u16,
    pub transport: String,
    pub server: String,
    pub port: u16,
    /// `(GET uri, POST uri)`; order is meaningful.
    pub endpoints: (String, String),
    pub flags: BTreeSet<String>,
}

impl MetadataRecord {
    /// Build the record a fixture declares.
    pub fn from_fixture(fixture: &MetadataFixture) -> Result<Self, MetadataError> {
        let expectations = &fixture.semantic_expectations;
        let profile = &fixture.profile;
        Ok(Self {
            magic: expectations.magic.to_u32("magic")?,
            session_key_length: expectations.session_key_length.to_u16("session_key_length")?,
            transport: profile.transport.clone(),
            server: profile.server.clone(),
            port: profile.port.to_u16("port")?,
            endpoints: (profile.get_uri.clone(), profile.post_uri.clone()),
            flags: expectations.metadata_flags.iter().cloned().collect(),
        })
    }

    /// Encode to the canonical wire form.
    pub fn encode(&self) -> Result<Vec<u8>, MetadataError> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.session_key_length.to_be_bytes());
        body.extend_from_slice(&self.port.to_be_bytes());
        put_str(&mut body, "transport", &self.transport)?;
        put_str(&mut body, "server", &self.server)?;
        put_str(&mut body, "get_uri", &self.endpoints.0)?;
        put_str(&mut body, "post_uri", &self.endpoints.1)?;

        let flag_count = u16::try_from(self.flags.len()).map_err(|_| MetadataError::FieldTooLong {
            field: "flags",
            len: self.flags.len(),
        })?;
        body.extend_from_slice(&flag_count.to_be_bytes());
        // BTreeSet iteration is sorted, so the encoding is canonical.
        for flag in &self.flags {
            put_str(&mut body, "flag", flag)?;
        }

        let body_len = u32::try_from(body.len()).map_err(|_| MetadataError::FieldTooLong {
            field: "body",
            len: body.len(),
        })?;

        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(&self.magic.to_be_bytes());
        out.extend_from_slice(&body_len.to_be_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode a record. Total over arbitrary input.
    pub fn decode(bytes: &[u8]) -> Result<Self, MetadataError> {
        let mut reader = Reader::new(bytes);
        let magic = reader.u32()?;
        let declared = reader.u32()? as usize;
        let actual = bytes.len() - HEADER_LEN;
        if declared != actual {
            return Err(MetadataError::LengthMismatch { declared, actual });
        }

        let session_key_length = reader.u16()?;
        let port = reader.u16()?;
        let transport = reader.string("transport")?;
        let server = reader.string("server")?;
        let get_uri = reader.string("get_uri")?;
        let post_uri = reader.string("post_uri")?;

        let flag_count = reader.u16()?;
        let mut flags = BTreeSet::new();
        for _ in 0..flag_count {
            flags.insert(reader.string("flag")?);
        }

        let trailing = reader.remaining();
        if trailing != 0 {
            return Err(MetadataError::TrailingBytes(trailing));
        }

        Ok(Self {
            magic,
            session_key_length,
            transport,
            server,
            port,
            endpoints: (get_uri, post_uri),
            flags,
        })
    }
}

fn put_str(out: &mut Vec<u8>, field: &'static str, value: &str) -> Result<(), MetadataError> {
    let len = u16::try_from(value.len()).map_err(|_| MetadataError::FieldTooLong {
        field,
        len: value.len(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], MetadataError> {
        if needed > self.remaining() {
            return Err(MetadataError::Truncated {
                offset: self.offset,
                needed,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, MetadataError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, MetadataError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self, field: &'static str) -> Result<String, MetadataError> {
        let len = self.u16()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| MetadataError::InvalidUtf8 { field })
    }
}

/// Encode the declared record, decode it, and compare.
///
/// Returns the decoded record on structural equality.
pub fn roundtrip_record(fixture: &MetadataFixture) -> Result<MetadataRecord, String> {
    let expected = MetadataRecord::from_fixture(fixture).map_err(|e| e.to_string())?;
    let encoded = expected.encode().map_err(|e| e.to_string())?;
    let decoded = MetadataRecord::decode(&encoded).map_err(|e| e.to_string())?;
    if decoded != expected {
        return Err(format!(
            "decoded record differs: expected={:?} decoded={:?}",
            expected, decoded
        ));
    }
    Ok(decoded)
}

/// True when the fixture's record survives an encode/decode cycle unchanged.
pub fn roundtrip(fixture: &MetadataFixture) -> bool {
    roundtrip_record(fixture).is_ok()
}

/// Compare the fixture profile against `#define` values from the generated
/// configuration header. Returns one entry per mismatched key.
pub fn config_mismatches(
    profile: &FixtureProfile,
    defines: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut mismatches = Vec::new();

    for &(field, key) in CONFIG_KEYS {
        let actual = defines.get(key);
        let matches = match field {
            "port" => {
                let header_port = actual.and_then(|v| parse_number(v)).map(u64::from);
                header_port.is_some() && header_port == profile.port.to_u64()
            }
            _ => actual.map(String::as_str) == Some(fixture_field(profile, field)),
        };
        if !matches {
            mismatches.push(format!(
                "{}: fixture={} config={}",
                key,
                fixture_value(profile, field),
                actual.map(String::as_str).unwrap_or("<missing>")
            ));
        }
    }

    mismatches
}

fn fixture_field<'p>(profile: &'p FixtureProfile, field: &str) -> &'p str {
    match field {
        "server" => &profile.server,
        "get_uri" => &profile.get_uri,
        "post_uri" => &profile.post_uri,
        "user_agent" => &profile.user_agent,
        _ => "",
    }
}

fn fixture_value(profile: &FixtureProfile, field: &str) -> String {
    match field {
        "port" => match &profile.port {
            FixtureNumber::Int(n) => n.to_string(),
            FixtureNumber::Text(s) => s.clone(),
        },
        other => fixture_field(profile, other).to_string(),
    }
}

/// Both halves of a protocol fixture check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataCheck {
    pub roundtrip: Result<(), String>,
    pub config_mismatches: Vec<String>,
}

impl MetadataCheck {
    pub fn run(fixture: &MetadataFixture, config_defines: &BTreeMap<String, String>) -> Self {
        Self {
            roundtrip: roundtrip_record(fixture).map(|_| ()),
            config_mismatches: config_mismatches(&fixture.profile, config_defines),
        }
    }

    pub fn passed(&self) -> bool {
        self.roundtrip.is_ok() && self.config_mismatches.is_empty()
    }

    pub fn detail(&self) -> String {
        if self.passed() {
            return "semantic equivalence preserved".to_string();
        }
        let mut parts = Vec::new();
        if let Err(e) = &self.roundtrip {
            parts.push(format!("roundtrip: {}", e));
        }
        if !self.config_mismatches.is_empty() {
            parts.push(format!("config: {}", self.config_mismatches.join("; ")));
        }
        format!("metadata semantic mismatch ({})", parts.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> MetadataFixture {
        serde_json::from_value(json!({
            "profile": {
                "transport": "http",
                "server": "192.168.108.130",
                "port": 80,
                "get_uri": "/en_US/all.js",
                "post_uri": "/submit.php",
                "user_agent": "Mozilla/5.0 (compatible; MSIE 9.0)"
            },
            "semantic_expectations": {
                "magic": "0x0000BEEF",
                "session_key_length": 16,
                "metadata_flags": ["x64_agent", "admin", "x64_system"]
            }
        }))
        .unwrap()
    }

    fn config() -> BTreeMap<String, String> {
        crate::defines::extract_defines(
            "#define C2_SERVER \"192.168.108.130\"\n\
             #define C2_PORT 80\n\
             #define HTTP_GET_URI \"/en_US/all.js\"\n\
             #define HTTP_POST_URI \"/submit.php\"\n\
             #define USER_AGENT \"Mozilla/5.0 (compatible; MSIE 9.0)\"\n",
        )
    }

    #[test]
    fn test_from_fixture_normalizes() {
        let record = MetadataRecord::from_fixture(&fixture()).unwrap();
        assert_eq!(record.magic, METADATA_MAGIC);
        assert_eq!(record.session_key_length, 16);
        assert_eq!(
            record.flags.iter().cloned().collect::<Vec<_>>(),
            vec!["admin", "x64_agent", "x64_system"]
        );
    }

    #[test]
    fn test_roundtrip_fixture() {
        assert!(roundtrip(&fixture()));
    }

    #[test]
    fn test_flag_order_does_not_matter() {
        let mut reordered = fixture();
        reordered.semantic_expectations.metadata_flags.reverse();
        let a = MetadataRecord::from_fixture(&fixture()).unwrap();
        let b = MetadataRecord::from_fixture(&reordered).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn test_endpoint_order_matters() {
        let mut swapped = fixture();
        std::mem::swap(&mut swapped.profile.get_uri, &mut swapped.profile.post_uri);
        let a = MetadataRecord::from_fixture(&fixture()).unwrap();
        let b = MetadataRecord::from_fixture(&swapped).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_truncated_never_panics() {
        let encoded = MetadataRecord::from_fixture(&fixture())
            .unwrap()
            .encode()
            .unwrap();
        for len in 0..encoded.len() {
            assert!(MetadataRecord::decode(&encoded[..len]).is_err(), "len {}", len);
        }
    }

    #[test]
    fn test_decode_rejects_trailing_bytes_inside_body() {
        let mut encoded = MetadataRecord::from_fixture(&fixture())
            .unwrap()
            .encode()
            .unwrap();
        encoded.push(0xAA);
        let body_len = (encoded.len() - 8) as u32;
        encoded[4..8].copy_from_slice(&body_len.to_be_bytes());
        assert_eq!(
            MetadataRecord::decode(&encoded),
            Err(MetadataError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_decode_length_mismatch() {
        let mut encoded = MetadataRecord::from_fixture(&fixture())
            .unwrap()
            .encode()
            .unwrap();
        encoded[4..8].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            MetadataRecord::decode(&encoded),
            Err(MetadataError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_port_reported() {
        let mut bad = fixture();
        bad.profile.port = FixtureNumber::Int(70000);
        assert_eq!(
            MetadataRecord::from_fixture(&bad),
            Err(MetadataError::InvalidNumber {
                field: "port",
                value: "70000".to_string()
            })
        );
        assert!(!roundtrip(&bad));
    }

    #[test]
    fn test_config_cross_check_passes() {
        let check = MetadataCheck::run(&fixture(), &config());
        assert!(check.passed(), "{}", check.detail());
        assert_eq!(check.detail(), "semantic equivalence preserved");
    }

    #[test]
    fn test_config_cross_check_reports_mismatch() {
        let mut defines = config();
        defines.insert("C2_PORT".to_string(), "443".to_string());
        defines.remove("USER_AGENT");
        let check = MetadataCheck::run(&fixture(), &defines);
        assert!(!check.passed());
        assert_eq!(
            check.config_mismatches,
            vec![
                "C2_PORT: fixture=80 config=443",
                "USER_AGENT: fixture=Mozilla/5.0 (compatible; MSIE 9.0) config=<missing>"
            ]
        );
        assert!(check.detail().starts_with("metadata semantic mismatch"));
    }
}
