//! Extraction of `#define NAME VALUE` lines from generated headers.
//!
//! This is a fixed-pattern text scan, not a preprocessor: no includes,
//! conditionals, macro expansion or multi-line definitions.

use std::collections::BTreeMap;

use regex::Regex;

const DEFINE_PATTERN: &str = r"^#define\s+(\w+)\s+(.+)$";

/// Collect every `#define NAME VALUE` line into `NAME -> VALUE`.
///
/// A quoted value is returned without its quotes and ends at the closing
/// quote. An unquoted value keeps its internal spaces; only a trailing
/// `//` or `/*` comment is dropped. Later definitions overwrite earlier ones.
pub fn extract_defines(text: &str) -> BTreeMap<String, String> {
    let mut defines = BTreeMap::new();
    let Ok(pattern) = Regex::new(DEFINE_PATTERN) else {
        return defines;
    };
    for line in text.lines() {
        let Some(caps) = pattern.captures(line.trim()) else {
            continue;
        };
        defines.insert(caps[1].to_string(), define_value(caps[2].trim()));
    }
    defines
}

fn define_value(raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix('"') {
        match rest.find('"') {
            Some(end) => rest[..end].to_string(),
            None => rest.to_string(),
        }
    } else {
        let end = [raw.find("//"), raw.find("/*")]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(raw.len());
        raw[..end].trim_end().to_string()
    }
}

/// Collect numeric defines whose name starts with `prefix`.
///
/// Values may be decimal or `0x` hex; anything else is skipped.
pub fn numeric_defines(text: &str, prefix: &str) -> BTreeMap<String, u32> {
    extract_defines(text)
        .into_iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .filter_map(|(name, value)| parse_number(&value).map(|n| (name, n)))
        .collect()
}

/// Parse a decimal or `0x`-prefixed hex literal.
pub fn parse_number(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}
