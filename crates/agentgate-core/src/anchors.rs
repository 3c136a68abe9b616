//! Source anchor checks.
//!
//! A coarse substring test that flags when a function or constant the
//! validators model has disappeared from the agent source. Renaming a symbol
//! without changing behaviour produces a false negative; that is accepted.

use std::path::{Path, PathBuf};

/// Symbols that must appear in one source file, relative to the agent root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceAnchor {
    pub file: &'static str,
    pub symbols: &'static [&'static str],
}

/// True when every symbol occurs somewhere in `source_text`.
pub fn anchors_present(source_text: &str, required_symbols: &[&str]) -> bool {
    required_symbols.iter().all(|s| source_text.contains(s))
}

/// Symbols from `required_symbols` that do not occur in `source_text`, in input order.
pub fn missing_anchors<'a>(source_text: &str, required_symbols: &[&'a str]) -> Vec<&'a str> {
    required_symbols
        .iter()
        .copied()
        .filter(|s| !source_text.contains(s))
        .collect()
}

/// Outcome of checking a set of anchors against files on disk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnchorReport {
    /// `file: symbol` for each symbol that was not found.
    pub missing: Vec<String>,
    /// Files that could not be read.
    pub unreadable: Vec<PathBuf>,
}

impl AnchorReport {
    pub fn passed(&self) -> bool {
        self.missing.is_empty() && self.unreadable.is_empty()
    }
}

/// Check each anchor against `<agent_root>/<file>`.
///
/// An unreadable file counts as a failure, never as an error.
pub fn check_anchors(agent_root: &Path, anchors: &[SourceAnchor]) -> AnchorReport {
    let mut report = AnchorReport::default();

    for anchor in anchors {
        let path = agent_root.join(anchor.file);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                for symbol in missing_anchors(&text, anchor.symbols) {
                    report.missing.push(format!("{}: {}", anchor.file, symbol));
                }
            }
            Err(_) => report.unreadable.push(path),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMANDS_C: &str = r#"
static int validate_task_layout(const uint8_t *task_buffer, size_t task_len)
int commands_parse_tasks(const uint8_t *task_buffer, size_t task_len)
    switch (command_id) {
        case COMMAND_SLEEP:
"#;

    #[test]
    fn test_anchors_present() {
        assert!(anchors_present(
            COMMANDS_C,
            &["validate_task_layout", "commands_parse_tasks"]
        ));
        assert!(!anchors_present(COMMANDS_C, &["case COMMAND_PWD"]));
        assert!(anchors_present(COMMANDS_C, &[]));
    }

    #[test]
    fn test_missing_anchors_keeps_order() {
        let missing = missing_anchors(
            COMMANDS_C,
            &["case COMMAND_PWD", "case COMMAND_SLEEP", "beacon_generate_metadata"],
        );
        assert_eq!(missing, vec!["case COMMAND_PWD", "beacon_generate_metadata"]);
    }

    #[test]
    fn test_check_anchors_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/commands.c"), COMMANDS_C).unwrap();

        let anchors = [
            SourceAnchor {
                file: "src/commands.c",
                symbols: &["commands_parse_tasks", "case COMMAND_PWD"],
            },
            SourceAnchor {
                file: "src/beacon.c",
                symbols: &["beacon_generate_metadata"],
            },
        ];
        let report = check_anchors(dir.path(), &anchors);
        assert!(!report.passed());
        assert_eq!(report.missing, vec!["src/commands.c: case COMMAND_PWD"]);
        assert_eq!(report.unreadable, vec![dir.path().join("src/beacon.c")]);
    }
}
