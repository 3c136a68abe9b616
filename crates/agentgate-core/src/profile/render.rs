//! Hand-off to the external profile header renderer.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::error::RenderError;

/// Turns a resolved profile artifact into a generated configuration header.
pub trait HeaderRenderer {
    fn render(&self, profile_path: &Path, header_path: &Path) -> Result<(), RenderError>;
}

/// Runs an external program as `<program> [args..] --profile <json> --output <header>`.
///
/// Spawn failures and non-zero exits are fatal; nothing is retried.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    command: Vec<String>,
}

impl CommandRenderer {
    /// Create a renderer from a program and its leading arguments.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// Split a whitespace-separated command line such as `render-header --strict`.
    pub fn from_command_line(line: &str) -> Self {
        Self::new(line.split_whitespace().map(str::to_string).collect())
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }
}

impl HeaderRenderer for CommandRenderer {
    fn render(&self, profile_path: &Path, header_path: &Path) -> Result<(), RenderError> {
        let (program, args) = self.command.split_first().ok_or(RenderError::EmptyCommand)?;

        debug!(program = %program, profile = ?profile_path, output = ?header_path, "Rendering profile header");

        let output = Command::new(program)
            .args(args)
            .arg("--profile")
            .arg(profile_path)
            .arg("--output")
            .arg(header_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| RenderError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Renderer used when no external command is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

impl HeaderRenderer for NoopRenderer {
    fn render(&self, _profile_path: &Path, header_path: &Path) -> Result<(), RenderError> {
        warn!(output = ?header_path, "No header renderer configured; header left untouched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_command_line_splits() {
        let renderer = CommandRenderer::from_command_line("  render-header   --profile-dir out --strict ");
        assert_eq!(renderer.command(), ["render-header", "--profile-dir", "out", "--strict"]);
    }

    #[test]
    fn test_empty_command_rejected() {
        let renderer = CommandRenderer::new(vec![]);
        let err = renderer
            .render(&PathBuf::from("p.json"), &PathBuf::from("h.h"))
            .unwrap_err();
        assert!(matches!(err, RenderError::EmptyCommand));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let renderer = CommandRenderer::new(vec!["agentgate-no-such-renderer".to_string()]);
        let err = renderer
            .render(&PathBuf::from("p.json"), &PathBuf::from("h.h"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_fatal() {
        let renderer = CommandRenderer::new(vec!["false".to_string()]);
        let err = renderer
            .render(&PathBuf::from("p.json"), &PathBuf::from("h.h"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_command() {
        let renderer = CommandRenderer::new(vec!["true".to_string()]);
        renderer
            .render(&PathBuf::from("p.json"), &PathBuf::from("h.h"))
            .expect("true should succeed");
    }
}
