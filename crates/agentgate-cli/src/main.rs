//! AgentGate - deterministic verification for agent builds
//!
//! The `agentgate` command checks listener profiles and the agent's wire
//! protocol before a build is produced.
//!
//! ## Commands
//!
//! - `resolve-profile`: Merge listener values into a template profile and render the config header
//! - `validate-profile`: Validate a profile JSON file
//! - `regress`: Run fixture-driven regression suites

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use agentgate_core::error::ResolveError;
use agentgate_core::profile::DEFAULT_TEMPLATE;
use agentgate_core::{
    load_profile_value, resolve, CommandRenderer, HeaderRenderer, ListenerOverrides,
    NoopRenderer, Platform, Profile, ResolveRequest, Transport,
};
use agentgate_regress::{
    write_report_json, FixtureIndex, Mode, Orchestrator, RunOptions, SuiteContext, SuiteRegistry,
    FIXTURE_INDEX_FILE,
};

/// Default regression tests directory, relative to the repository root.
const DEFAULT_TESTS_DIR: &str = "implant/tests";

#[derive(Parser)]
#[command(name = "agentgate")]
#[command(author = "AgentGate Maintainers")]
#[command(version = agentgate_core::VERSION)]
#[command(about = "Profile, task-frame and protocol checks for agent builds", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Repository root
    #[arg(long, global = true, env = "AGENTGATE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Header renderer command, run as `<cmd> --profile <json> --output <header>`
    #[arg(long, global = true, env = "AGENTGATE_RENDERER")]
    renderer: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a listener into the selected profile and render its header
    #[command(allow_negative_numbers = true)]
    ResolveProfile {
        /// Listener host
        server: String,

        /// Listener port
        port: i64,

        /// 1 to use HTTPS, 0 for plain HTTP
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        https: u8,

        /// Template profile (default: profiles/http/default-profile.json under --root)
        profile: Option<PathBuf>,

        /// Target platform
        #[arg(long, default_value = "linux")]
        target: Platform,

        /// Listener transport
        #[arg(long, default_value = "http")]
        transport: Transport,

        /// Disable TLS certificate verification in the agent
        #[arg(long)]
        ssl_ignore_verify: bool,
    },

    /// Validate a profile JSON file
    ValidateProfile {
        /// Path to the profile
        path: PathBuf,
    },

    /// Run fixture-driven regression suites
    Regress {
        /// Regression depth
        #[arg(long, default_value = "quick")]
        mode: Mode,

        /// Run a single suite
        #[arg(long)]
        suite: Option<String>,

        /// List the selection without running it
        #[arg(long)]
        dry_run: bool,

        /// Also write the report as JSON
        #[arg(long)]
        report_json: Option<PathBuf>,

        /// Regression tests directory (default: implant/tests under --root)
        #[arg(long, env = "AGENTGATE_TESTS_DIR")]
        tests_dir: Option<PathBuf>,

        /// Fixture index (default: fixture_index.json in the tests directory)
        #[arg(long)]
        index: Option<PathBuf>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::ResolveProfile { .. } => "resolve-profile",
            Commands::ValidateProfile { .. } => "validate-profile",
            Commands::Regress { .. } => "regress",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    agentgate_core::telemetry::init_tracing(cli.json, level);

    let name = cli.command.name();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            println!("ERROR {}: {:#}", name, e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let renderer: Box<dyn HeaderRenderer> = match cli.renderer.as_deref() {
        Some(line) if !line.trim().is_empty() => Box::new(CommandRenderer::from_command_line(line)),
        _ => Box::new(NoopRenderer),
    };

    match cli.command {
        Commands::ResolveProfile {
            server,
            port,
            https,
            profile,
            target,
            transport,
            ssl_ignore_verify,
        } => {
            let request = ResolveRequest {
                root: cli.root.clone(),
                template: profile.unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE)),
                overrides: ListenerOverrides {
                    host: server,
                    port,
                    use_https: https == 1,
                    ssl_ignore_verify,
                },
                platform: target,
                transport,
            };
            cmd_resolve_profile(&request, renderer.as_ref())
        }
        Commands::ValidateProfile { path } => Ok(exit_code(cmd_validate_profile(&path))),
        Commands::Regress {
            mode,
            suite,
            dry_run,
            report_json,
            tests_dir,
            index,
        } => {
            let tests_dir = tests_dir.unwrap_or_else(|| cli.root.join(DEFAULT_TESTS_DIR));
            let index = index.unwrap_or_else(|| tests_dir.join(FIXTURE_INDEX_FILE));
            let mut options = RunOptions::new(mode);
            if let Some(suite) = suite {
                options = options.with_suite(suite);
            }
            cmd_regress(
                &tests_dir,
                &index,
                &options,
                dry_run,
                cli.verbose,
                report_json.as_deref(),
            )
        }
    }
}

/// Path shown to the user: relative to `root` when possible.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn exit_code(code: i32) -> ExitCode {
    if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Resolve a listener-specific profile artifact.
fn cmd_resolve_profile(request: &ResolveRequest, renderer: &dyn HeaderRenderer) -> Result<ExitCode> {
    info!(
        server = %request.overrides.host,
        port = request.overrides.port,
        target = %request.platform,
        transport = %request.transport,
        "Resolving listener profile"
    );

    let report = match resolve(request, renderer) {
        Ok(report) => report,
        Err(ResolveError::InvalidProfile { path, violations }) => {
            for violation in &violations {
                println!("INVALID {}: {}", path.display(), violation);
            }
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("profile resolution failed"),
    };

    println!(
        "Profile selection resolved: source={} target={} transport={}",
        report.source_path.display(),
        report.platform,
        report.transport
    );
    println!(
        "Generated profile JSON: {}",
        display_path(&report.profile_path, &request.root)
    );
    println!(
        "Generated profile header: {}",
        display_path(&report.header_path, &request.root)
    );
    println!("Artifact digest: sha256:{}", report.artifact_digest);
    Ok(ExitCode::SUCCESS)
}

/// Validate a profile file and print a one-line verdict per finding.
fn cmd_validate_profile(path: &Path) -> i32 {
    let value = match load_profile_value(path) {
        Ok(value) => value,
        Err(e) => {
            println!("INVALID {}: {}", path.display(), e);
            return 1;
        }
    };

    let profile = match Profile::from_value(&value) {
        Ok(profile) => profile,
        Err(violations) => {
            for violation in &violations {
                println!("INVALID {}: {}", path.display(), violation);
            }
            return 1;
        }
    };

    println!(
        "VALID profile_id={} schema={} host={} port={} https={}",
        profile.profile_id, profile.schema_version, profile.host, profile.port, profile.use_https
    );
    0
}

/// Run the regression suites selected by `options`.
fn cmd_regress(
    tests_dir: &Path,
    index_path: &Path,
    options: &RunOptions,
    dry_run: bool,
    verbose: bool,
    report_json: Option<&Path>,
) -> Result<ExitCode> {
    let index = FixtureIndex::load(index_path)
        .with_context(|| format!("failed to load fixture index {}", index_path.display()))?;

    let registry = SuiteRegistry::builtin();
    let orchestrator = Orchestrator::new(&registry, SuiteContext::new(tests_dir.to_path_buf()));

    if dry_run {
        let dry = orchestrator.dry_run(&index, options);
        print!("{}", dry.render());
        return Ok(exit_code(dry.exit_code()));
    }

    let report = orchestrator.run(&index, options);
    print!("{}", report.render(verbose));

    if let Some(path) = report_json {
        write_report_json(path, &report)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        info!(path = ?path, "Report written");
    }

    Ok(exit_code(report.exit_code()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve_profile() {
        let cli = Cli::try_parse_from([
            "agentgate",
            "resolve-profile",
            "10.0.0.1",
            "443",
            "1",
            "--target",
            "macos",
            "--ssl-ignore-verify",
        ])
        .unwrap();
        match cli.command {
            Commands::ResolveProfile {
                server,
                port,
                https,
                profile,
                target,
                transport,
                ssl_ignore_verify,
            } => {
                assert_eq!(server, "10.0.0.1");
                assert_eq!(port, 443);
                assert_eq!(https, 1);
                assert!(profile.is_none());
                assert_eq!(target, Platform::Macos);
                assert_eq!(transport, Transport::Http);
                assert!(ssl_ignore_verify);
            }
            _ => panic!("expected resolve-profile"),
        }
    }

    #[test]
    fn test_https_flag_must_be_binary() {
        assert!(Cli::try_parse_from(["agentgate", "resolve-profile", "h", "80", "2"]).is_err());
        assert!(
            Cli::try_parse_from(["agentgate", "resolve-profile", "h", "80", "0", "--target", "bsd"])
                .is_err()
        );
    }

    #[test]
    fn test_parse_regress() {
        let cli = Cli::try_parse_from([
            "agentgate",
            "regress",
            "--mode",
            "full",
            "--suite",
            "parser",
            "--dry-run",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Regress {
                mode,
                suite,
                dry_run,
                ..
            } => {
                assert_eq!(mode, Mode::Full);
                assert_eq!(suite.as_deref(), Some("parser"));
                assert!(dry_run);
            }
            _ => panic!("expected regress"),
        }
    }

    #[test]
    fn test_display_path() {
        assert_eq!(
            display_path(Path::new("/repo/implant/generated/x.json"), Path::new("/repo")),
            "implant/generated/x.json"
        );
        assert_eq!(
            display_path(Path::new("/elsewhere/x.json"), Path::new("/repo")),
            "/elsewhere/x.json"
        );
    }

    #[test]
    fn test_validate_profile_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(
            &good,
            serde_json::json!({
                "profile_id": "p",
                "schema_version": "1.0",
                "host": "h",
                "port": 80,
                "use_https": false,
                "http_get_uri": "/g",
                "http_post_uri": "/p",
                "user_agent": "Mozilla/5.0 test",
                "http_headers": {"Accept": "*/*"}
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(cmd_validate_profile(&good), 0);
        assert_eq!(cmd_validate_profile(&dir.path().join("missing.json")), 1);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "[1, 2]").unwrap();
        assert_eq!(cmd_validate_profile(&bad), 1);
    }
}
