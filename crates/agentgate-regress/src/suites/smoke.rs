//! Command id and callback code agreement between fixtures and headers.

use std::collections::BTreeMap;
use std::path::Path;

use agentgate_core::anchors::SourceAnchor;
use agentgate_core::defines::numeric_defines;
use agentgate_core::metadata::FixtureNumber;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fixture::{FixtureDescriptor, Mode};
use crate::suite::{Suite, SuiteContext, SuiteResult};

/// Command header, relative to the agent root.
pub const COMMANDS_HEADER: &str = "headers/commands.h";

/// Expected callbacks, relative to the tests directory.
pub const EXPECTED_CALLBACKS_PATH: &str = "fixtures/protocol/v1/smoke/expected_callbacks.json";

const ANCHORS: &[SourceAnchor] = &[SourceAnchor {
    file: "src/commands.c",
    symbols: &["case COMMAND_SLEEP", "case COMMAND_PWD"],
}];

/// A smoke fixture names one command and the id it expects on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmokeFixture {
    pub command: String,
    pub command_id: FixtureNumber,
}

/// Command -> callback name, and callback name -> code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpectedCallbacks {
    #[serde(default)]
    pub callbacks: BTreeMap<String, String>,
    #[serde(default)]
    pub callback_codes: BTreeMap<String, FixtureNumber>,
}

/// `#define` values read from the command header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct HeaderCodes {
    commands: BTreeMap<String, u32>,
    callbacks: BTreeMap<String, u32>,
}

impl HeaderCodes {
    fn from_text(text: &str) -> Self {
        Self {
            commands: numeric_defines(text, "COMMAND_"),
            callbacks: numeric_defines(text, "CALLBACK_"),
        }
    }
}

/// `sleep` -> `COMMAND_SLEEP`.
pub fn command_define(command: &str) -> String {
    format!("COMMAND_{}", command.to_ascii_uppercase())
}

fn show<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "missing".to_string(), |v| v.to_string())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SmokeSuite;

impl SmokeSuite {
    fn check(
        fixture_id: &str,
        fixture: &SmokeFixture,
        expected: &ExpectedCallbacks,
        header: &HeaderCodes,
    ) -> SuiteResult {
        let id_fixture = fixture.command_id.to_u64();
        let id_header = header
            .commands
            .get(&command_define(&fixture.command))
            .map(|&n| u64::from(n));

        let callback = expected.callbacks.get(&fixture.command);
        let code_fixture = callback
            .and_then(|name| expected.callback_codes.get(name))
            .and_then(FixtureNumber::to_u64);
        let code_header = callback
            .and_then(|name| header.callbacks.get(name))
            .map(|&n| u64::from(n));

        let command_matches = id_fixture.is_some() && id_fixture == id_header;
        let callback_matches = code_fixture.is_some() && code_fixture == code_header;

        let detail = format!(
            "command={} id_fixture={} id_header={} callback={} code_fixture={} code_header={}",
            fixture.command,
            show(id_fixture),
            show(id_header),
            show(callback),
            show(code_fixture),
            show(code_header),
        );
        SuiteResult::new(
            fixture_id,
            "callback_semantic_match",
            command_matches && callback_matches,
            detail,
        )
    }
}

impl Suite for SmokeSuite {
    fn name(&self) -> &'static str {
        "smoke"
    }

    fn run(
        &self,
        _mode: Mode,
        fixtures: &[FixtureDescriptor],
        ctx: &SuiteContext,
    ) -> Vec<SuiteResult> {
        let mut results = Vec::new();

        let header_path = ctx.agent_path(COMMANDS_HEADER);
        let header = match std::fs::read_to_string(&header_path) {
            Ok(text) => HeaderCodes::from_text(&text),
            Err(e) => {
                warn!(path = ?header_path, error = %e, "Command header unreadable");
                HeaderCodes::default()
            }
        };

        let expected = match ctx.load_json::<ExpectedCallbacks>(Path::new(EXPECTED_CALLBACKS_PATH)) {
            Ok(expected) => expected,
            Err(e) => {
                results.push(SuiteResult::fixture_load_failure("smoke-expected-callbacks", &e));
                ExpectedCallbacks::default()
            }
        };

        for fixture in fixtures {
            match ctx.load_json::<SmokeFixture>(&fixture.path) {
                Ok(data) => results.push(Self::check(&fixture.fixture_id, &data, &expected, &header)),
                Err(e) => results.push(SuiteResult::fixture_load_failure(&fixture.fixture_id, &e)),
            }
        }

        results.push(ctx.anchor_result(
            "smoke-source-anchor",
            "commands_switch_anchor",
            ANCHORS,
            "sleep/pwd switch anchors present",
            "missing smoke switch anchors",
        ));

        results
    }
}
