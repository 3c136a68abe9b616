//! Protocol metadata roundtrip and configuration cross-check.

use std::collections::BTreeMap;

use agentgate_core::anchors::SourceAnchor;
use agentgate_core::defines::extract_defines;
use agentgate_core::metadata::{MetadataCheck, MetadataFixture};
use tracing::{debug, warn};

use crate::fixture::{FixtureDescriptor, Mode};
use crate::suite::{Suite, SuiteContext, SuiteResult};

/// Generated configuration header, relative to the agent root.
pub const CONFIG_HEADER: &str = "headers/config.h";

/// Only fixtures in this category are protocol metadata fixtures.
pub const METADATA_CATEGORY: &str = "metadata";

const ANCHORS: &[SourceAnchor] = &[SourceAnchor {
    file: "src/beacon.c",
    symbols: &["beacon_generate_metadata", "0x0000BEEF"],
}];

#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolSuite;

impl ProtocolSuite {
    fn config_defines(ctx: &SuiteContext) -> BTreeMap<String, String> {
        let path = ctx.agent_path(CONFIG_HEADER);
        match std::fs::read_to_string(&path) {
            Ok(text) => extract_defines(&text),
            Err(e) => {
                warn!(path = ?path, error = %e, "Configuration header unreadable");
                BTreeMap::new()
            }
        }
    }
}

impl Suite for ProtocolSuite {
    fn name(&self) -> &'static str {
        "protocol"
    }

    fn run(
        &self,
        _mode: Mode,
        fixtures: &[FixtureDescriptor],
        ctx: &SuiteContext,
    ) -> Vec<SuiteResult> {
        let mut results = vec![ctx.anchor_result(
            "protocol-source-anchor",
            "metadata_anchor",
            ANCHORS,
            "beacon metadata anchors present",
            "missing metadata anchors in beacon.c",
        )];

        let config = Self::config_defines(ctx);

        for fixture in fixtures {
            if fixture.category.as_deref() != Some(METADATA_CATEGORY) {
                debug!(fixture_id = %fixture.fixture_id, "Skipping non-metadata fixture");
                continue;
            }

            let data: MetadataFixture = match ctx.load_json(&fixture.path) {
                Ok(data) => data,
                Err(e) => {
                    results.push(SuiteResult::fixture_load_failure(&fixture.fixture_id, &e));
                    continue;
                }
            };

            let check = MetadataCheck::run(&data, &config);
            results.push(SuiteResult::new(
                &fixture.fixture_id,
                "semantic_roundtrip",
                check.passed(),
                check.detail(),
            ));
        }

        results
    }
}
