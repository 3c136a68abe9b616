//! AgentGate core library.
//!
//! Building blocks for checking an agent build against its listener profile
//! and its wire protocol: profile schema validation and resolution, task
//! frame layout checks, protocol metadata encoding, `#define` extraction and
//! source anchor checks.

pub mod anchors;
pub mod defines;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod profile;
pub mod telemetry;

pub use anchors::{anchors_present, check_anchors, missing_anchors, AnchorReport, SourceAnchor};
pub use defines::{extract_defines, numeric_defines, parse_number};
pub use error::{MetadataError, ProfileError, RenderError, ResolveError};
pub use frame::{
    parse_tasks, scan_layout, validate_layout, FrameBuilder, Layout, LayoutReason, LayoutScan,
    Outcome, TaskRecord, ValidationResult,
};
pub use metadata::{
    config_mismatches, roundtrip, roundtrip_record, FixtureNumber, FixtureProfile,
    MetadataCheck, MetadataFixture, MetadataRecord, SemanticExpectations, METADATA_MAGIC,
};
pub use profile::{
    load_profile_value, resolve, validate, validate_profile_file, CommandRenderer,
    HeaderRenderer, ListenerOverrides, NoopRenderer, Platform, Profile, ResolveReport,
    ResolveRequest, Transport, Violation,
};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
