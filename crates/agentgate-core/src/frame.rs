//! Task-frame layout validation.
//!
//! A task frame is a sequence of records, each starting with two big-endian
//! `u32` fields (`command_id`, `data_length`), followed by an optional
//! per-record header and `data_length` payload bytes:
//!
//! ```text
//! v1: [command_id:4][data_length:4][payload:data_length]
//! v2: [command_id:4][data_length:4][header:8][payload:data_length]
//! ```
//!
//! The two layouts are distinguished only by the header length, so the
//! dispatcher tries v2 first, then v1. Every function here is total over
//! arbitrary input: malformed frames produce a reject verdict, never a panic,
//! and a reject verdict always tells the caller to keep its read loop going.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Size of the `command_id` + `data_length` prefix.
pub const RECORD_PREFIX_LEN: usize = 8;

/// Per-record header length of the v1 layout.
pub const V1_HEADER_LEN: usize = 0;

/// Per-record header length of the v2 layout.
pub const V2_HEADER_LEN: usize = 8;

/// Highest command id accepted; ids above it are treated as corruption.
pub const MAX_COMMAND_ID: u32 = 0xFFFF;

/// Why a single-layout scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutReason {
    Ok,
    InvalidCommandId,
    LengthOverrun,
    IncompleteHeaderOrTrailingBytes,
}

impl LayoutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutReason::Ok => "ok",
            LayoutReason::InvalidCommandId => "invalid_command_id",
            LayoutReason::LengthOverrun => "length_overrun",
            LayoutReason::IncompleteHeaderOrTrailingBytes => "incomplete_header_or_trailing_bytes",
        }
    }
}

impl fmt::Display for LayoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record located while scanning a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRecord {
    pub command_id: u32,
    pub data_length: u32,
    /// Offset of the payload (after the prefix and per-record header).
    pub payload_offset: usize,
    pub payload_length: usize,
}

/// Result of scanning a frame under one header-length hypothesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutScan {
    pub valid: bool,
    pub reason: LayoutReason,
    /// Records that scanned cleanly before the scan stopped.
    pub records: Vec<TaskRecord>,
}

impl LayoutScan {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Scan `buffer` assuming every record carries `header_len` header bytes.
pub fn scan_layout(buffer: &[u8], header_len: usize) -> LayoutScan {
    let mut offset = 0usize;
    let mut records = Vec::new();

    while buffer.len() - offset >= RECORD_PREFIX_LEN {
        let command_id = read_be_u32(buffer, offset);
        let data_length = read_be_u32(buffer, offset + 4);
        offset += RECORD_PREFIX_LEN;

        if command_id == 0 || command_id > MAX_COMMAND_ID {
            return reject(records, LayoutReason::InvalidCommandId);
        }

        // Widened so an attacker-controlled `data_length` cannot wrap.
        let record_len = (header_len as u64).saturating_add(u64::from(data_length));
        let remaining = (buffer.len() - offset) as u64;
        if record_len > remaining {
            return reject(records, LayoutReason::LengthOverrun);
        }

        records.push(TaskRecord {
            command_id,
            data_length,
            payload_offset: offset + header_len,
            payload_length: data_length as usize,
        });
        // Fits: record_len <= remaining, which is bounded by buffer.len().
        offset += record_len as usize;
    }

    if !records.is_empty() && offset == buffer.len() {
        LayoutScan {
            valid: true,
            reason: LayoutReason::Ok,
            records,
        }
    } else {
        reject(records, LayoutReason::IncompleteHeaderOrTrailingBytes)
    }
}

fn reject(records: Vec<TaskRecord>, reason: LayoutReason) -> LayoutScan {
    LayoutScan {
        valid: false,
        reason,
        records,
    }
}

fn read_be_u32(buffer: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buffer[offset..offset + 4]);
    u32::from_be_bytes(bytes)
}

/// `(valid, record_count, reason)` for a single layout hypothesis.
pub fn validate_layout(buffer: &[u8], header_len: usize) -> (bool, usize, &'static str) {
    let scan = scan_layout(buffer, header_len);
    (scan.valid, scan.record_count(), scan.reason.as_str())
}

/// Dispatcher verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Accept,
    Reject,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Accept => "accept",
            Outcome::Reject => "reject",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout the dispatcher settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    V1,
    V2,
    #[serde(rename = "none")]
    Unmatched,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::V1 => "v1",
            Layout::V2 => "v2",
            Layout::Unmatched => "none",
        }
    }

    /// Per-record header length, if this is a concrete layout.
    pub fn header_len(&self) -> Option<usize> {
        match self {
            Layout::V1 => Some(V1_HEADER_LEN),
            Layout::V2 => Some(V2_HEADER_LEN),
            Layout::Unmatched => None,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of the task dispatcher for one frame. Always fully populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub outcome: Outcome,
    pub continue_loop: bool,
    pub reason: String,
    pub layout: Layout,
    pub record_count: usize,
}

impl ValidationResult {
    pub fn accepted(&self) -> bool {
        self.outcome == Outcome::Accept
    }
}

/// Decide how the dispatcher treats `buffer`.
///
/// v2 is tried first and wins when both layouts fit. When neither fits, the
/// reason embeds both sub-reasons. `continue_loop` is `true` in every case.
pub fn parse_tasks(buffer: &[u8]) -> ValidationResult {
    let v2 = scan_layout(buffer, V2_HEADER_LEN);
    if v2.valid {
        return accept(Layout::V2, v2.record_count());
    }

    let v1 = scan_layout(buffer, V1_HEADER_LEN);
    if v1.valid {
        return accept(Layout::V1, v1.record_count());
    }

    ValidationResult {
        outcome: Outcome::Reject,
        continue_loop: true,
        reason: format!("layout_invalid(v2={},v1={})", v2.reason, v1.reason),
        layout: Layout::Unmatched,
        record_count: 0,
    }
}

fn accept(layout: Layout, record_count: usize) -> ValidationResult {
    ValidationResult {
        outcome: Outcome::Accept,
        continue_loop: true,
        reason: "layout_valid".to_string(),
        layout,
        record_count,
    }
}

/// Builds well-formed task frames for a given layout.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    header_len: usize,
    bytes: Vec<u8>,
}

impl FrameBuilder {
    pub fn new(layout: Layout) -> Self {
        Self {
            header_len: layout.header_len().unwrap_or(V1_HEADER_LEN),
            bytes: Vec::new(),
        }
    }

    /// Append a record with a zeroed per-record header.
    ///
    /// Payloads longer than `u32::MAX` bytes are not representable on the wire.
    pub fn record(mut self, command_id: u32, payload: &[u8]) -> Self {
        let data_length = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        self.bytes.extend_from_slice(&command_id.to_be_bytes());
        self.bytes.extend_from_slice(&data_length.to_be_bytes());
        self.bytes.resize(self.bytes.len() + self.header_len, 0);
        self.bytes.extend_from_slice(payload);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}
