//! Wire-frame parser for the event stream protocol.
//!
//! The remote peer emits newline-delimited frames separated by a blank
//! line, with `event:`, `data:`, and `id:` header lines. This module turns
//! one decoded frame block into a structured [`Frame`]:
//!
//! - Lines without a colon, and comment lines (colon first), are ignored
//! - `data:` values are JSON when parseable, else kept as the raw string —
//!   a malformed payload is never an error
//! - Multiple `data:` lines accumulate by newline-joining before the JSON
//!   parse (standard SSE accumulation; see DESIGN.md)
//! - A block with no `data:` line at all is a pure control frame and
//!   yields `None`

use serde_json::Value;

use airvoice_core::text::truncate_str;
use tracing::trace;

/// One parsed unit of the wire protocol.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Event tag from the `event:` line, verbatim.
    pub event: Option<String>,
    /// Frame ID from the `id:` line, verbatim. Currently unused downstream.
    pub id: Option<String>,
    /// Payload: parsed JSON, or the raw string when parsing fails.
    pub data: Value,
}

/// The payload handed to `message` subscribers: the emitted event name is
/// always carried alongside the data, even for frames without one.
#[derive(Clone, Debug, PartialEq)]
pub struct FramePayload {
    /// Event tag of the originating frame.
    pub event: Option<String>,
    /// Frame payload.
    pub data: Value,
}

impl From<Frame> for FramePayload {
    fn from(frame: Frame) -> Self {
        // the frame id has no downstream consumer
        Self {
            event: frame.event,
            data: frame.data,
        }
    }
}

/// Parse one blank-line-terminated frame block.
///
/// Returns `None` when the block carried no `data:` field.
#[must_use]
pub fn parse_frame(block: &str) -> Option<Frame> {
    let mut event: Option<String> = None;
    let mut id: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(colon) = line.find(':') else {
            continue;
        };
        if colon == 0 {
            // comment line
            continue;
        }

        let field = line[..colon].trim();
        let value = line[colon + 1..].trim();

        match field {
            "event" => event = Some(value.to_owned()),
            "data" => data_lines.push(value),
            "id" => id = Some(value.to_owned()),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        trace!(block = truncate_str(block, 80), "control frame dropped");
        return None;
    }

    let joined = data_lines.join("\n");
    let data = match serde_json::from_str(&joined) {
        Ok(value) => value,
        Err(_) => Value::String(joined),
    };

    Some(Frame { event, id, data })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
