//! Conversation message vocabulary.
//!
//! Two type families:
//!
//! - **[`Message`]**: An aggregated entry in the ordered, append-only
//!   conversation log. Entries are only ever appended, or the last entry
//!   is extended in place while a streaming reply is still in flight.
//! - **[`ReplyFragment`]**: The body of one `ai_message` wire frame —
//!   a sub-state marker plus a content fragment. Transient, never stored.
//!
//! The event tag set is closed ([`MessageKind`]): frames carrying any other
//! tag (server heartbeats, status banners) never enter the log.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of application event tags that produce log entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A complete conversational turn from the user.
    HumanMessage,
    /// A streaming assistant reply (start/processing/end fragments).
    AiMessage,
    /// A structured itinerary payload delivered as embedded JSON.
    Journey,
}

impl MessageKind {
    /// Map a wire event tag to a kind. Unknown tags return `None` and are
    /// passed through the aggregator unchanged.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "human_message" => Some(Self::HumanMessage),
            "ai_message" => Some(Self::AiMessage),
            "journey" => Some(Self::Journey),
            _ => None,
        }
    }

    /// The wire tag for this kind.
    #[must_use]
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::HumanMessage => "human_message",
            Self::AiMessage => "ai_message",
            Self::Journey => "journey",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming reply fragments
// ─────────────────────────────────────────────────────────────────────────────

/// Sub-state of a streaming assistant reply fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyState {
    /// First fragment of a logical reply.
    Start,
    /// Incremental continuation — content concatenates onto the open reply.
    Processing,
    /// Terminal fragment. Carries no new content for the log: everything
    /// was already delivered incrementally.
    End,
}

/// Body of one `ai_message` wire frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyFragment {
    /// Where this fragment sits in the reply lifecycle.
    pub state: ReplyState,
    /// Content carried by this fragment (may be empty, e.g. on `end`).
    #[serde(default)]
    pub content: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Message log entries
// ─────────────────────────────────────────────────────────────────────────────

/// One aggregated entry in the conversation log.
///
/// The log is append-only: entries are appended, or the last entry is
/// mutated in place while an assistant reply is still streaming
/// (`finalized: false`). Entries are never removed or reordered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Message {
    /// A complete user turn, stored verbatim.
    HumanMessage {
        /// Frame payload as received.
        data: Value,
        /// RFC 3339 arrival timestamp.
        #[serde(rename = "receivedAt")]
        received_at: String,
    },
    /// An assistant reply aggregated from streaming fragments.
    AiMessage {
        /// Accumulated reply content.
        content: String,
        /// Whether the terminal fragment has arrived.
        finalized: bool,
        /// RFC 3339 arrival timestamp of the first fragment.
        #[serde(rename = "receivedAt")]
        received_at: String,
    },
    /// A structured journey/itinerary object.
    Journey {
        /// Parsed payload (or the raw string if the embedded JSON was bad).
        data: Value,
        /// RFC 3339 arrival timestamp.
        #[serde(rename = "receivedAt")]
        received_at: String,
    },
}

impl Message {
    /// Create a user-turn entry stamped with the current time.
    #[must_use]
    pub fn human(data: Value) -> Self {
        Self::HumanMessage {
            data,
            received_at: now_rfc3339(),
        }
    }

    /// Create an open (unfinalized) assistant reply entry.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::AiMessage {
            content: content.into(),
            finalized: false,
            received_at: now_rfc3339(),
        }
    }

    /// Create a journey entry stamped with the current time.
    #[must_use]
    pub fn journey(data: Value) -> Self {
        Self::Journey {
            data,
            received_at: now_rfc3339(),
        }
    }

    /// The event kind of this entry.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::HumanMessage { .. } => MessageKind::HumanMessage,
            Self::AiMessage { .. } => MessageKind::AiMessage,
            Self::Journey { .. } => MessageKind::Journey,
        }
    }

    /// Arrival timestamp of this entry.
    #[must_use]
    pub fn received_at(&self) -> &str {
        match self {
            Self::HumanMessage { received_at, .. }
            | Self::AiMessage { received_at, .. }
            | Self::Journey { received_at, .. } => received_at,
        }
    }
}

/// Current UTC time as an RFC 3339 string.
fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
