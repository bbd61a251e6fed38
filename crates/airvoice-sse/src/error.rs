//! Transport error types.
//!
//! Every failure is caught at the transport boundary and turned into a
//! state-machine event; nothing here crosses the public API as a panic.
//! The only externally observable failures are `error` notifications and
//! the machine's terminal `failed` state.

/// Errors produced by the streaming transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network-level failure before or during the request.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the connect request with a non-2xx status.
    #[error("connection failed: status {status}")]
    ConnectFailed {
        /// HTTP status code returned by the server.
        status: u16,
    },

    /// The event stream ended (clean end-of-stream from the server).
    #[error("event stream ended")]
    StreamEnded,

    /// A mid-stream failure reported by the read loop.
    #[error("stream error: {message}")]
    Stream {
        /// Error description.
        message: String,
    },

    /// The client options could not be turned into a valid request.
    #[error("invalid request configuration: {message}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        message: String,
    },
}

impl TransportError {
    /// Error category string for logs and metrics labels.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::ConnectFailed { .. } => "connect",
            Self::StreamEnded | Self::Stream { .. } => "stream",
            Self::InvalidConfig { .. } => "config",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
