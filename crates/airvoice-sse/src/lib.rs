//! # airvoice-sse
//!
//! Resilient server-streamed-event client.
//!
//! Opens a long-lived, unidirectional event stream over a POST-capable
//! streaming HTTP request, parses the wire protocol into frames,
//! aggregates incremental payloads into coherent conversation messages,
//! and recovers from transient network failure through a deterministic
//! retry/backoff state machine.
//!
//! Layering, leaves first:
//!
//! - [`wire`]: decoded frame blocks → [`wire::Frame`]
//! - [`transport`]: the HTTP request, cancellable read loop, byte decoding
//! - [`aggregator`]: frames → the append-only message log
//! - [`machine`]: the connection lifecycle actor ([`machine::SseConnection`])
//! - [`emitter`] / [`config`] / [`error`]: subscription surface, options,
//!   error types
//!
//! ```no_run
//! use airvoice_sse::{SseConnection, StreamOptions};
//!
//! # async fn demo() {
//! let connection = SseConnection::new(StreamOptions {
//!     url: "https://assistant.example/api/v1/sse".into(),
//!     ..StreamOptions::default()
//! });
//! let _id = connection.on_message(|payload| {
//!     println!("frame: {:?}", payload.event);
//! });
//! connection.connect();
//! # }
//! ```

#![deny(unsafe_code)]

pub mod aggregator;
pub mod config;
pub mod emitter;
pub mod error;
pub mod machine;
pub mod transport;
pub mod wire;

pub use config::StreamOptions;
pub use emitter::{EventHandlers, HandlerId};
pub use error::TransportError;
pub use machine::{ConnectionState, SseConnection};
pub use transport::{HttpTransport, Transport};
pub use wire::{Frame, FramePayload, parse_frame};
