//! Streaming transport.
//!
//! Owns the HTTP streaming request and a cancellable read loop. The
//! [`Transport`] trait is the seam the state machine drives; the
//! [`HttpTransport`] implementation issues the connect request with
//! `reqwest` and pumps the response body through the wire parser.
//!
//! Lifecycle contract:
//!
//! - `connect(false)` while a stream is live is an idempotent no-op
//! - `connect(true)` cancels any in-flight request first, then reconnects
//! - a non-2xx response rejects immediately — no byte reading
//! - on 2xx the call returns as soon as headers arrive; a background task
//!   then reads chunks, splits the accumulated text on the blank-line
//!   frame delimiter, and emits one `message` event per parsed frame
//! - read failure or clean end-of-stream emits `error` then `close`
//! - cancellation settles the pending read promptly and a cancelled loop
//!   never fires events into a disposed transport

use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use airvoice_core::text::truncate_str;

use crate::config::StreamOptions;
use crate::emitter::EventHandlers;
use crate::error::TransportError;
use crate::wire::{FramePayload, parse_frame};

/// Frame delimiter on the wire: one blank line.
const FRAME_DELIMITER: &[u8; 2] = b"\n\n";

/// Seam between the state machine and the network.
///
/// The machine only ever drives one live transport at a time; tests
/// substitute a scripted implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the event stream.
    ///
    /// Resolves once the response headers arrive and the stream is open.
    /// `reconnect` cancels any prior in-flight request first.
    async fn connect(&self, reconnect: bool) -> Result<(), TransportError>;

    /// Cancel the in-flight request, emit a final `close`, and clear all
    /// registered handlers. Safe to call repeatedly and from any state.
    fn close(&self);

    /// The transport's `message`/`error`/`close` subscription surface.
    fn events(&self) -> &EventHandlers;
}

/// State shared between the transport handle and its read loop.
struct TransportShared {
    events: EventHandlers,
    /// Cancellation token of the live connection, if any.
    live: Mutex<Option<CancellationToken>>,
}

/// `reqwest`-backed [`Transport`].
pub struct HttpTransport {
    options: StreamOptions,
    client: reqwest::Client,
    shared: Arc<TransportShared>,
}

impl HttpTransport {
    /// Create a transport for the given options.
    pub fn new(options: StreamOptions) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .cookie_store(options.with_credentials)
            .build()?;
        Ok(Self::with_client(options, client))
    }

    /// Create a transport reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(options: StreamOptions, client: reqwest::Client) -> Self {
        Self {
            options,
            client,
            shared: Arc::new(TransportShared {
                events: EventHandlers::new(),
                live: Mutex::new(None),
            }),
        }
    }

    fn build_request(&self) -> Result<reqwest::RequestBuilder, TransportError> {
        let method = self.options.http_method()?;
        let mut request = self
            .client
            .request(method, &self.options.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream");
        for (name, value) in &self.options.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &self.options.body {
            request = request.json(body);
        }
        Ok(request)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(url = %self.options.url, reconnect))]
    async fn connect(&self, reconnect: bool) -> Result<(), TransportError> {
        let token = CancellationToken::new();
        {
            let mut live = self.shared.live.lock();
            if reconnect {
                if let Some(prev) = live.take() {
                    prev.cancel();
                }
            } else if live.is_some() {
                debug!("connect ignored: stream already live");
                return Ok(());
            }
            *live = Some(token.clone());
        }

        metrics::counter!("sse_connect_attempts_total").increment(1);

        let request = match self.build_request() {
            Ok(r) => r,
            Err(e) => {
                let _ = self.shared.live.lock().take();
                return Err(e);
            }
        };

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let _ = self.shared.live.lock().take();
                return Err(TransportError::Http(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let _ = self.shared.live.lock().take();
            warn!(status = status.as_u16(), "connect rejected");
            return Err(TransportError::ConnectFailed {
                status: status.as_u16(),
            });
        }

        debug!("stream open");
        let shared = Arc::clone(&self.shared);
        drop(tokio::spawn(read_loop(response, token, shared)));
        Ok(())
    }

    fn close(&self) {
        let token = self.shared.live.lock().take();
        if let Some(token) = token {
            token.cancel();
        }
        debug!("transport closed");
        let _ = self.shared.events.emit_close();
        self.shared.events.clear();
    }

    fn events(&self) -> &EventHandlers {
        &self.shared.events
    }
}

/// Pump the response body until cancellation, error, or end-of-stream.
async fn read_loop(
    response: reqwest::Response,
    token: CancellationToken,
    shared: Arc<TransportShared>,
) {
    let mut stream = response.bytes_stream();
    let mut buffer = BytesMut::with_capacity(8192);

    let error: TransportError = loop {
        tokio::select! {
            () = token.cancelled() => {
                // superseded by a reconnect or an explicit close; the new
                // owner of the connection emits all further events
                trace!("read loop cancelled");
                return;
            }
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    buffer.extend_from_slice(&bytes);
                    drain_frames(&mut buffer, &shared.events);
                }
                Some(Err(e)) => break TransportError::Http(e),
                None => break TransportError::StreamEnded,
            }
        }
    };

    // a trailing block without its closing delimiter is still a frame
    flush_remaining(&mut buffer, &shared.events);

    let _ = shared.live.lock().take();
    warn!(error = %error, category = error.category(), "stream interrupted");
    let _ = shared.events.emit_error(&error);
    let _ = shared.events.emit_close();
}

/// Split complete frame blocks out of the buffer and emit them.
///
/// The trailing partial block (no delimiter yet) stays buffered.
fn drain_frames(buffer: &mut BytesMut, events: &EventHandlers) {
    while let Some(pos) = find_delimiter(buffer) {
        let block = buffer.split_to(pos + FRAME_DELIMITER.len());
        match std::str::from_utf8(&block[..pos]) {
            Ok(text) => feed_block(text, events),
            Err(_) => warn!("skipping frame block with invalid UTF-8"),
        }
    }
}

/// Emit whatever is left in the buffer as a final frame block.
fn flush_remaining(buffer: &mut BytesMut, events: &EventHandlers) {
    if buffer.is_empty() {
        return;
    }
    match std::str::from_utf8(buffer) {
        Ok(text) => feed_block(text, events),
        Err(_) => warn!("discarding trailing bytes with invalid UTF-8"),
    }
    buffer.clear();
}

fn find_delimiter(buffer: &BytesMut) -> Option<usize> {
    buffer.windows(FRAME_DELIMITER.len()).position(|w| w == FRAME_DELIMITER)
}

fn feed_block(text: &str, events: &EventHandlers) {
    if text.trim().is_empty() {
        return;
    }
    if let Some(frame) = parse_frame(text) {
        let payload = FramePayload::from(frame);
        trace!(
            event = payload.event.as_deref().unwrap_or(""),
            data = truncate_str(&payload.data.to_string(), 120),
            "frame received"
        );
        let _ = events.emit_message(&payload);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
