//! Connection state machine.
//!
//! Orchestrates the streaming transport and the retry policy across the
//! connection lifecycle:
//!
//! ```text
//! idle ──connect──▶ connecting ──success──▶ open
//!                       │  ▲                  │
//!                    failure│ timer        error/close
//!                       ▼  │                  ▼
//!                     retry ◀───────────────retry
//!                       │
//!            count < max│count ≥ max
//!                       ▼        ▼
//!                   delaying   failed ──reset──▶ idle
//! ```
//!
//! The machine is an actor: one background task owns the connection
//! context, and every command and transport notification arrives on a
//! single event queue, so all mutation is serialized. Side effects
//! (network I/O, the retry timer) happen only in state-entry actions.
//! At most one live transport and one pending retry timer exist at a
//! time. [`SseConnection`] is an explicitly constructed, explicitly
//! owned handle — there is no process-wide client singleton.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use airvoice_core::events::Message;
use airvoice_core::retry::RetryConfig;

use crate::aggregator;
use crate::config::StreamOptions;
use crate::emitter::{EventHandlers, HandlerId};
use crate::error::TransportError;
use crate::transport::{HttpTransport, Transport};
use crate::wire::FramePayload;

/// Connection lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not yet started, or explicitly reset.
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// The stream is open and delivering frames.
    Open,
    /// A failure was recorded; deciding between another attempt and giving up.
    Retry,
    /// Waiting out the backoff delay before reconnecting.
    Delaying,
    /// Retries exhausted. Terminal until an external `connect` or `reset`.
    Failed,
}

/// Factory producing transports for the machine.
///
/// The machine guarantees at most one live transport: it reuses the
/// current instance across reconnects and only invokes the factory after
/// disposing the previous one.
pub type TransportFactory =
    Box<dyn Fn() -> Result<Arc<dyn Transport>, TransportError> + Send + Sync>;

/// Everything that can advance the machine, external or internal.
enum MachineEvent {
    Connect,
    Reset,
    Shutdown,
    ConnectSucceeded {
        /// Which connect attempt this outcome belongs to.
        attempt: u64,
    },
    ConnectFailed {
        attempt: u64,
        error: TransportError,
    },
    FrameReceived(FramePayload),
    StreamFailed { message: String },
    StreamClosed,
    RetryTimerFired,
}

/// Snapshot state shared between the handle and the actor.
struct ConnectionShared {
    state: Mutex<ConnectionState>,
    messages: Mutex<Vec<Message>>,
    last_error: Mutex<Option<String>>,
    retry_count: Mutex<u32>,
    /// Consumer-facing event surface.
    events: EventHandlers,
}

/// Handle to one resilient event-stream connection.
///
/// Must be created inside a tokio runtime (the machine runs as a
/// background task). Dropping the handle shuts the machine down.
pub struct SseConnection {
    tx: mpsc::UnboundedSender<MachineEvent>,
    shared: Arc<ConnectionShared>,
}

impl SseConnection {
    /// Create a connection backed by an [`HttpTransport`] for `options`.
    #[must_use]
    pub fn new(options: StreamOptions) -> Self {
        let retry = options.retry.clone();
        let factory: TransportFactory = Box::new(move || {
            let transport = HttpTransport::new(options.clone())?;
            Ok(Arc::new(transport) as Arc<dyn Transport>)
        });
        Self::with_transport_factory(retry, factory)
    }

    /// Create a connection with a custom transport factory.
    ///
    /// This is the seam used by tests; production code goes through
    /// [`SseConnection::new`].
    #[must_use]
    pub fn with_transport_factory(retry: RetryConfig, factory: TransportFactory) -> Self {
        let shared = Arc::new(ConnectionShared {
            state: Mutex::new(ConnectionState::Idle),
            messages: Mutex::new(Vec::new()),
            last_error: Mutex::new(None),
            retry_count: Mutex::new(0),
            events: EventHandlers::new(),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        let actor = ConnectionActor {
            retry_config: retry,
            factory,
            transport: None,
            listener_ids: Vec::new(),
            retry_timer: None,
            attempt: 0,
            shared: Arc::clone(&shared),
            tx: tx.clone(),
        };
        drop(tokio::spawn(actor.run(rx)));

        Self { tx, shared }
    }

    /// Request a connection. No-op while already connecting or open.
    pub fn connect(&self) {
        self.send(MachineEvent::Connect);
    }

    /// Dispose the transport and return to `idle`.
    pub fn reset(&self) {
        self.send(MachineEvent::Reset);
    }

    /// Shut the connection down: cancel any in-flight request, emit a
    /// final `close`, and stop the machine. The handle is inert afterwards.
    pub fn close(&self) {
        self.send(MachineEvent::Shutdown);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    /// Snapshot of the aggregated message log.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.shared.messages.lock().clone()
    }

    /// The most recent connection error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    /// Current retry counter value.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        *self.shared.retry_count.lock()
    }

    /// Register a `message` handler on the consumer surface.
    pub fn on_message<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&FramePayload) + Send + Sync + 'static,
    {
        self.shared.events.on_message(handler)
    }

    /// Register an `error` handler on the consumer surface.
    pub fn on_error<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.shared.events.on_error(handler)
    }

    /// Register a `close` handler on the consumer surface.
    pub fn on_close<F>(&self, handler: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.events.on_close(handler)
    }

    /// Unregister a handler. Idempotent.
    pub fn off(&self, id: HandlerId) -> bool {
        self.shared.events.off(id)
    }

    fn send(&self, event: MachineEvent) {
        if self.tx.send(event).is_err() {
            debug!("machine already shut down; command dropped");
        }
    }
}

impl Drop for SseConnection {
    fn drop(&mut self) {
        let _ = self.tx.send(MachineEvent::Shutdown);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actor
// ─────────────────────────────────────────────────────────────────────────────

struct ConnectionActor {
    retry_config: RetryConfig,
    factory: TransportFactory,
    transport: Option<Arc<dyn Transport>>,
    listener_ids: Vec<HandlerId>,
    retry_timer: Option<tokio::task::JoinHandle<()>>,
    /// Generation counter for connect attempts; stale outcomes are dropped.
    attempt: u64,
    shared: Arc<ConnectionShared>,
    tx: mpsc::UnboundedSender<MachineEvent>,
}

impl ConnectionActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<MachineEvent>) {
        while let Some(event) = rx.recv().await {
            if matches!(event, MachineEvent::Shutdown) {
                self.shutdown();
                break;
            }
            self.handle(event);
        }
    }

    fn handle(&mut self, event: MachineEvent) {
        let state = self.state();
        match (state, event) {
            // -- external commands --
            (ConnectionState::Idle, MachineEvent::Connect) => {
                self.set_retry_count(0);
                self.enter_connecting(false);
            }
            (ConnectionState::Failed, MachineEvent::Connect) => {
                self.dispose_transport();
                self.set_retry_count(0);
                self.enter_connecting(false);
            }
            (_, MachineEvent::Connect) => {
                debug!(state = ?state, "connect ignored: already in progress");
            }
            (_, MachineEvent::Reset) => {
                self.cancel_retry_timer();
                self.dispose_transport();
                self.set_retry_count(0);
                *self.shared.last_error.lock() = None;
                self.set_state(ConnectionState::Idle);
            }

            // -- connect attempt outcomes --
            //
            // outcomes are tagged with their attempt generation so a
            // slow-delivered result from a superseded attempt can never be
            // mistaken for the current one
            (ConnectionState::Connecting, MachineEvent::ConnectSucceeded { attempt })
                if attempt == self.attempt =>
            {
                self.set_retry_count(0);
                self.set_state(ConnectionState::Open);
            }
            (ConnectionState::Connecting, MachineEvent::ConnectFailed { attempt, error })
                if attempt == self.attempt =>
            {
                warn!(error = %error, category = error.category(), "connect attempt failed");
                *self.shared.last_error.lock() = Some(error.to_string());
                let _ = self.shared.events.emit_error(&error);
                self.enter_retry();
            }
            (_, MachineEvent::ConnectSucceeded { .. } | MachineEvent::ConnectFailed { .. }) => {
                debug!(state = ?state, "stale connect outcome ignored");
            }

            // -- stream notifications --
            //
            // The read loop starts inside the transport's connect call, so
            // frames and drop notifications can be queued ahead of the
            // `ConnectSucceeded` outcome; `connecting` therefore accepts
            // them exactly like `open`.
            (
                ConnectionState::Connecting | ConnectionState::Open,
                MachineEvent::FrameReceived(payload),
            ) => {
                {
                    let mut log = self.shared.messages.lock();
                    aggregator::merge(&mut log, &payload);
                }
                let _ = self.shared.events.emit_message(&payload);
            }
            (_, MachineEvent::FrameReceived(_)) => {
                debug!(state = ?state, "frame outside live connection dropped");
            }
            (
                ConnectionState::Connecting | ConnectionState::Open,
                MachineEvent::StreamFailed { message },
            ) => {
                let err = TransportError::Stream { message };
                *self.shared.last_error.lock() = Some(err.to_string());
                let _ = self.shared.events.emit_error(&err);
                self.enter_retry();
            }
            (_, MachineEvent::StreamFailed { message }) => {
                debug!(state = ?state, message, "stale stream error ignored");
            }
            (ConnectionState::Open, MachineEvent::StreamClosed) => {
                *self.shared.last_error.lock() = Some(TransportError::StreamEnded.to_string());
                let _ = self.shared.events.emit_close();
                self.enter_retry();
            }
            (
                ConnectionState::Connecting | ConnectionState::Retry | ConnectionState::Delaying,
                MachineEvent::StreamClosed,
            ) => {
                // the error notification already drove the transition
                let _ = self.shared.events.emit_close();
            }
            (_, MachineEvent::StreamClosed) => {
                debug!(state = ?state, "stale stream close ignored");
            }

            // -- retry timer --
            (ConnectionState::Delaying, MachineEvent::RetryTimerFired) => {
                self.retry_timer = None;
                self.enter_connecting(true);
            }
            (_, MachineEvent::RetryTimerFired) => {
                debug!(state = ?state, "stale retry timer ignored");
            }

            (_, MachineEvent::Shutdown) => unreachable!("handled by run()"),
        }
    }

    // -- state entry actions --

    fn enter_connecting(&mut self, reconnect: bool) {
        self.set_state(ConnectionState::Connecting);
        self.attempt += 1;
        let attempt = self.attempt;
        let transport = match self.ensure_transport() {
            Ok(t) => t,
            Err(error) => {
                // surfaces as a regular failed attempt on the next tick
                let _ = self.tx.send(MachineEvent::ConnectFailed { attempt, error });
                return;
            }
        };
        let tx = self.tx.clone();
        drop(tokio::spawn(async move {
            let event = match transport.connect(reconnect).await {
                Ok(()) => MachineEvent::ConnectSucceeded { attempt },
                Err(error) => MachineEvent::ConnectFailed { attempt, error },
            };
            let _ = tx.send(event);
        }));
    }

    fn enter_retry(&mut self) {
        self.set_state(ConnectionState::Retry);
        let retry_count = self.retry_count();
        if self.retry_config.should_retry(retry_count) {
            self.set_retry_count(retry_count + 1);
            metrics::counter!("sse_retries_total").increment(1);
            self.enter_delaying();
        } else {
            self.enter_failed();
        }
    }

    fn enter_delaying(&mut self) {
        self.set_state(ConnectionState::Delaying);
        self.cancel_retry_timer();
        let retry_count = self.retry_count();
        let delay_ms = self.retry_config.delay_ms(retry_count);
        debug!(retry_count, delay_ms, "reconnect scheduled");
        let tx = self.tx.clone();
        self.retry_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = tx.send(MachineEvent::RetryTimerFired);
        }));
    }

    fn enter_failed(&mut self) {
        self.cancel_retry_timer();
        self.detach_listeners();
        self.set_state(ConnectionState::Failed);
        warn!(
            retry_count = self.retry_count(),
            last_error = self.shared.last_error.lock().as_deref().unwrap_or(""),
            "retries exhausted; connection failed"
        );
    }

    fn shutdown(&mut self) {
        self.cancel_retry_timer();
        self.dispose_transport();
        self.set_state(ConnectionState::Idle);
        let _ = self.shared.events.emit_close();
        self.shared.events.clear();
        debug!("connection machine shut down");
    }

    // -- transport management --

    fn ensure_transport(&mut self) -> Result<Arc<dyn Transport>, TransportError> {
        if let Some(transport) = &self.transport {
            return Ok(Arc::clone(transport));
        }
        let transport = (self.factory)()?;
        self.attach_listeners(&transport);
        self.transport = Some(Arc::clone(&transport));
        Ok(transport)
    }

    fn attach_listeners(&mut self, transport: &Arc<dyn Transport>) {
        let message_id = {
            let tx = self.tx.clone();
            transport.events().on_message(move |payload| {
                let _ = tx.send(MachineEvent::FrameReceived(payload.clone()));
            })
        };
        let error_id = {
            let tx = self.tx.clone();
            transport.events().on_error(move |err| {
                let _ = tx.send(MachineEvent::StreamFailed {
                    message: err.to_string(),
                });
            })
        };
        let close_id = {
            let tx = self.tx.clone();
            transport.events().on_close(move || {
                let _ = tx.send(MachineEvent::StreamClosed);
            })
        };
        self.listener_ids = vec![message_id, error_id, close_id];
    }

    fn detach_listeners(&mut self) {
        if let Some(transport) = &self.transport {
            for id in self.listener_ids.drain(..) {
                let _ = transport.events().off(id);
            }
        } else {
            self.listener_ids.clear();
        }
    }

    fn dispose_transport(&mut self) {
        self.detach_listeners();
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
    }

    fn cancel_retry_timer(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }

    // -- context accessors --

    fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.shared.state.lock();
        if *state != next {
            debug!(from = ?*state, to = ?next, "state transition");
            *state = next;
        }
    }

    fn retry_count(&self) -> u32 {
        *self.shared.retry_count.lock()
    }

    fn set_retry_count(&self, value: u32) {
        *self.shared.retry_count.lock() = value;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
