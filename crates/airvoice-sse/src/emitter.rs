//! Typed event handler registry.
//!
//! The consumer-facing surface of both the transport and the connection
//! state machine: `message`, `error`, and `close` notifications with an
//! on/off subscription API. The event kinds form a closed set — one typed
//! registration method per kind rather than a string-keyed map — so a typo
//! in an event name is a compile error, not a silent no-op.
//!
//! Multiple handlers per kind are supported; unregistration by
//! [`HandlerId`] is idempotent. `emit_*` never awaits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::wire::FramePayload;

/// Handler for `message` events.
pub type MessageHandler = Arc<dyn Fn(&FramePayload) + Send + Sync>;
/// Handler for `error` events.
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;
/// Handler for `close` events.
pub type CloseHandler = Arc<dyn Fn() + Send + Sync>;

/// Opaque token identifying one registered handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Registry of `message`/`error`/`close` handlers.
#[derive(Default)]
pub struct EventHandlers {
    next_id: AtomicU64,
    message: Mutex<Vec<(HandlerId, MessageHandler)>>,
    error: Mutex<Vec<(HandlerId, ErrorHandler)>>,
    close: Mutex<Vec<(HandlerId, CloseHandler)>>,
}

impl EventHandlers {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> HandlerId {
        HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a `message` handler. Returns a token for [`off`](Self::off).
    pub fn on_message<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&FramePayload) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.message.lock().push((id, Arc::new(handler)));
        id
    }

    /// Register an `error` handler.
    pub fn on_error<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.error.lock().push((id, Arc::new(handler)));
        id
    }

    /// Register a `close` handler.
    pub fn on_close<F>(&self, handler: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.close.lock().push((id, Arc::new(handler)));
        id
    }

    /// Unregister a handler by token. Idempotent: removing an unknown or
    /// already-removed token returns `false` and does nothing.
    pub fn off(&self, id: HandlerId) -> bool {
        fn remove<H>(list: &Mutex<Vec<(HandlerId, H)>>, id: HandlerId) -> bool {
            let mut guard = list.lock();
            match guard.iter().position(|(h, _)| *h == id) {
                Some(pos) => {
                    let _ = guard.remove(pos);
                    true
                }
                None => false,
            }
        }
        remove(&self.message, id) || remove(&self.error, id) || remove(&self.close, id)
    }

    /// Remove every registered handler.
    pub fn clear(&self) {
        self.message.lock().clear();
        self.error.lock().clear();
        self.close.lock().clear();
    }

    /// Notify all `message` handlers. Returns the number notified.
    ///
    /// Handlers are snapshotted before the calls, so a handler may
    /// register or unregister handlers (including itself) without
    /// deadlocking the registry.
    pub fn emit_message(&self, payload: &FramePayload) -> usize {
        let snapshot: Vec<MessageHandler> =
            self.message.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in &snapshot {
            handler(payload);
        }
        snapshot.len()
    }

    /// Notify all `error` handlers. Returns the number notified.
    pub fn emit_error(&self, error: &TransportError) -> usize {
        let snapshot: Vec<ErrorHandler> =
            self.error.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in &snapshot {
            handler(error);
        }
        snapshot.len()
    }

    /// Notify all `close` handlers. Returns the number notified.
    pub fn emit_close(&self) -> usize {
        let snapshot: Vec<CloseHandler> =
            self.close.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in &snapshot {
            handler();
        }
        snapshot.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    fn payload() -> FramePayload {
        FramePayload {
            event: Some("human_message".into()),
            data: json!({"text": "hi"}),
        }
    }

    #[test]
    fn emit_with_no_handlers() {
        let handlers = EventHandlers::new();
        assert_eq!(handlers.emit_message(&payload()), 0);
        assert_eq!(handlers.emit_close(), 0);
    }

    #[test]
    fn multiple_handlers_all_notified() {
        let handlers = EventHandlers::new();
        let count = Arc::new(AtomicU32::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            let _ = handlers.on_message(move |_| {
                let _ = count.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(handlers.emit_message(&payload()), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn off_removes_only_target() {
        let handlers = EventHandlers::new();
        let count = Arc::new(AtomicU32::new(0));
        let keep = {
            let count = Arc::clone(&count);
            handlers.on_close(move || {
                let _ = count.fetch_add(1, Ordering::SeqCst);
            })
        };
        let remove = handlers.on_close(|| {});

        assert!(handlers.off(remove));
        assert_eq!(handlers.emit_close(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(handlers.off(keep));
    }

    #[test]
    fn off_is_idempotent() {
        let handlers = EventHandlers::new();
        let id = handlers.on_error(|_| {});
        assert!(handlers.off(id));
        assert!(!handlers.off(id));
        assert!(!handlers.off(id));
    }

    #[test]
    fn clear_removes_everything() {
        let handlers = EventHandlers::new();
        let _ = handlers.on_message(|_| {});
        let _ = handlers.on_error(|_| {});
        let _ = handlers.on_close(|| {});
        handlers.clear();
        assert_eq!(handlers.emit_message(&payload()), 0);
        assert_eq!(handlers.emit_error(&TransportError::StreamEnded), 0);
        assert_eq!(handlers.emit_close(), 0);
    }

    #[test]
    fn handler_receives_payload() {
        let handlers = EventHandlers::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_in = Arc::clone(&seen);
        let _ = handlers.on_message(move |p| {
            *seen_in.lock() = Some(p.clone());
        });
        let _ = handlers.emit_message(&payload());
        assert_eq!(seen.lock().as_ref().unwrap().event.as_deref(), Some("human_message"));
    }
}
