//! Frame-to-message aggregation.
//!
//! Folds parsed wire frames into the ordered, append-only conversation
//! log. Streaming assistant replies arrive as `start`/`processing`/`end`
//! fragments and collapse into a single log entry; everything else is
//! appended whole. Unrecognized event tags leave the log untouched —
//! the merge is forward-compatible and never fails.

use serde_json::Value;
use tracing::{debug, warn};

use airvoice_core::events::{Message, MessageKind, ReplyFragment, ReplyState};
use airvoice_core::text::truncate_str;

use crate::wire::FramePayload;

/// Merge one frame payload into the message log.
pub fn merge(messages: &mut Vec<Message>, payload: &FramePayload) {
    let Some(tag) = payload.event.as_deref() else {
        debug!("frame without event tag ignored");
        return;
    };
    let Some(kind) = MessageKind::from_tag(tag) else {
        // heartbeats, status banners, future tags
        debug!(tag, "unrecognized event tag ignored");
        return;
    };

    match kind {
        MessageKind::AiMessage => merge_reply(messages, &payload.data),
        MessageKind::HumanMessage => messages.push(Message::human(payload.data.clone())),
        MessageKind::Journey => messages.push(Message::journey(parse_embedded(&payload.data))),
    }
}

/// Fold one streaming-reply fragment into the log.
fn merge_reply(messages: &mut Vec<Message>, data: &Value) {
    let fragment: ReplyFragment = match serde_json::from_value(data.clone()) {
        Ok(f) => f,
        Err(e) => {
            warn!(
                error = %e,
                data = truncate_str(&data.to_string(), 120),
                "malformed reply fragment dropped"
            );
            return;
        }
    };

    match fragment.state {
        ReplyState::Start => messages.push(Message::assistant(fragment.content)),
        ReplyState::Processing => match messages.last_mut() {
            Some(Message::AiMessage {
                content,
                finalized: false,
                ..
            }) => content.push_str(&fragment.content),
            // stream resumed mid-reply (e.g. after a reconnect): open a
            // fresh entry rather than dropping the fragment
            _ => messages.push(Message::assistant(fragment.content)),
        },
        ReplyState::End => {
            // content already delivered incrementally; the terminal
            // fragment only seals the entry
            if let Some(Message::AiMessage { finalized, .. }) = messages.last_mut() {
                *finalized = true;
            }
        }
    }
}

/// Journey payloads arrive as a JSON document encoded inside a string.
fn parse_embedded(data: &Value) -> Value {
    match data {
        Value::String(s) => match serde_json::from_str(s) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "journey payload is not valid embedded JSON");
                Value::String(s.clone())
            }
        },
        other => other.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(event: &str, data: Value) -> FramePayload {
        FramePayload {
            event: Some(event.into()),
            data,
        }
    }

    fn reply_content(message: &Message) -> (&str, bool) {
        match message {
            Message::AiMessage {
                content, finalized, ..
            } => (content.as_str(), *finalized),
            other => panic!("expected assistant reply, got {other:?}"),
        }
    }

    // ── streaming replies ────────────────────────────────────────────────

    #[test]
    fn start_then_processing_concatenates_single_entry() {
        let mut log = Vec::new();
        merge(&mut log, &frame("ai_message", json!({"state": "start", "content": "A"})));
        merge(&mut log, &frame("ai_message", json!({"state": "processing", "content": "B"})));

        assert_eq!(log.len(), 1);
        assert_eq!(reply_content(&log[0]), ("AB", false));
    }

    #[test]
    fn end_fragment_does_not_duplicate_content() {
        let mut log = Vec::new();
        merge(&mut log, &frame("ai_message", json!({"state": "start", "content": "A"})));
        merge(&mut log, &frame("ai_message", json!({"state": "processing", "content": "B"})));
        merge(&mut log, &frame("ai_message", json!({"state": "end", "content": "AB"})));

        assert_eq!(log.len(), 1);
        assert_eq!(reply_content(&log[0]), ("AB", true));
    }

    #[test]
    fn start_opens_new_entry_after_finalized_reply() {
        let mut log = Vec::new();
        merge(&mut log, &frame("ai_message", json!({"state": "start", "content": "one"})));
        merge(&mut log, &frame("ai_message", json!({"state": "end"})));
        merge(&mut log, &frame("ai_message", json!({"state": "start", "content": "two"})));

        assert_eq!(log.len(), 2);
        assert_eq!(reply_content(&log[1]), ("two", false));
    }

    #[test]
    fn processing_without_open_reply_starts_one() {
        let mut log = Vec::new();
        merge(&mut log, &frame("ai_message", json!({"state": "processing", "content": "tail"})));

        assert_eq!(log.len(), 1);
        assert_eq!(reply_content(&log[0]), ("tail", false));
    }

    #[test]
    fn end_without_open_reply_is_noop() {
        let mut log = Vec::new();
        merge(&mut log, &frame("ai_message", json!({"state": "end"})));
        assert!(log.is_empty());
    }

    #[test]
    fn malformed_fragment_dropped_without_panic() {
        let mut log = Vec::new();
        merge(&mut log, &frame("ai_message", json!({"state": "warp", "content": "x"})));
        merge(&mut log, &frame("ai_message", json!("not an object")));
        assert!(log.is_empty());
    }

    #[test]
    fn processing_does_not_extend_human_message() {
        let mut log = Vec::new();
        merge(&mut log, &frame("human_message", json!({"text": "hi"})));
        merge(&mut log, &frame("ai_message", json!({"state": "processing", "content": "late"})));

        assert_eq!(log.len(), 2);
        assert_eq!(reply_content(&log[1]), ("late", false));
    }

    // ── single-shot turns ────────────────────────────────────────────────

    #[test]
    fn human_message_appended_whole() {
        let mut log = Vec::new();
        merge(&mut log, &frame("human_message", json!({"text": "hi"})));

        assert_eq!(log.len(), 1);
        match &log[0] {
            Message::HumanMessage { data, .. } => assert_eq!(data, &json!({"text": "hi"})),
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    // ── journey payloads ─────────────────────────────────────────────────

    #[test]
    fn journey_embedded_json_is_parsed() {
        let mut log = Vec::new();
        let embedded = "{\"flightNumber\":\"CA1234\",\"gate\":\"A12\"}";
        merge(&mut log, &frame("journey", json!(embedded)));

        assert_eq!(log.len(), 1);
        match &log[0] {
            Message::Journey { data, .. } => {
                assert_eq!(data["flightNumber"], "CA1234");
                assert_eq!(data["gate"], "A12");
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn journey_bad_embedded_json_kept_as_string() {
        let mut log = Vec::new();
        merge(&mut log, &frame("journey", json!("{broken")));

        match &log[0] {
            Message::Journey { data, .. } => assert_eq!(data, &json!("{broken")),
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn journey_object_payload_stored_directly() {
        let mut log = Vec::new();
        merge(&mut log, &frame("journey", json!({"gate": "B8"})));

        match &log[0] {
            Message::Journey { data, .. } => assert_eq!(data["gate"], "B8"),
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    // ── pass-through ─────────────────────────────────────────────────────

    #[test]
    fn unrecognized_tags_leave_log_unchanged() {
        let mut log = Vec::new();
        merge(&mut log, &frame("heartbeat", json!({"timestamp": 1})));
        merge(&mut log, &frame("status", json!({"message": "connected"})));
        merge(
            &mut log,
            &FramePayload {
                event: None,
                data: json!({"orphan": true}),
            },
        );
        assert!(log.is_empty());
    }

    #[test]
    fn log_order_is_append_only() {
        let mut log = Vec::new();
        merge(&mut log, &frame("human_message", json!({"text": "hi"})));
        merge(&mut log, &frame("ai_message", json!({"state": "start", "content": "he"})));
        merge(&mut log, &frame("ai_message", json!({"state": "processing", "content": "llo"})));
        merge(&mut log, &frame("journey", json!("{\"seat\":\"12A\"}")));

        assert_eq!(log.len(), 3);
        assert_eq!(log[0].kind(), MessageKind::HumanMessage);
        assert_eq!(log[1].kind(), MessageKind::AiMessage);
        assert_eq!(log[2].kind(), MessageKind::Journey);
        assert_eq!(reply_content(&log[1]), ("hello", false));
    }
}
