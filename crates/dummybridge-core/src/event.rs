//! Inbound Matrix events as seen by the fault-injection engine
//!
//! Only three event types carry text the engine inspects. Everything else
//! decodes to [`EventKind::Other`] so the caller can drop it without treating
//! it as a protocol fault.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{BridgeError, BridgeResult};

pub const EVENT_TYPE_MESSAGE: &str = "m.room.message";
pub const EVENT_TYPE_REDACTION: &str = "m.room.redaction";
pub const EVENT_TYPE_REACTION: &str = "m.reaction";

// ----------------------------------------------------------------------------
// Event Kinds
// ----------------------------------------------------------------------------

/// Type-specific payload of an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `m.room.message`
    Message {
        body: String,
        msgtype: Option<String>,
    },
    /// `m.room.redaction`
    Redaction {
        redacts: Option<String>,
        reason: Option<String>,
    },
    /// `m.reaction`
    Reaction {
        relates_to: Option<String>,
        key: String,
    },
    /// Any event type the engine does not act on
    Other { event_type: String },
}

// ----------------------------------------------------------------------------
// Incoming Event
// ----------------------------------------------------------------------------

/// A decoded room event delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEvent {
    pub room_id: String,
    pub event_id: String,
    pub sender: String,
    pub origin_server_ts: Option<u64>,
    pub kind: EventKind,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    room_id: String,
    event_id: String,
    sender: String,
    #[serde(default)]
    origin_server_ts: Option<u64>,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    redacts: Option<String>,
}

impl IncomingEvent {
    /// Build a text message event
    pub fn message(
        room_id: impl Into<String>,
        event_id: impl Into<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            event_id: event_id.into(),
            sender: sender.into(),
            origin_server_ts: None,
            kind: EventKind::Message {
                body: body.into(),
                msgtype: Some("m.text".to_string()),
            },
        }
    }

    /// Build a redaction event
    pub fn redaction(
        room_id: impl Into<String>,
        event_id: impl Into<String>,
        sender: impl Into<String>,
        redacts: Option<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            event_id: event_id.into(),
            sender: sender.into(),
            origin_server_ts: None,
            kind: EventKind::Redaction { redacts, reason },
        }
    }

    /// Build a reaction event
    pub fn reaction(
        room_id: impl Into<String>,
        event_id: impl Into<String>,
        sender: impl Into<String>,
        relates_to: Option<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            event_id: event_id.into(),
            sender: sender.into(),
            origin_server_ts: None,
            kind: EventKind::Reaction {
                relates_to,
                key: key.into(),
            },
        }
    }

    /// Decode a serialized Matrix event
    pub fn from_json(value: Value) -> BridgeResult<Self> {
        let raw: RawEvent = serde_json::from_value(value).map_err(|e| BridgeError::EventDecode {
            reason: e.to_string(),
        })?;

        let content_str = |pointer: &str| {
            raw.content
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let kind = match raw.event_type.as_str() {
            EVENT_TYPE_MESSAGE => EventKind::Message {
                body: content_str("/body").ok_or_else(|| BridgeError::EventDecode {
                    reason: format!("message {} has no text body", raw.event_id),
                })?,
                msgtype: content_str("/msgtype"),
            },
            EVENT_TYPE_REDACTION => EventKind::Redaction {
                redacts: raw.redacts.clone().or_else(|| content_str("/redacts")),
                reason: content_str("/reason"),
            },
            EVENT_TYPE_REACTION => EventKind::Reaction {
                relates_to: content_str("/m.relates_to/event_id"),
                key: content_str("/m.relates_to/key").ok_or_else(|| BridgeError::EventDecode {
                    reason: format!("reaction {} has no key", raw.event_id),
                })?,
            },
            other => EventKind::Other {
                event_type: other.to_string(),
            },
        };

        Ok(Self {
            room_id: raw.room_id,
            event_id: raw.event_id,
            sender: raw.sender,
            origin_server_ts: raw.origin_server_ts,
            kind,
        })
    }

    /// Matrix event type string
    pub fn event_type(&self) -> &str {
        match &self.kind {
            EventKind::Message { .. } => EVENT_TYPE_MESSAGE,
            EventKind::Redaction { .. } => EVENT_TYPE_REDACTION,
            EventKind::Reaction { .. } => EVENT_TYPE_REACTION,
            EventKind::Other { event_type } => event_type.as_str(),
        }
    }

    /// Text the rule table is evaluated against.
    ///
    /// Message body, redaction reason (empty when absent) or reaction key.
    /// `None` for event types the engine ignores.
    pub fn check_text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Message { body, .. } => Some(body),
            EventKind::Redaction { reason, .. } => Some(reason.as_deref().unwrap_or("")),
            EventKind::Reaction { key, .. } => Some(key),
            EventKind::Other { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_message() {
        let event = IncomingEvent::from_json(json!({
            "type": "m.room.message",
            "room_id": "!room:example.org",
            "event_id": "$abc",
            "sender": "@owner:example.org",
            "origin_server_ts": 1700000000000u64,
            "content": {"msgtype": "m.text", "body": "fail noretry"}
        }))
        .unwrap();

        assert_eq!(event.event_type(), EVENT_TYPE_MESSAGE);
        assert_eq!(event.check_text(), Some("fail noretry"));
        assert_eq!(event.origin_server_ts, Some(1700000000000));
    }

    #[test]
    fn test_decode_redaction_without_reason() {
        let event = IncomingEvent::from_json(json!({
            "type": "m.room.redaction",
            "room_id": "!room:example.org",
            "event_id": "$redact",
            "sender": "@owner:example.org",
            "redacts": "$target",
            "content": {}
        }))
        .unwrap();

        assert_eq!(
            event.kind,
            EventKind::Redaction {
                redacts: Some("$target".to_string()),
                reason: None
            }
        );
        assert_eq!(event.check_text(), Some(""));
    }

    #[test]
    fn test_decode_reaction_key() {
        let event = IncomingEvent::from_json(json!({
            "type": "m.reaction",
            "room_id": "!room:example.org",
            "event_id": "$react",
            "sender": "@owner:example.org",
            "content": {"m.relates_to": {"rel_type": "m.annotation", "event_id": "$target", "key": "🔥"}}
        }))
        .unwrap();

        assert_eq!(event.check_text(), Some("🔥"));
    }

    #[test]
    fn test_decode_other_type_has_no_check_text() {
        let event = IncomingEvent::from_json(json!({
            "type": "m.room.member",
            "room_id": "!room:example.org",
            "event_id": "$member",
            "sender": "@owner:example.org",
            "content": {"membership": "join"}
        }))
        .unwrap();

        assert_eq!(event.event_type(), "m.room.member");
        assert_eq!(event.check_text(), None);
    }

    #[test]
    fn test_decode_message_without_body_fails() {
        let result = IncomingEvent::from_json(json!({
            "type": "m.room.message",
            "room_id": "!room:example.org",
            "event_id": "$abc",
            "sender": "@owner:example.org",
            "content": {"msgtype": "m.text"}
        }));

        assert!(matches!(result, Err(BridgeError::EventDecode { .. })));
    }
}
