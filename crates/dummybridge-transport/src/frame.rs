//! JSON frame envelope spoken over the websocket

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use dummybridge_core::checkpoint::unix_millis;

pub const COMMAND_TRANSACTION: &str = "transaction";
pub const COMMAND_PING: &str = "ping";
pub const COMMAND_RESPONSE: &str = "response";
pub const COMMAND_ERROR: &str = "error";

/// Error code sent back for commands the bridge does not implement
pub const UNKNOWN_COMMAND: &str = "UNKNOWN_COMMAND";

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One unit of the websocket protocol: `{id, command, data}`.
///
/// The id is echoed back with its original JSON type. Fields outside the
/// envelope are preserved so older top-level `events` arrays can be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Frame {
    /// Decode a text message
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Encode for sending
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Successful response to the frame with `id`
    pub fn response(id: Option<Value>, data: Value) -> Self {
        Self {
            id,
            command: COMMAND_RESPONSE.to_string(),
            data,
            extra: Map::new(),
        }
    }

    /// Error response to the frame with `id`
    pub fn error(id: Option<Value>, code: &str, message: impl Into<String>) -> Self {
        Self {
            id,
            command: COMMAND_ERROR.to_string(),
            data: json!({
                "code": code,
                "message": message.into(),
            }),
            extra: Map::new(),
        }
    }

    /// Serialized events carried by a `transaction` frame, in order.
    ///
    /// Read from `data.events`, falling back to a top-level `events` array.
    pub fn transaction_events(&self) -> Vec<Value> {
        let events = self
            .data
            .get("events")
            .or_else(|| self.extra.get("events"));
        match events {
            Some(Value::Array(events)) => events.clone(),
            _ => Vec::new(),
        }
    }
}

// ----------------------------------------------------------------------------
// Bridge State
// ----------------------------------------------------------------------------

/// State of the bridge itself, reported in ping responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeState {
    pub state_event: &'static str,
    /// Unix time in seconds
    pub timestamp: u64,
    pub ttl: u64,
}

/// Bridge state plus per-login remote states
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalBridgeState {
    #[serde(rename = "remoteState")]
    pub remote_state: Map<String, Value>,
    #[serde(rename = "bridgeState")]
    pub bridge_state: BridgeState,
}

impl GlobalBridgeState {
    /// The harness never logs in anywhere, so it always reports unconfigured
    pub fn unconfigured() -> Self {
        Self {
            remote_state: Map::new(),
            bridge_state: BridgeState {
                state_event: "UNCONFIGURED",
                timestamp: unix_millis() / 1000,
                ttl: 3600,
            },
        }
    }
}
