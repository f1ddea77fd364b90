//! Error types for the DummyBridge core
//!
//! Only one error in this crate is recovered locally: a malformed `!generate`
//! argument list, which the engine reports in the room. Everything else is a
//! collaborator failure and propagates to the caller of `handle_event`.

use thiserror::Error;

/// Core error type shared by the engine and its collaborators
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Invalid argument: {argument}")]
    InvalidGenerateArgument { argument: String },

    #[error("Failed to decode event: {reason}")]
    EventDecode { reason: String },

    #[error("Room operation failed in {room_id}: {reason}")]
    Room { room_id: String, reason: String },

    #[error("Content generation failed: {0}")]
    Generation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Shorthand for a failed room operation
    pub fn room(room_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Room {
            room_id: room_id.into(),
            reason: reason.to_string(),
        }
    }
}

pub type BridgeResult<T> = core::result::Result<T, BridgeError>;
