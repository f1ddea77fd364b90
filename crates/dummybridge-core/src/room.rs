//! Outbound room operations the engine needs

use async_trait::async_trait;

use crate::errors::BridgeResult;
use crate::status::StatusRecord;

/// Sends messages into rooms as the bridge bot.
///
/// Every method returns the event id the homeserver assigned.
#[async_trait]
pub trait RoomClient: Send + Sync {
    /// Plain `m.text` message
    async fn send_text(&self, room_id: &str, text: &str) -> BridgeResult<String>;

    /// `m.notice` message, optionally with an HTML formatted body
    async fn send_notice(&self, room_id: &str, text: &str, html: Option<&str>)
        -> BridgeResult<String>;

    /// Message send status event referencing the original event
    async fn send_status(&self, room_id: &str, status: &StatusRecord) -> BridgeResult<String>;
}
