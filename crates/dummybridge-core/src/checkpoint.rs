//! Delivery checkpoints
//!
//! A checkpoint marks one stage of simulated delivery for one event. The
//! engine hands records to a [`CheckpointSink`] and never waits on delivery.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::event::IncomingEvent;

/// Stage of delivery a checkpoint reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointStep {
    Bridge,
    Decrypted,
    Remote,
}

/// Outcome reported by a checkpoint. The harness only ever reports success;
/// missing checkpoints are how it simulates loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointStatus {
    Success,
}

/// One checkpoint as posted to the checkpoint endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointRecord {
    pub event_id: String,
    pub room_id: String,
    pub step: CheckpointStep,
    pub status: CheckpointStatus,
    /// Unix time in milliseconds
    pub timestamp: u64,
    pub event_type: String,
    pub reported_by: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_num: Option<u32>,
}

impl CheckpointRecord {
    /// Successful checkpoint for `event` at `step`, stamped now
    pub fn success(event: &IncomingEvent, step: CheckpointStep) -> Self {
        Self {
            event_id: event.event_id.clone(),
            room_id: event.room_id.clone(),
            step,
            status: CheckpointStatus::Success,
            timestamp: unix_millis(),
            event_type: event.event_type().to_string(),
            reported_by: "BRIDGE",
            retry_num: None,
        }
    }
}

/// Destination for checkpoint records.
///
/// `submit` must return without waiting for delivery. Implementations own
/// their failure reporting; nothing is surfaced back to the engine.
pub trait CheckpointSink: Send + Sync {
    fn submit(&self, record: CheckpointRecord);
}

/// Current Unix time in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_wire_format() {
        let event = IncomingEvent::message("!room:example.org", "$abc", "@owner:example.org", "hi");
        let mut record = CheckpointRecord::success(&event, CheckpointStep::Decrypted);
        record.timestamp = 42;

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "event_id": "$abc",
                "room_id": "!room:example.org",
                "step": "DECRYPTED",
                "status": "SUCCESS",
                "timestamp": 42,
                "event_type": "m.room.message",
                "reported_by": "BRIDGE"
            })
        );
    }

    #[test]
    fn test_retry_num_serialized_when_present() {
        let event = IncomingEvent::message("!room:example.org", "$abc", "@owner:example.org", "hi");
        let mut record = CheckpointRecord::success(&event, CheckpointStep::Remote);
        record.retry_num = Some(2);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["retry_num"], json!(2));
        assert_eq!(value["step"], json!("REMOTE"));
    }
}
