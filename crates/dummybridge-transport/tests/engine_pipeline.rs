//! Frames routed into the real fault-injection engine
//!
//! Checks that transaction ordering and the one-shot override survive the
//! trip from raw frame text to status records.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use dummybridge_core::status::OVERRIDE_FAIL_CODE;
use dummybridge_core::{
    BridgeError, BridgeResult, CheckpointRecord, CheckpointSink, CheckpointStep, ContentGenerator,
    EngineConfig, FaultInjectionEngine, GenerateArgs, GeneratedContent, MessageStatus, RoomClient,
    StatusRecord,
};
use dummybridge_transport::EventRouter;

const OWNER: &str = "@owner:example.org";
const ROOM: &str = "!room:example.org";

#[derive(Default)]
struct Room {
    notices: Mutex<Vec<String>>,
    statuses: Mutex<Vec<StatusRecord>>,
}

#[async_trait]
impl RoomClient for Room {
    async fn send_text(&self, _room_id: &str, _text: &str) -> BridgeResult<String> {
        Ok("$text".to_string())
    }

    async fn send_notice(
        &self,
        _room_id: &str,
        text: &str,
        _html: Option<&str>,
    ) -> BridgeResult<String> {
        self.notices.lock().unwrap().push(text.to_string());
        Ok("$notice".to_string())
    }

    async fn send_status(&self, _room_id: &str, status: &StatusRecord) -> BridgeResult<String> {
        self.statuses.lock().unwrap().push(status.clone());
        Ok("$status".to_string())
    }
}

#[derive(Default)]
struct Sink {
    records: Mutex<Vec<CheckpointRecord>>,
}

impl CheckpointSink for Sink {
    fn submit(&self, record: CheckpointRecord) {
        self.records.lock().unwrap().push(record);
    }
}

struct NoGenerator;

#[async_trait]
impl ContentGenerator for NoGenerator {
    async fn generate_content(
        &self,
        _room_id: &str,
        _args: GenerateArgs,
    ) -> BridgeResult<GeneratedContent> {
        Err(BridgeError::Generation("not available".to_string()))
    }
}

fn message(event_id: &str, sender: &str, body: &str) -> Value {
    json!({
        "type": "m.room.message",
        "room_id": ROOM,
        "event_id": event_id,
        "sender": sender,
        "content": {"msgtype": "m.text", "body": body}
    })
}

fn setup() -> (EventRouter<FaultInjectionEngine>, Arc<Room>, Arc<Sink>) {
    let room = Arc::new(Room::default());
    let sink = Arc::new(Sink::default());
    let engine = FaultInjectionEngine::new(
        EngineConfig::new(OWNER),
        room.clone(),
        sink.clone(),
        Arc::new(NoGenerator),
    );
    (EventRouter::new(engine), room, sink)
}

#[tokio::test]
async fn test_override_applies_to_next_event_in_same_transaction() {
    let (mut router, room, _sink) = setup();
    let frame = json!({
        "id": 1,
        "command": "transaction",
        "data": {"events": [
            message("$announce", OWNER, "next fail noretry"),
            message("$stranger", "@other:example.org", "hello"),
            message("$victim", OWNER, "hello"),
            message("$after", OWNER, "hello"),
        ]}
    });

    assert!(router.on_text(&frame.to_string()).await.is_none());

    let statuses = room.statuses.lock().unwrap().clone();
    let summary: Vec<(&str, MessageStatus)> = statuses
        .iter()
        .map(|s| (s.relates_to.event_id.as_str(), s.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("$announce", MessageStatus::Success),
            ("$victim", MessageStatus::FailRetriable),
            ("$after", MessageStatus::Success),
        ]
    );
    assert_eq!(statuses[1].error.as_deref(), Some(OVERRIDE_FAIL_CODE));

    let notices = room.notices.lock().unwrap().clone();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].starts_with("Next message will have action: fail"));
}

#[tokio::test]
async fn test_generator_failure_does_not_stop_later_events() {
    let (mut router, room, sink) = setup();
    let frame = json!({
        "command": "transaction",
        "events": [
            message("$gen", OWNER, "!generate messages=2"),
            message("$plain", OWNER, "nobridge"),
        ]
    });

    router.on_text(&frame.to_string()).await;

    assert_eq!(router.stats().handler_errors, 1);
    assert_eq!(router.stats().events_delivered, 1);

    let statuses = room.statuses.lock().unwrap().clone();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].relates_to.event_id, "$plain");

    let plain_steps: Vec<CheckpointStep> = sink
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r.event_id == "$plain")
        .map(|r| r.step)
        .collect();
    assert_eq!(plain_steps, vec![CheckpointStep::Remote]);
}
