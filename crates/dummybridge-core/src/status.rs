//! Message send status records
//!
//! The final verdict for an event, sent back into the room as a
//! `com.beeper.message_send_status` event that references the original.

use serde::Serialize;

use crate::rules::MssAction;

/// Event type of status records
pub const STATUS_EVENT_TYPE: &str = "com.beeper.message_send_status";
/// Failure reason attached to every simulated failure
pub const FOREIGN_NETWORK_ERROR: &str = "m.foreign_network_error";
/// Error code for a failure matched directly in the event text
pub const DIRECT_FAIL_CODE: &str = "COM.BEEPER.DUMMY_FAIL";
/// Error code for a failure carried over from a previous `next` event
pub const OVERRIDE_FAIL_CODE: &str = "COM.BEEPER.DUMMY_FAIL_OVERRIDE";

/// Delivery verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Success,
    FailRetriable,
    FailPermanent,
}

/// Reference relation to the event a status is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub rel_type: &'static str,
    pub event_id: String,
}

impl Relation {
    pub fn reference(event_id: impl Into<String>) -> Self {
        Self {
            rel_type: "m.reference",
            event_id: event_id.into(),
        }
    }
}

/// Content of a message send status event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub network: String,
    #[serde(rename = "m.relates_to")]
    pub relates_to: Relation,
    pub status: MessageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_certain: Option<bool>,
}

/// Inputs that shape a status record beyond the action itself
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusFlags {
    pub no_retry: bool,
    pub not_certain: bool,
    /// The action came from a pending override rather than this event's text
    pub overridden: bool,
}

impl StatusRecord {
    /// Build the record for an event that finished with `action`
    pub fn build(
        network: &str,
        relates_to_event_id: &str,
        action: MssAction,
        flags: StatusFlags,
    ) -> Self {
        let mut record = Self {
            network: network.to_string(),
            relates_to: Relation::reference(relates_to_event_id),
            status: MessageStatus::Success,
            reason: None,
            error: None,
            message: None,
            is_certain: None,
        };

        if action != MssAction::Fail {
            return record;
        }

        record.status = if flags.no_retry {
            MessageStatus::FailPermanent
        } else {
            MessageStatus::FailRetriable
        };
        record.reason = Some(FOREIGN_NETWORK_ERROR.to_string());
        if flags.overridden {
            record.error = Some(OVERRIDE_FAIL_CODE.to_string());
            record.message = Some("'fail' was set by a previous 'next' message".to_string());
        } else {
            record.error = Some(DIRECT_FAIL_CODE.to_string());
            record.message = Some("'fail' was in the content body".to_string());
        }
        if flags.not_certain {
            record.is_certain = Some(false);
        }
        record
    }
}
