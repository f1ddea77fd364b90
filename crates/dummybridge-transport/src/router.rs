//! Frame routing
//!
//! Turns decoded websocket frames into handler calls and reply frames.
//! Events inside one transaction are delivered one at a time and in order;
//! the next event is not decoded until the handler returns.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, warn};

use dummybridge_core::{BridgeResult, FaultInjectionEngine, IncomingEvent};

use crate::frame::{Frame, GlobalBridgeState, COMMAND_PING, COMMAND_TRANSACTION, UNKNOWN_COMMAND};

// ----------------------------------------------------------------------------
// Event Handler
// ----------------------------------------------------------------------------

/// Consumer of decoded events
#[async_trait]
pub trait EventHandler: Send {
    async fn on_event(&mut self, event: IncomingEvent) -> BridgeResult<()>;
}

#[async_trait]
impl EventHandler for FaultInjectionEngine {
    async fn on_event(&mut self, event: IncomingEvent) -> BridgeResult<()> {
        let outcome = self.handle_event(&event).await?;
        debug!(event_id = %event.event_id, ?outcome, "Event handled");
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Event Router
// ----------------------------------------------------------------------------

/// Counters for frames seen by the router
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub transactions: u64,
    pub events_delivered: u64,
    pub events_skipped: u64,
    pub handler_errors: u64,
    pub pings: u64,
    pub unknown_commands: u64,
    pub malformed_frames: u64,
}

/// Dispatches frames by command
pub struct EventRouter<H> {
    handler: H,
    stats: RouterStats,
}

impl<H: EventHandler> EventRouter<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            stats: RouterStats::default(),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Handle one text message; returns the reply to send, if any.
    ///
    /// Frames that fail to decode are logged and dropped.
    pub async fn on_text(&mut self, text: &str) -> Option<Frame> {
        match Frame::decode(text) {
            Ok(frame) => self.on_frame(frame).await,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                self.stats.malformed_frames += 1;
                None
            }
        }
    }

    /// Handle one decoded frame; returns the reply to send, if any
    pub async fn on_frame(&mut self, frame: Frame) -> Option<Frame> {
        match frame.command.as_str() {
            COMMAND_TRANSACTION => {
                self.deliver_transaction(&frame).await;
                None
            }
            COMMAND_PING => {
                self.stats.pings += 1;
                let state = serde_json::to_value(GlobalBridgeState::unconfigured())
                    .unwrap_or_else(|_| json!({}));
                Some(Frame::response(
                    frame.id,
                    json!({
                        "state": state,
                        "echo": frame.data,
                    }),
                ))
            }
            other => {
                warn!(command = %other, "Unknown command");
                self.stats.unknown_commands += 1;
                let message = format!("Unknown command {other}");
                Some(Frame::error(frame.id, UNKNOWN_COMMAND, message))
            }
        }
    }

    async fn deliver_transaction(&mut self, frame: &Frame) {
        self.stats.transactions += 1;
        let events = frame.transaction_events();
        debug!(id = ?frame.id, count = events.len(), "Delivering transaction");

        for raw in events {
            let event = match IncomingEvent::from_json(raw) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable event");
                    self.stats.events_skipped += 1;
                    continue;
                }
            };

            let event_id = event.event_id.clone();
            match self.handler.on_event(event).await {
                Ok(()) => self.stats.events_delivered += 1,
                Err(e) => {
                    error!(event_id = %event_id, error = %e, "Event handler failed");
                    self.stats.handler_errors += 1;
                }
            }
        }
    }
}
