//! Fault-injection engine
//!
//! Turns each inbound event into a synthetic delivery outcome: a series of
//! checkpoints followed by a message send status record, any of which may be
//! suppressed, delayed or failed depending on the event text.
//!
//! # Single consumer
//!
//! The engine holds exactly one pending-override slot. Handling an event
//! reads the slot, clears it and may set it again, with no locking. This is
//! only sound because events for one bridge session are handled strictly one
//! after another: `handle_event` takes `&mut self`, and the transport awaits
//! each call before starting the next. Do not share one engine between
//! concurrently running tasks.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointRecord, CheckpointSink, CheckpointStep};
use crate::errors::{BridgeError, BridgeResult};
use crate::event::IncomingEvent;
use crate::generate::{parse_generate_args, ContentGenerator, GENERATE_PREFIX};
use crate::room::RoomClient;
use crate::rules::{self, CheckpointAction, MssAction, PendingOverride};
use crate::status::{MessageStatus, StatusFlags, StatusRecord};

/// Help text sent in response to `!help`, plain body
pub const HELP_TEXT: &str = "\
!help: show this help text
!generate: generate messages, e.g. `!generate messages=10 users=5`

Every other message gets a com.beeper.message_send_status event.
nostatus / ❌: send no status
latestatus / ⏲️: send the status late
fail / 🔥: send a failure (add noretry for a permanent failure, notcertain for an uncertain one)
nobridge / 🌉, nodecrypted / 🔐, noremote / 🤷: skip checkpoints from that step onwards
next: apply this message's actions to the next message instead";

/// Help text sent in response to `!help`, HTML body
pub const HELP_HTML: &str = "\
<ul>
<li>!help: show this help text!</li>
<li>!generate: generate messages<br>
The !generate command takes arguments in the form key=value, here are some examples:
<ul>
<li><code>!generate messages=10</code> &mdash; Generate 10 messages (sent from all current users at random)</li>
<li><code>!generate messages=10 users=5</code> &mdash; Generate 10 messages from 5 users (2 messages/user)</li>
</ul>
</li>
</ul>
<hr>
All other messages will be responded to with a <code>com.beeper.message_send_status</code> event.<br>
To prevent a status event from being sent for a given message, include the text \"nostatus\" (or ❌).<br>
To make the bridge send the status late, include the text \"latestatus\" (or ⏲️).<br>
If the message contains the text \"fail\" (or 🔥) the status will be a failure. Adding \"noretry\" makes the
failure permanent, adding \"notcertain\" marks it as uncertain.<br>
Include \"nobridge\" (🌉), \"nodecrypted\" (🔐) or \"noremote\" (🤷) to drop checkpoints from that step onwards.<br>
Include \"next\" to apply the actions of a message to the following message instead; add \"success\" to
schedule a plain successful status.";

// ----------------------------------------------------------------------------
// Configuration and Statistics
// ----------------------------------------------------------------------------

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Only events from this user are acted on
    pub owner: String,
    /// Network name put into status records
    pub network: String,
    /// How long `latestatus` holds back the status
    pub late_status_delay: Duration,
}

impl EngineConfig {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            network: "dummybridge".to_string(),
            late_status_delay: Duration::from_secs(15),
        }
    }
}

/// Running counters, logged on shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub handled: u64,
    pub ignored: u64,
    pub deferred: u64,
    pub overridden: u64,
    pub statuses_sent: u64,
    pub checkpoints_submitted: u64,
}

/// What happened to one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not from the owner, or not a message/redaction/reaction
    Ignored,
    /// `!generate` arguments could not be parsed; reported in the room
    InvalidGenerateArguments,
    /// `nostatus` took effect; no remote checkpoint, no status
    StatusSuppressed,
    /// A status record was sent
    StatusSent(MessageStatus),
}

// ----------------------------------------------------------------------------
// Override Slot
// ----------------------------------------------------------------------------

/// The single pending-override slot of one bridge session
#[derive(Debug, Default)]
pub struct OverrideSlot {
    pending: Option<PendingOverride>,
}

impl OverrideSlot {
    /// Take the pending override, leaving the slot empty
    pub fn take(&mut self) -> Option<PendingOverride> {
        self.pending.take()
    }

    /// Replace whatever is pending
    pub fn set(&mut self, pending: PendingOverride) {
        self.pending = Some(pending);
    }

    pub fn peek(&self) -> Option<&PendingOverride> {
        self.pending.as_ref()
    }
}

// ----------------------------------------------------------------------------
// Engine
// ----------------------------------------------------------------------------

/// Deterministic fault-injection state machine for one bridge session
pub struct FaultInjectionEngine {
    config: EngineConfig,
    room: Arc<dyn RoomClient>,
    checkpoints: Arc<dyn CheckpointSink>,
    generator: Arc<dyn ContentGenerator>,
    overrides: OverrideSlot,
    stats: EngineStats,
}

impl FaultInjectionEngine {
    pub fn new(
        config: EngineConfig,
        room: Arc<dyn RoomClient>,
        checkpoints: Arc<dyn CheckpointSink>,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        Self {
            config,
            room,
            checkpoints,
            generator,
            overrides: OverrideSlot::default(),
            stats: EngineStats::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Override that will be applied to the next handled event
    pub fn pending_override(&self) -> Option<&PendingOverride> {
        self.overrides.peek()
    }

    /// Handle one event to completion.
    ///
    /// Collaborator failures propagate; only malformed `!generate` arguments
    /// are handled here.
    pub async fn handle_event(&mut self, event: &IncomingEvent) -> BridgeResult<EventOutcome> {
        if event.sender != self.config.owner {
            debug!(event_id = %event.event_id, sender = %event.sender, "Ignoring event from non-owner");
            self.stats.ignored += 1;
            return Ok(EventOutcome::Ignored);
        }
        let Some(text) = event.check_text() else {
            debug!(event_id = %event.event_id, event_type = %event.event_type(), "Ignoring event type");
            self.stats.ignored += 1;
            return Ok(EventOutcome::Ignored);
        };
        self.stats.handled += 1;

        let decision = rules::evaluate(text);
        let checkpoint_action = decision.checkpoint;
        let mut action = decision.mss;

        self.emit_checkpoint(event, CheckpointStep::Bridge, checkpoint_action);
        self.emit_checkpoint(event, CheckpointStep::Decrypted, checkpoint_action);

        let mut overridden = false;
        if let Some(pending) = self.overrides.take() {
            debug!(event_id = %event.event_id, pending = %pending, "Applying pending override");
            action = pending.mss;
            overridden = true;
            self.stats.overridden += 1;
        }

        if let Some(next) = rules::deferred_override(text) {
            self.overrides.set(next);
            self.stats.deferred += 1;
            self.room
                .send_notice(
                    &event.room_id,
                    &format!("Next message will have action: {next}"),
                    None,
                )
                .await?;
            action = MssAction::Success;
        }

        debug!(
            event_id = %event.event_id,
            action = %action,
            checkpoint = %checkpoint_action,
            overridden,
            "Evaluated event"
        );

        match action {
            MssAction::Generate => {
                let arg_text = text.strip_prefix(GENERATE_PREFIX).unwrap_or(text);
                let args = match parse_generate_args(arg_text) {
                    Ok(args) => args,
                    Err(BridgeError::InvalidGenerateArgument { argument }) => {
                        warn!(event_id = %event.event_id, %argument, "Invalid generate argument");
                        self.room
                            .send_text(
                                &event.room_id,
                                &format!(
                                    "Invalid arguments to generate. Type '!help' for usage. Invalid argument: {argument}"
                                ),
                            )
                            .await?;
                        return Ok(EventOutcome::InvalidGenerateArguments);
                    }
                    Err(e) => return Err(e),
                };
                let generated = self.generator.generate_content(&event.room_id, args).await?;
                info!(
                    room_id = %generated.room_id,
                    users = generated.user_ids.len(),
                    events = generated.event_ids.len(),
                    "Generated content"
                );
            }
            MssAction::Help => {
                self.room
                    .send_notice(&event.room_id, HELP_TEXT, Some(HELP_HTML))
                    .await?;
            }
            MssAction::NoStatus => {
                debug!(event_id = %event.event_id, "Suppressing status");
                return Ok(EventOutcome::StatusSuppressed);
            }
            MssAction::Late => {
                debug!(event_id = %event.event_id, delay = ?self.config.late_status_delay, "Delaying status");
                tokio::time::sleep(self.config.late_status_delay).await;
            }
            MssAction::Success | MssAction::Fail => {}
        }

        self.emit_checkpoint(event, CheckpointStep::Remote, checkpoint_action);

        let status = StatusRecord::build(
            &self.config.network,
            &event.event_id,
            action,
            StatusFlags {
                no_retry: decision.no_retry,
                not_certain: decision.not_certain,
                overridden,
            },
        );
        if action == MssAction::Fail {
            debug!(event_id = %event.event_id, status = ?status.status, "Sending simulated failure");
        }
        self.room.send_status(&event.room_id, &status).await?;
        self.stats.statuses_sent += 1;

        Ok(EventOutcome::StatusSent(status.status))
    }

    fn emit_checkpoint(&mut self, event: &IncomingEvent, step: CheckpointStep, action: CheckpointAction) {
        if !action.allows(step) {
            return;
        }
        self.checkpoints.submit(CheckpointRecord::success(event, step));
        self.stats.checkpoints_submitted += 1;
    }
}

impl Drop for FaultInjectionEngine {
    fn drop(&mut self) {
        info!(
            handled = self.stats.handled,
            ignored = self.stats.ignored,
            deferred = self.stats.deferred,
            overridden = self.stats.overridden,
            statuses = self.stats.statuses_sent,
            checkpoints = self.stats.checkpoints_submitted,
            "Fault injection engine stopped"
        );
    }
}
