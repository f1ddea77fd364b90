//! DummyBridge Core
//!
//! Domain types and the fault-injection engine of DummyBridge, a test
//! harness that impersonates a chat bridge so clients can be exercised
//! against delivery checkpoints and message send status records.
//!
//! The transport that feeds events in, and the HTTP implementations of the
//! collaborator traits, live in sibling crates.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod checkpoint;
pub mod engine;
pub mod errors;
pub mod event;
pub mod generate;
pub mod room;
pub mod rules;
pub mod status;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use checkpoint::{CheckpointRecord, CheckpointSink, CheckpointStatus, CheckpointStep};
pub use engine::{EngineConfig, EngineStats, EventOutcome, FaultInjectionEngine, OverrideSlot};
pub use errors::{BridgeError, BridgeResult};
pub use event::{EventKind, IncomingEvent};
pub use generate::{parse_generate_args, ContentGenerator, GenerateArgs, GeneratedContent};
pub use room::RoomClient;
pub use rules::{evaluate, CheckpointAction, Decision, MssAction, PendingOverride};
pub use status::{MessageStatus, StatusRecord};
