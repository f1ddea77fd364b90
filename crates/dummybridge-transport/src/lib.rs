//! DummyBridge Transport
//!
//! Websocket connection to the homeserver's appservice sync endpoint, the
//! JSON frame envelope it speaks, and the router that hands decoded events
//! to an [`EventHandler`] such as the fault-injection engine.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod backoff;
pub mod error;
pub mod frame;
pub mod router;
pub mod websocket;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use backoff::{Backoff, BackoffConfig, ConnectionState};
pub use error::{TransportError, TransportResult};
pub use frame::{Frame, GlobalBridgeState};
pub use router::{EventHandler, EventRouter, RouterStats};
pub use websocket::{websocket_endpoint, Transport, TransportConfig, DEFAULT_SYNC_PATH};
