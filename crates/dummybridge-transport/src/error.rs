//! Error types for the event transport
//!
//! Every variant except the configuration ones is a transport fault: the
//! connection is torn down and re-established after a backoff delay.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors raised while connecting to or talking over the websocket
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] tungstenite::http::header::InvalidHeaderValue),

    #[error("Failed to connect: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("Read failed: {0}")]
    Read(#[source] tungstenite::Error),

    #[error("Heartbeat failed: {0}")]
    Heartbeat(#[source] tungstenite::Error),

    #[error("Failed to send frame: {0}")]
    Send(#[source] tungstenite::Error),

    #[error("Connection closed: {reason}")]
    Closed { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;
