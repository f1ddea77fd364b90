//! Websocket transport
//!
//! Holds one long-lived connection to the homeserver's appservice sync
//! endpoint. Each session runs a read loop and a heartbeat loop side by
//! side; whichever fails first ends the session, and the transport waits
//! out the backoff delay before connecting again. Only shutdown stops it.

use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::backoff::{Backoff, BackoffConfig, ConnectionState};
use crate::error::{TransportError, TransportResult};
use crate::frame::Frame;
use crate::router::{EventHandler, EventRouter};

/// Appservice websocket path on the homeserver
pub const DEFAULT_SYNC_PATH: &str = "/_matrix/client/unstable/fi.mau.as_sync";

/// Protocol revision announced during the handshake
pub const WEBSOCKET_VERSION: &str = "3";

const PROCESS_ID_HEADER: &str = "x-mautrix-process-id";
const WEBSOCKET_VERSION_HEADER: &str = "x-mautrix-websocket-version";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Connection settings for the transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Fully resolved `ws://` or `wss://` endpoint
    pub endpoint: Url,
    /// Appservice token sent as a bearer credential
    pub as_token: String,
    /// Value of the process id header
    pub process_id: String,
    /// Gap between websocket pings
    pub heartbeat_interval: Duration,
    pub backoff: BackoffConfig,
}

impl TransportConfig {
    /// Build a config from the homeserver base URL and the sync path.
    ///
    /// `http` and `https` schemes are rewritten to `ws` and `wss`.
    pub fn new(
        homeserver: &str,
        path: &str,
        as_token: impl Into<String>,
        process_id: impl Into<String>,
    ) -> TransportResult<Self> {
        Ok(Self {
            endpoint: websocket_endpoint(homeserver, path)?,
            as_token: as_token.into(),
            process_id: process_id.into(),
            heartbeat_interval: Duration::from_secs(5),
            backoff: BackoffConfig::default(),
        })
    }

    /// Handshake request with authentication and protocol headers
    pub fn client_request(&self) -> TransportResult<Request> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(TransportError::Connect)?;

        let headers = request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.as_token))?,
        );
        headers.insert(PROCESS_ID_HEADER, HeaderValue::from_str(&self.process_id)?);
        headers.insert(
            WEBSOCKET_VERSION_HEADER,
            HeaderValue::from_static(WEBSOCKET_VERSION),
        );

        Ok(request)
    }
}

/// Resolve the websocket URL for a homeserver base URL
pub fn websocket_endpoint(homeserver: &str, path: &str) -> TransportResult<Url> {
    let invalid = |reason: String| TransportError::InvalidEndpoint {
        url: homeserver.to_string(),
        reason,
    };

    let mut url = Url::parse(homeserver).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid(format!("cannot switch to {scheme}")))?;
    url.set_path(path);
    Ok(url)
}

// ----------------------------------------------------------------------------
// Transport
// ----------------------------------------------------------------------------

/// Reconnecting websocket client feeding an [`EventRouter`]
pub struct Transport {
    config: TransportConfig,
    backoff: Backoff,
    state: ConnectionState,
    sessions: u64,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        let backoff = Backoff::new(config.backoff.clone());
        Self {
            config,
            backoff,
            state: ConnectionState::Disconnected,
            sessions: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of sessions that completed the handshake
    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    /// Connect, serve and reconnect until `shutdown` flips to `true`
    pub async fn run<H: EventHandler>(
        &mut self,
        router: &mut EventRouter<H>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(endpoint = %self.config.endpoint, "Starting websocket transport");

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            let result = tokio::select! {
                result = self.run_session(router) => result,
                _ = wait_for_shutdown(&mut shutdown) => break,
            };

            self.state = ConnectionState::Disconnected;
            let delay = self.backoff.next_delay();
            match result {
                Ok(()) => warn!(delay_ms = delay.as_millis() as u64, "Websocket session ended"),
                Err(e) => error!(
                    error = %e,
                    failures = self.backoff.failures(),
                    delay_ms = delay.as_millis() as u64,
                    "Websocket transport failed, reconnecting"
                ),
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        self.state = ConnectionState::Disconnected;
        info!(sessions = self.sessions, "Websocket transport stopped");
    }

    async fn run_session<H: EventHandler>(
        &mut self,
        router: &mut EventRouter<H>,
    ) -> TransportResult<()> {
        self.state = ConnectionState::Connecting;
        let request = self.config.client_request()?;
        let (stream, _response) = connect_async(request)
            .await
            .map_err(TransportError::Connect)?;

        self.state = ConnectionState::Connected;
        self.sessions += 1;
        self.backoff.reset();
        info!(endpoint = %self.config.endpoint, session = self.sessions, "Websocket connected");

        let (sink, source) = stream.split();
        let sink = Mutex::new(sink);

        tokio::select! {
            result = read_loop(source, &sink, router) => result,
            result = heartbeat_loop(&sink, self.config.heartbeat_interval) => result,
        }
    }
}

// ----------------------------------------------------------------------------
// Session Loops
// ----------------------------------------------------------------------------

async fn read_loop<H: EventHandler>(
    mut source: WsSource,
    sink: &Mutex<WsSink>,
    router: &mut EventRouter<H>,
) -> TransportResult<()> {
    while let Some(message) = source.next().await {
        let text = match message.map_err(TransportError::Read)? {
            Message::Text(text) => text,
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    warn!("Dropping non-UTF-8 binary frame");
                    continue;
                }
            },
            Message::Ping(_) | Message::Pong(_) => {
                trace!("Websocket control frame");
                continue;
            }
            Message::Close(frame) => {
                let reason = frame
                    .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                    .unwrap_or_else(|| "no close frame".to_string());
                return Err(TransportError::Closed { reason });
            }
            Message::Frame(_) => continue,
        };

        if let Some(reply) = router.on_text(&text).await {
            send_frame(sink, &reply).await?;
        }
    }

    Err(TransportError::Closed {
        reason: "stream ended".to_string(),
    })
}

async fn heartbeat_loop(sink: &Mutex<WsSink>, period: Duration) -> TransportResult<()> {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sink.lock()
            .await
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(TransportError::Heartbeat)?;
        trace!("Heartbeat sent");
    }
}

async fn send_frame(sink: &Mutex<WsSink>, frame: &Frame) -> TransportResult<()> {
    let text = frame.encode()?;
    debug!(command = %frame.command, id = ?frame.id, "Sending frame");
    sink.lock()
        .await
        .send(Message::Text(text))
        .await
        .map_err(TransportError::Send)
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stopping = *shutdown.borrow_and_update();
        if stopping {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Sender dropped without signalling; keep running
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_rewrites_http_schemes() {
        let url = tokio_test::assert_ok!(websocket_endpoint("http://localhost:8008", DEFAULT_SYNC_PATH));
        assert_eq!(
            url.as_str(),
            "ws://localhost:8008/_matrix/client/unstable/fi.mau.as_sync"
        );

        let url = websocket_endpoint("https://matrix.example.org/", DEFAULT_SYNC_PATH).unwrap();
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn test_endpoint_rejects_other_schemes() {
        let err = websocket_endpoint("ftp://example.org", DEFAULT_SYNC_PATH).unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint { .. }));
        assert!(websocket_endpoint("not a url", DEFAULT_SYNC_PATH).is_err());
    }

    #[test]
    fn test_client_request_headers() {
        let config = TransportConfig::new(
            "http://localhost:8008",
            DEFAULT_SYNC_PATH,
            "secret",
            "DummyBridge",
        )
        .unwrap();
        let request = config.client_request().unwrap();
        let headers = request.headers();

        assert_eq!(headers[AUTHORIZATION], "Bearer secret");
        assert_eq!(headers[PROCESS_ID_HEADER], "DummyBridge");
        assert_eq!(headers[WEBSOCKET_VERSION_HEADER], "3");
    }

    #[test]
    fn test_new_transport_is_disconnected() {
        let config =
            TransportConfig::new("http://localhost:1", DEFAULT_SYNC_PATH, "t", "p").unwrap();
        let transport = Transport::new(config);
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert_eq!(transport.sessions(), 0);
    }
}
