//! Matrix client-server API access as the appservice bot

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};
use url::Url;
use uuid::Uuid;

use dummybridge_core::status::STATUS_EVENT_TYPE;
use dummybridge_core::{BridgeError, BridgeResult, RoomClient, StatusRecord};

use crate::error::{CliError, Result};

const CLIENT_API: [&str; 3] = ["_matrix", "client", "v3"];
const HTML_FORMAT: &str = "org.matrix.custom.html";
const USER_IN_USE: &str = "M_USER_IN_USE";

#[derive(Debug, Deserialize)]
struct EventIdResponse {
    event_id: String,
}

/// Appservice-authenticated Matrix client.
///
/// Requests go out as the bridge bot unless a ghost user is named, in which
/// case the appservice masquerades via the `user_id` query parameter.
pub struct MatrixClient {
    http: Client,
    homeserver: Url,
    as_token: String,
    txn_prefix: String,
    txn_counter: AtomicU64,
}

impl MatrixClient {
    pub fn new(http: Client, homeserver: Url, as_token: impl Into<String>) -> Self {
        Self {
            http,
            homeserver,
            as_token: as_token.into(),
            txn_prefix: Uuid::new_v4().simple().to_string(),
            txn_counter: AtomicU64::new(0),
        }
    }

    /// Next transaction id; unique for the life of the process
    pub fn next_txn_id(&self) -> String {
        let n = self.txn_counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.txn_prefix, n)
    }

    /// Client API URL with each segment percent-encoded
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.homeserver.clone();
        url.path_segments_mut()
            .map_err(|()| CliError::Config("Homeserver URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(CLIENT_API)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, as_user: Option<&str>) -> RequestBuilder {
        let mut request = self.http.request(method, url).bearer_auth(&self.as_token);
        if let Some(user_id) = as_user {
            request = request.query(&[("user_id", user_id)]);
        }
        request
    }

    /// Send an arbitrary room event, returning its event id
    pub async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: &Value,
        as_user: Option<&str>,
    ) -> Result<String> {
        let txn_id = self.next_txn_id();
        let url = self.endpoint(&["rooms", room_id, "send", event_type, &txn_id])?;
        trace!(%room_id, %event_type, %txn_id, "Sending room event");

        let response = self
            .request(Method::PUT, url.clone(), as_user)
            .json(content)
            .send()
            .await?;
        let body: EventIdResponse = check_status(&url, response).await?.json().await?;
        Ok(body.event_id)
    }

    /// Register an appservice ghost user; already-registered is fine
    pub async fn register_user(&self, localpart: &str) -> Result<()> {
        let url = self.endpoint(&["register"])?;
        let response = self
            .request(Method::POST, url.clone(), None)
            .json(&json!({
                "type": "m.login.application_service",
                "username": localpart,
            }))
            .send()
            .await?;

        match check_status(&url, response).await {
            Ok(_) => Ok(()),
            Err(CliError::Homeserver { body, .. }) if body.contains(USER_IN_USE) => {
                debug!(%localpart, "User already registered");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Invite a user to a room as the bot
    pub async fn invite_user(&self, room_id: &str, user_id: &str) -> Result<()> {
        let url = self.endpoint(&["rooms", room_id, "invite"])?;
        let response = self
            .request(Method::POST, url.clone(), None)
            .json(&json!({ "user_id": user_id }))
            .send()
            .await?;
        check_status(&url, response).await?;
        Ok(())
    }

    /// Join a room, optionally as a ghost user
    pub async fn join_room(&self, room_id: &str, as_user: Option<&str>) -> Result<()> {
        let url = self.endpoint(&["join", room_id])?;
        let response = self
            .request(Method::POST, url.clone(), as_user)
            .json(&json!({}))
            .send()
            .await?;
        check_status(&url, response).await?;
        Ok(())
    }
}

/// Turn a non-success response into [`CliError::Homeserver`]
pub(crate) async fn check_status(url: &Url, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CliError::Homeserver {
        endpoint: url.path().to_string(),
        status: status.as_u16(),
        body,
    })
}

// ----------------------------------------------------------------------------
// Room Client
// ----------------------------------------------------------------------------

fn room_error(room_id: &str, err: CliError) -> BridgeError {
    BridgeError::room(room_id, err.to_string())
}

#[async_trait]
impl RoomClient for MatrixClient {
    async fn send_text(&self, room_id: &str, text: &str) -> BridgeResult<String> {
        let content = json!({ "msgtype": "m.text", "body": text });
        self.send_event(room_id, "m.room.message", &content, None)
            .await
            .map_err(|e| room_error(room_id, e))
    }

    async fn send_notice(
        &self,
        room_id: &str,
        text: &str,
        html: Option<&str>,
    ) -> BridgeResult<String> {
        let mut content = json!({ "msgtype": "m.notice", "body": text });
        if let Some(html) = html {
            content["format"] = json!(HTML_FORMAT);
            content["formatted_body"] = json!(html);
        }
        self.send_event(room_id, "m.room.message", &content, None)
            .await
            .map_err(|e| room_error(room_id, e))
    }

    async fn send_status(&self, room_id: &str, status: &StatusRecord) -> BridgeResult<String> {
        let content = serde_json::to_value(status)?;
        self.send_event(room_id, STATUS_EVENT_TYPE, &content, None)
            .await
            .map_err(|e| room_error(room_id, e))
    }
}
