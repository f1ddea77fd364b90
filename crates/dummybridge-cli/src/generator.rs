//! Synthetic room content for `!generate`
//!
//! Registers ghost users, brings them into the room and has them post
//! filler sentences in turn.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use dummybridge_core::{
    BridgeError, BridgeResult, ContentGenerator, GenerateArgs, GeneratedContent,
};

use crate::matrix_client::MatrixClient;

const WORDS: &[&str] = &[
    "bridge", "message", "network", "quickly", "silent", "harbor", "orange", "signal", "delivery",
    "window", "river", "remote", "status", "gentle", "packet", "morning", "garden", "echo",
    "distant", "paper", "lantern", "check", "simple", "thunder", "copper", "travel", "secret",
];

/// Upper bound on `messages` for one `!generate`
pub const MAX_GENERATED_MESSAGES: usize = 1000;

/// Upper bound on `users` for one `!generate`
pub const MAX_GENERATED_USERS: usize = 50;

/// Decoded `!generate` arguments
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateRequest {
    #[serde(default = "default_messages")]
    pub messages: usize,
    #[serde(default)]
    pub users: Option<usize>,
    #[serde(default)]
    pub room_id: Option<String>,
}

fn default_messages() -> usize {
    1
}

impl GenerateRequest {
    pub fn from_args(args: GenerateArgs) -> BridgeResult<Self> {
        let request: Self = serde_json::from_value(Value::Object(args))
            .map_err(|e| BridgeError::Generation(e.to_string()))?;
        if request.users == Some(0) && request.messages > 0 {
            return Err(BridgeError::Generation(
                "users must be at least 1 to send messages".to_string(),
            ));
        }
        if request.messages > MAX_GENERATED_MESSAGES {
            return Err(BridgeError::Generation(format!(
                "messages must be at most {MAX_GENERATED_MESSAGES}, got {}",
                request.messages
            )));
        }
        if request.user_count() > MAX_GENERATED_USERS {
            return Err(BridgeError::Generation(format!(
                "users must be at most {MAX_GENERATED_USERS}, got {}",
                request.user_count()
            )));
        }
        Ok(request)
    }

    /// Ghost users to create; one when unspecified
    pub fn user_count(&self) -> usize {
        self.users.unwrap_or(1)
    }
}

/// Random lowercase-alphanumeric localpart suffix
fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// A capitalized sentence of filler words
fn random_sentence() -> String {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(4..=10);
    let words: Vec<&str> = (0..len)
        .filter_map(|_| WORDS.choose(&mut rng).copied())
        .collect();
    let mut sentence = words.join(" ");
    if let Some(first) = sentence.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    sentence.push('.');
    sentence
}

// ----------------------------------------------------------------------------
// Matrix Content Generator
// ----------------------------------------------------------------------------

/// [`ContentGenerator`] that fabricates content through the appservice API
pub struct MatrixContentGenerator {
    client: Arc<MatrixClient>,
    user_prefix: String,
    user_domain: String,
}

impl MatrixContentGenerator {
    pub fn new(
        client: Arc<MatrixClient>,
        user_prefix: impl Into<String>,
        user_domain: impl Into<String>,
    ) -> Self {
        Self {
            client,
            user_prefix: user_prefix.into(),
            user_domain: user_domain.into(),
        }
    }

    /// Fresh `(localpart, user id)` pair
    pub fn new_user(&self) -> (String, String) {
        let localpart = format!("{}{}", self.user_prefix, random_suffix(8));
        let user_id = format!("@{}:{}", localpart, self.user_domain);
        (localpart, user_id)
    }

    fn generation_error(err: impl ToString) -> BridgeError {
        BridgeError::Generation(err.to_string())
    }
}

#[async_trait]
impl ContentGenerator for MatrixContentGenerator {
    async fn generate_content(
        &self,
        room_id: &str,
        args: GenerateArgs,
    ) -> BridgeResult<GeneratedContent> {
        let request = GenerateRequest::from_args(args)?;
        let room_id = request.room_id.clone().unwrap_or_else(|| room_id.to_string());
        debug!(%room_id, ?request, "Generating content");

        let users: Vec<(String, String)> = (0..request.user_count()).map(|_| self.new_user()).collect();
        for (localpart, user_id) in &users {
            self.client
                .register_user(localpart)
                .await
                .map_err(Self::generation_error)?;
            self.client
                .invite_user(&room_id, user_id)
                .await
                .map_err(Self::generation_error)?;
            self.client
                .join_room(&room_id, Some(user_id))
                .await
                .map_err(Self::generation_error)?;
        }

        let mut senders: VecDeque<&str> = users.iter().map(|(_, id)| id.as_str()).collect();
        let mut event_ids = Vec::new();
        for _ in 0..request.messages {
            let Some(sender) = senders.front().copied() else {
                break;
            };
            let content = json!({ "msgtype": "m.text", "body": random_sentence() });
            let event_id = self
                .client
                .send_event(&room_id, "m.room.message", &content, Some(sender))
                .await
                .map_err(Self::generation_error)?;
            event_ids.push(event_id);
            senders.rotate_left(1);
        }

        info!(
            %room_id,
            users = users.len(),
            messages = event_ids.len(),
            "Generated content"
        );

        Ok(GeneratedContent {
            room_id,
            user_ids: users.into_iter().map(|(_, id)| id).collect(),
            event_ids,
        })
    }
}
