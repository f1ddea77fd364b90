//! Fire-and-forget checkpoint delivery over HTTP

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{trace, warn};
use url::Url;

use dummybridge_core::{CheckpointRecord, CheckpointSink};

use crate::error::Result;
use crate::matrix_client::check_status;

/// Posts each checkpoint to the checkpoint endpoint on its own task.
///
/// Delivery failures are logged and dropped.
#[derive(Clone)]
pub struct CheckpointEmitter {
    http: Client,
    endpoint: Url,
    as_token: String,
    enabled: bool,
}

impl CheckpointEmitter {
    pub fn new(http: Client, endpoint: Url, as_token: impl Into<String>, enabled: bool) -> Self {
        Self {
            http,
            endpoint,
            as_token: as_token.into(),
            enabled,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, record: &CheckpointRecord) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.as_token)
            .json(&checkpoint_body(record))
            .send()
            .await?;
        check_status(&self.endpoint, response).await?;
        Ok(())
    }
}

/// Request body carrying a single checkpoint
pub fn checkpoint_body(record: &CheckpointRecord) -> Value {
    json!({ "checkpoints": [record] })
}

impl CheckpointSink for CheckpointEmitter {
    fn submit(&self, record: CheckpointRecord) {
        if !self.enabled {
            trace!(event_id = %record.event_id, step = ?record.step, "Checkpoints disabled");
            return;
        }

        let emitter = self.clone();
        tokio::spawn(async move {
            match emitter.post(&record).await {
                Ok(()) => trace!(event_id = %record.event_id, step = ?record.step, "Checkpoint sent"),
                Err(e) => warn!(
                    event_id = %record.event_id,
                    step = ?record.step,
                    error = %e,
                    "Failed to send checkpoint"
                ),
            }
        });
    }
}
