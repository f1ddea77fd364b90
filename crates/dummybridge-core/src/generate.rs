//! `!generate` command surface
//!
//! Argument parsing lives here. Generating the content itself is the job of
//! an external [`ContentGenerator`].

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::{BridgeError, BridgeResult};

/// Command prefix that selects generation
pub const GENERATE_PREFIX: &str = "!generate";

/// Parsed `key=value` arguments, values decoded as JSON where possible
pub type GenerateArgs = Map<String, Value>;

/// Identifiers of everything a generation run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedContent {
    pub room_id: String,
    pub user_ids: Vec<String>,
    pub event_ids: Vec<String>,
}

/// Fabricates rooms, users and messages on request
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_content(
        &self,
        room_id: &str,
        args: GenerateArgs,
    ) -> BridgeResult<GeneratedContent>;
}

/// Parse the argument text following `!generate`.
///
/// A JSON object is taken as the argument map as-is. Otherwise the text is
/// split on whitespace into `key=value` tokens; each value is decoded as JSON
/// when it is valid JSON and kept as a plain string when not.
pub fn parse_generate_args(text: &str) -> BridgeResult<GenerateArgs> {
    let text = text.trim();

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Ok(map);
    }

    let mut args = Map::new();
    for token in text.split_whitespace() {
        let (key, raw_value) =
            token
                .split_once('=')
                .ok_or_else(|| BridgeError::InvalidGenerateArgument {
                    argument: token.to_string(),
                })?;
        let value = serde_json::from_str(raw_value)
            .unwrap_or_else(|_| Value::String(raw_value.to_string()));
        args.insert(key.to_string(), value);
    }
    Ok(args)
}
