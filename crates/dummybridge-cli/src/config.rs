//! DummyBridge Configuration Management
//!
//! Configuration is layered with figment, lowest priority first:
//! - Built-in defaults
//! - `dummybridge.toml` in the working directory
//! - An explicit `--config` file
//! - Environment variables (`DUMMYBRIDGE_SECTION__KEY`)
//! - Command line flags

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use url::Url;

use dummybridge_core::EngineConfig;
use dummybridge_transport::{BackoffConfig, TransportConfig, DEFAULT_SYNC_PATH};

use crate::error::{CliError, Result};

/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "dummybridge.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DUMMYBRIDGE_";

const CHECKPOINT_PATH: &str = "/_matrix/client/unstable/com.beeper.message_send_checkpoint";
const REDACTED: &str = "<redacted>";

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the DummyBridge binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub homeserver: HomeserverConfig,
    pub bridge: BridgeConfig,
    pub websocket: WebsocketConfig,
    pub checkpoints: CheckpointConfig,
    pub logging: LoggingConfig,
}

/// Where the homeserver is and how to authenticate to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeserverConfig {
    /// Base URL, e.g. `http://localhost:8008`
    pub url: String,

    /// Appservice token used for every request
    pub as_token: String,

    /// Sent as the process id header on the websocket
    pub process_id: String,
}

/// Fault-injection behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Only this user's messages trigger actions
    pub owner: String,

    /// Network name written into status records
    pub network: String,

    /// Delay applied by `latestatus`
    pub late_status_delay_secs: u64,

    /// Localpart prefix for generated users
    pub user_prefix: String,

    /// Server name for generated users; the homeserver host when unset
    pub user_domain: Option<String>,
}

/// Websocket connection tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsocketConfig {
    pub path: String,
    pub heartbeat_interval_secs: u64,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

/// Checkpoint delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub enabled: bool,

    /// Overrides the homeserver's checkpoint endpoint
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `dummybridge_core=debug`
    pub level: String,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub homeserver: Option<String>,
    pub owner: Option<String>,
    pub as_token: Option<String>,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for HomeserverConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            as_token: String::new(),
            process_id: "DummyBridge".to_string(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            network: "dummybridge".to_string(),
            late_status_delay_secs: 15,
            user_prefix: "dummybridge_".to_string(),
            user_domain: None,
        }
    }
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_SYNC_PATH.to_string(),
            heartbeat_interval_secs: 5,
            initial_backoff_secs: 1,
            max_backoff_secs: 60,
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load and validate configuration from every layer
    pub fn load(config_path: Option<&str>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(CliError::Config(format!("Config file {path} does not exist")));
            }
            figment = figment.merge(Toml::file_exact(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(url) = &overrides.homeserver {
            figment = figment.merge(("homeserver.url", url));
        }
        if let Some(owner) = &overrides.owner {
            figment = figment.merge(("bridge.owner", owner));
        }
        if let Some(token) = &overrides.as_token {
            figment = figment.merge(("homeserver.as_token", token));
        }

        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        let homeserver = Url::parse(&self.homeserver.url).map_err(|e| {
            CliError::Config(format!("Invalid homeserver URL '{}': {}", self.homeserver.url, e))
        })?;
        if !matches!(homeserver.scheme(), "http" | "https") {
            return Err(CliError::Config(
                "Homeserver URL must use http or https".to_string(),
            ));
        }

        if self.homeserver.as_token.is_empty() {
            return Err(CliError::Config("Appservice token must be set".to_string()));
        }

        if !is_user_id(&self.bridge.owner) {
            return Err(CliError::Config(format!(
                "Owner '{}' is not a Matrix user id (@local:server)",
                self.bridge.owner
            )));
        }

        if self.websocket.heartbeat_interval_secs == 0 {
            return Err(CliError::Config(
                "Heartbeat interval must be greater than 0".to_string(),
            ));
        }

        if self.websocket.initial_backoff_secs == 0 || self.websocket.max_backoff_secs == 0 {
            return Err(CliError::Config(
                "Backoff delays must be greater than 0".to_string(),
            ));
        }

        if self.websocket.initial_backoff_secs > self.websocket.max_backoff_secs {
            return Err(CliError::Config(
                "Initial backoff must not exceed max backoff".to_string(),
            ));
        }

        if let Some(endpoint) = &self.checkpoints.endpoint {
            Url::parse(endpoint).map_err(|e| {
                CliError::Config(format!("Invalid checkpoint endpoint '{endpoint}': {e}"))
            })?;
        }

        Ok(())
    }

    /// Copy with secrets replaced, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.homeserver.as_token = REDACTED.to_string();
        config
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    // ------------------------------------------------------------------------
    // Derived Settings
    // ------------------------------------------------------------------------

    pub fn homeserver_url(&self) -> Result<Url> {
        Url::parse(&self.homeserver.url)
            .map_err(|e| CliError::Config(format!("Invalid homeserver URL: {e}")))
    }

    /// Where checkpoints are posted
    pub fn checkpoint_endpoint(&self) -> Result<Url> {
        match &self.checkpoints.endpoint {
            Some(endpoint) => Url::parse(endpoint)
                .map_err(|e| CliError::Config(format!("Invalid checkpoint endpoint: {e}"))),
            None => {
                let mut url = self.homeserver_url()?;
                url.set_path(CHECKPOINT_PATH);
                Ok(url)
            }
        }
    }

    /// Server name for generated users
    pub fn user_domain(&self) -> Result<String> {
        if let Some(domain) = &self.bridge.user_domain {
            return Ok(domain.clone());
        }
        let url = self.homeserver_url()?;
        let host = url
            .host_str()
            .ok_or_else(|| CliError::Config("Homeserver URL has no host".to_string()))?;
        Ok(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(self.bridge.owner.clone());
        config.network = self.bridge.network.clone();
        config.late_status_delay = Duration::from_secs(self.bridge.late_status_delay_secs);
        config
    }

    pub fn transport_config(&self) -> Result<TransportConfig> {
        let mut config = TransportConfig::new(
            &self.homeserver.url,
            &self.websocket.path,
            self.homeserver.as_token.clone(),
            self.homeserver.process_id.clone(),
        )?;
        config.heartbeat_interval = Duration::from_secs(self.websocket.heartbeat_interval_secs);
        config.backoff = BackoffConfig {
            initial_delay: Duration::from_secs(self.websocket.initial_backoff_secs),
            max_delay: Duration::from_secs(self.websocket.max_backoff_secs),
            multiplier: 2,
        };
        Ok(config)
    }
}

/// `@localpart:server`
fn is_user_id(value: &str) -> bool {
    value
        .strip_prefix('@')
        .and_then(|rest| rest.split_once(':'))
        .map(|(local, server)| !local.is_empty() && !server.is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    const MINIMAL: &str = r#"
        [homeserver]
        url = "http://localhost:8008"
        as_token = "file-token"

        [bridge]
        owner = "@alice:localhost"
    "#;

    fn load(overrides: &ConfigOverrides) -> figment::error::Result<AppConfig> {
        AppConfig::load(None, overrides).map_err(|e| figment::Error::from(e.to_string()))
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, MINIMAL)?;
            let config = load(&ConfigOverrides::default())?;

            assert_eq!(config.homeserver.process_id, "DummyBridge");
            assert_eq!(config.bridge.network, "dummybridge");
            assert_eq!(config.bridge.late_status_delay_secs, 15);
            assert_eq!(config.websocket.heartbeat_interval_secs, 5);
            assert_eq!(config.websocket.max_backoff_secs, 60);
            assert!(config.checkpoints.enabled);
            assert_eq!(config.logging.level, "info");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file_and_flags_override_env() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, MINIMAL)?;
            jail.set_env("DUMMYBRIDGE_HOMESERVER__AS_TOKEN", "env-token");
            jail.set_env("DUMMYBRIDGE_WEBSOCKET__HEARTBEAT_INTERVAL_SECS", "9");

            let config = load(&ConfigOverrides::default())?;
            assert_eq!(config.homeserver.as_token, "env-token");
            assert_eq!(config.websocket.heartbeat_interval_secs, 9);

            let overrides = ConfigOverrides {
                as_token: Some("flag-token".to_string()),
                owner: Some("@bob:localhost".to_string()),
                ..Default::default()
            };
            let config = load(&overrides)?;
            assert_eq!(config.homeserver.as_token, "flag-token");
            assert_eq!(config.bridge.owner, "@bob:localhost");
            Ok(())
        });
    }

    #[test]
    fn test_explicit_config_file_must_exist() {
        Jail::expect_with(|_jail| {
            let result = AppConfig::load(Some("missing.toml"), &ConfigOverrides::default());
            assert!(matches!(result, Err(CliError::Config(_))));
            Ok(())
        });
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.homeserver.url = "http://localhost:8008".to_string();
        config.homeserver.as_token = "t".to_string();
        config.bridge.owner = "@alice:localhost".to_string();
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.bridge.owner = "alice".to_string();
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.websocket.initial_backoff_secs = 90;
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.websocket.heartbeat_interval_secs = 0;
        assert!(bad.validate().is_err());

        let mut bad = config.clone();
        bad.homeserver.url = "ftp://localhost".to_string();
        assert!(bad.validate().is_err());

        let mut bad = config;
        bad.homeserver.as_token.clear();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_derived_settings() {
        let mut config = AppConfig::default();
        config.homeserver.url = "http://localhost:8008".to_string();

        assert_eq!(config.user_domain().unwrap(), "localhost:8008");
        assert_eq!(
            config.checkpoint_endpoint().unwrap().as_str(),
            "http://localhost:8008/_matrix/client/unstable/com.beeper.message_send_checkpoint"
        );

        config.bridge.user_domain = Some("example.org".to_string());
        config.checkpoints.endpoint = Some("http://collector/ckpt".to_string());
        assert_eq!(config.user_domain().unwrap(), "example.org");
        assert_eq!(
            config.checkpoint_endpoint().unwrap().as_str(),
            "http://collector/ckpt"
        );

        let transport = config.transport_config().unwrap();
        assert_eq!(transport.endpoint.scheme(), "ws");
        assert_eq!(transport.heartbeat_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_redacted_hides_token() {
        let mut config = AppConfig::default();
        config.homeserver.as_token = "secret".to_string();
        let rendered = config.redacted().to_toml().unwrap();
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains(REDACTED));
    }
}
