//! Application wiring for the DummyBridge binary

use std::fmt::Write as _;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::watch;
use tracing::{error, info};

use dummybridge_core::rules::{deferred_override, NEXT_TOKEN};
use dummybridge_core::{evaluate, FaultInjectionEngine};
use dummybridge_transport::{EventRouter, Transport};

use crate::checkpoint_emitter::CheckpointEmitter;
use crate::config::AppConfig;
use crate::error::Result;
use crate::generator::MatrixContentGenerator;
use crate::matrix_client::MatrixClient;

/// The running harness: engine, collaborators and transport
pub struct DummyBridgeApp {
    config: AppConfig,
    http: Client,
}

impl DummyBridgeApp {
    pub fn new(config: AppConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("dummybridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Engine with HTTP-backed collaborators
    pub fn build_engine(&self) -> Result<FaultInjectionEngine> {
        let homeserver = self.config.homeserver_url()?;
        let as_token = self.config.homeserver.as_token.clone();

        let client = Arc::new(MatrixClient::new(
            self.http.clone(),
            homeserver,
            as_token.clone(),
        ));
        let emitter = CheckpointEmitter::new(
            self.http.clone(),
            self.config.checkpoint_endpoint()?,
            as_token,
            self.config.checkpoints.enabled,
        );
        let generator = MatrixContentGenerator::new(
            client.clone(),
            self.config.bridge.user_prefix.clone(),
            self.config.user_domain()?,
        );

        info!(
            owner = %self.config.bridge.owner,
            checkpoints = %emitter.endpoint(),
            checkpoints_enabled = self.config.checkpoints.enabled,
            "Fault injection engine ready"
        );

        Ok(FaultInjectionEngine::new(
            self.config.engine_config(),
            client,
            Arc::new(emitter),
            Arc::new(generator),
        ))
    }

    /// Serve events until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let engine = self.build_engine()?;
        let mut router = EventRouter::new(engine);
        let mut transport = Transport::new(self.config.transport_config()?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let signal = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown requested");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => error!(error = %e, "Cannot listen for Ctrl-C"),
            }
        });

        transport.run(&mut router, shutdown_rx).await;
        signal.abort();

        let stats = router.stats();
        info!(
            transactions = stats.transactions,
            events = stats.events_delivered,
            skipped = stats.events_skipped,
            handler_errors = stats.handler_errors,
            sessions = transport.sessions(),
            "DummyBridge stopped"
        );
        Ok(())
    }
}

/// Offline report of what a message text would trigger
pub fn evaluate_report(text: &str) -> String {
    let decision = evaluate(text);
    let mut report = String::new();
    let _ = writeln!(report, "mss action:        {}", decision.mss);
    let _ = writeln!(report, "checkpoint action: {}", decision.checkpoint);
    let _ = writeln!(report, "no retry:          {}", decision.no_retry);
    let _ = writeln!(report, "not certain:       {}", decision.not_certain);
    if text.contains(NEXT_TOKEN) {
        match deferred_override(text) {
            Some(pending) => {
                let _ = writeln!(report, "next message:      {pending}");
            }
            None => {
                let _ = writeln!(report, "next message:      nothing deferred");
            }
        }
    }
    report
}
