//! DummyBridge - fault-injecting bridge impersonator for Matrix client tests

use clap::Parser;
use tracing::{error, info};

use dummybridge_cli::{
    app::{evaluate_report, DummyBridgeApp},
    cli::{Cli, Commands},
    config::{AppConfig, ConfigOverrides},
    error::Result,
    logging::setup_logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Offline evaluation needs no configuration
    if let Commands::Evaluate { text } = &cli.command {
        setup_logging(cli.verbose, "info");
        print!("{}", evaluate_report(text));
        return Ok(());
    }

    // Load configuration
    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            setup_logging(cli.verbose, "info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    setup_logging(cli.verbose, &config.logging.level);

    match cli.command {
        Commands::CheckConfig => {
            print!("{}", config.redacted().to_toml()?);
            info!("Configuration is valid");
        }
        Commands::Run => {
            let app = DummyBridgeApp::new(config)?;
            if let Err(e) = app.run().await {
                error!("DummyBridge failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Evaluate { .. } => {}
    }

    Ok(())
}

/// Load configuration from every layer, with CLI flags on top
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    let overrides = ConfigOverrides {
        homeserver: cli.homeserver.clone(),
        owner: cli.owner.clone(),
        as_token: cli.as_token.clone(),
    };
    AppConfig::load(cli.config.as_deref(), &overrides)
}
