//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Homeserver base URL
    #[arg(long, global = true)]
    pub homeserver: Option<String>,

    /// Matrix user whose messages are acted on
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Appservice token
    #[arg(long, global = true)]
    pub as_token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to the homeserver and inject faults until interrupted
    Run,
    /// Validate the configuration and print it with secrets redacted
    CheckConfig,
    /// Show which actions a message text would trigger, without a server
    Evaluate {
        /// Message text to evaluate
        text: String,
    },
}
