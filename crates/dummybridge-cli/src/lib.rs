//! DummyBridge CLI Library
//!
//! Configuration, HTTP collaborators and wiring for the `dummybridge`
//! binary.

pub mod app;
pub mod checkpoint_emitter;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod matrix_client;

pub use app::{evaluate_report, DummyBridgeApp};
pub use cli::{Cli, Commands};
pub use config::{AppConfig, ConfigOverrides};
pub use error::{CliError, Result};
