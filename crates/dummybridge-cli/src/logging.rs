//! Logging setup for the binary

use tracing_subscriber::EnvFilter;

/// Filter for the subscriber: `RUST_LOG` when set and valid, otherwise
/// DEBUG for `--verbose`, otherwise the configured level
pub fn log_filter(verbose: bool, level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
        }
    })
}

/// Install the global fmt subscriber, writing to stderr
pub fn setup_logging(verbose: bool, level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
