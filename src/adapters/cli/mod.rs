//! CLI Adapter
//!
//! Command-line interface for pump-brain.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{BotsCmd, CliApp, Command, RunCmd};

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the CLI application
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}

/// Initialize logging. `--debug` and `--verbose` win over `RUST_LOG`, which
/// wins over the configured level.
pub fn init_logging(verbose: bool, debug: bool, config_level: &str) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config_level))?
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    commands::execute(app).await
}
