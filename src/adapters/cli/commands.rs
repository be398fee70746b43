//! CLI Command Handlers
//!
//! `run` wires the feed, runtime and executor together and keeps them alive
//! until Ctrl+C (or `--duration-secs`). `bots` prints the resolved strategy table.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use super::init_logging;
use crate::adapters::executor::PlaceholderExecutor;
use crate::adapters::log_sink::TracingLogSink;
use crate::adapters::pump_fun::{FeedClient, FeedConfig, WsConnector};
use crate::application::{BotRuntime, RuntimeConfig};
use crate::config::{load_config, Config};
use crate::domain::{MarketState, MarketStateConfig, MarketSummary, TradingMode};
use crate::ports::clock::{Clock, SystemClock};
use crate::ports::executor::TradeExecutor;
use crate::ports::log_sink::LogSink;
use crate::strategy::StrategyEngine;

/// Seconds between status lines while running
const STATUS_INTERVAL_SECS: u64 = 30;

/// pump-brain - Multi-strategy bot brain for pump.fun launches
#[derive(Parser, Debug)]
#[command(
    name = "pump-brain",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Multi-strategy bot brain for pump.fun bonding-curve launches",
    long_about = "pump-brain follows the PumpPortal live feed and runs up to seven \
                  independently configured bots against it, settling their intents \
                  against a simulated SOL ledger."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to the feed and run the enabled bots
    Run(RunCmd),

    /// Print the resolved bot configuration
    Bots(BotsCmd),
}

/// Run the bots
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Send intents to the trade executor instead of settling them in simulation
    #[arg(long)]
    pub live: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    pub duration_secs: Option<u64>,
}

/// Show bot configuration
#[derive(Parser, Debug)]
pub struct BotsCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
    pub config: PathBuf,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Run(cmd) => {
            let config = load(&cmd.config)?;
            init_logging(app.verbose, app.debug, &config.logging.level)?;
            run_command(cmd, config).await
        }
        Command::Bots(cmd) => {
            let config = load(&cmd.config)?;
            init_logging(app.verbose, app.debug, &config.logging.level)?;
            bots_command(&config)
        }
    }
}

/// Expand `~` and `$VARS` in a path given on the command line
fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand path '{}'", raw))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

fn load(path: &Path) -> Result<Config> {
    let path = expand_path(path)?;
    load_config(&path).with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Handle run command
async fn run_command(cmd: RunCmd, mut config: Config) -> Result<()> {
    info!("Starting pump-brain...");
    if cmd.live {
        config.trading.mode = TradingMode::Live;
    }

    let state = MarketState::shared(MarketStateConfig::from(&config));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let log: Arc<dyn LogSink> = Arc::new(TracingLogSink);
    let executor: Arc<dyn TradeExecutor> = Arc::new(PlaceholderExecutor::new());

    if config.trading.mode == TradingMode::Live {
        warn!(
            "LIVE MODE - intents are sent to the '{}' executor",
            executor.name()
        );
    }

    let engine = StrategyEngine::new(config.bots.clone(), config.engine.dedup_capacity)
        .context("Invalid bot configuration")?;
    if engine.enabled_count() == 0 {
        warn!("No bots enabled - the feed will be tracked but nothing will trade");
    }

    let (feed, events) = FeedClient::new(
        FeedConfig::from(&config),
        Arc::new(WsConnector::new()),
        Arc::clone(&state),
        Arc::clone(&clock),
        Arc::clone(&log),
    );
    let (runtime, handle) = BotRuntime::new(
        RuntimeConfig::from(&config),
        Arc::clone(&state),
        engine,
        feed.clone(),
        executor,
        clock,
        log,
    );

    let feed_task = tokio::spawn({
        let feed = feed.clone();
        async move { feed.run().await }
    });
    let runtime_task = tokio::spawn(runtime.run(events));
    feed.connect().context("Feed client stopped before connecting")?;

    let stop = async {
        match cmd.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(stop);
    let mut status = tokio::time::interval(Duration::from_secs(STATUS_INTERVAL_SECS));
    status.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = &mut stop => {
                info!("Run duration elapsed");
                break;
            }
            _ = status.tick() => log_summary(&handle.summary().await),
        }
    }

    let summary = handle.summary().await;
    // either task may already be gone
    handle.shutdown().ok();
    feed.shutdown().ok();
    runtime_task.await.context("Runtime task panicked")??;
    feed_task.await.context("Feed task panicked")??;

    log_summary(&summary);
    info!("pump-brain stopped");
    Ok(())
}

/// Handle bots command
fn bots_command(config: &Config) -> Result<()> {
    let engine = StrategyEngine::new(config.bots.clone(), config.engine.dedup_capacity)
        .context("Invalid bot configuration")?;

    println!("Feed:    {}", config.feed.get_ws_url());
    println!("Mode:    {}", config.trading.mode);
    println!("Balance: {} SOL", config.trading.starting_balance_sol);
    println!();
    println!("{:<10} {:<4} SETTINGS", "BOT", "ON");
    for bot in engine.configs() {
        println!(
            "{:<10} {:<4} {}",
            bot.id().tag(),
            if bot.enabled() { "yes" } else { "-" },
            bot.describe()
        );
    }
    Ok(())
}

fn log_summary(summary: &MarketSummary) {
    info!(
        "Status {} | latency {} | packets {} | {} | balance {:.4} SOL | {} open | uPnL {:+.4} SOL | realized {:+.4} SOL | win rate {:.0}%",
        summary.status,
        summary
            .latency_ms
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "-".to_string()),
        summary.packets_received,
        summary.mode,
        summary.balance_sol,
        summary.open_positions,
        summary.unrealized_pnl_sol,
        summary.stats.total_realized_pnl_sol,
        summary.stats.win_rate()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_app_parse_run() {
        let args = vec!["pump-brain", "run", "--config", "test.toml"];
        let app = CliApp::try_parse_from(args).unwrap();

        match app.command {
            Command::Run(cmd) => {
                assert_eq!(cmd.config, PathBuf::from("test.toml"));
                assert!(!cmd.live);
                assert!(cmd.duration_secs.is_none());
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_app_parse_run_live_with_duration() {
        let args = vec!["pump-brain", "run", "--live", "--duration-secs", "60"];
        let app = CliApp::try_parse_from(args).unwrap();

        match app.command {
            Command::Run(cmd) => {
                assert!(cmd.live);
                assert_eq!(cmd.duration_secs, Some(60));
                assert_eq!(cmd.config, PathBuf::from("config/default.toml"));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_app_parse_bots_with_global_flags() {
        let args = vec!["pump-brain", "bots", "-c", "bots.toml", "--debug"];
        let app = CliApp::try_parse_from(args).unwrap();

        assert!(app.debug);
        assert!(!app.verbose);
        match app.command {
            Command::Bots(cmd) => assert_eq!(cmd.config, PathBuf::from("bots.toml")),
            _ => panic!("Expected Bots command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        let args = vec!["pump-brain", "swap"];
        assert!(CliApp::try_parse_from(args).is_err());
    }

    #[test]
    fn test_expand_path_plain() {
        let path = expand_path(Path::new("config/default.toml")).unwrap();
        assert_eq!(path, PathBuf::from("config/default.toml"));
    }

    #[test]
    fn test_bots_command_accepts_defaults() {
        assert!(bots_command(&Config::default()).is_ok());
    }
}
