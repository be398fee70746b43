//! Configuration Loader
//!
//! Loads and validates configuration from TOML files. Every section has
//! defaults, so an empty file is a valid (all bots disabled) configuration.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::adapters::pump_fun::{
    FeedConfig, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_RECONNECT_BASE_MS, DEFAULT_RECONNECT_MAX_MS,
    DEFAULT_WS_URL,
};
use crate::application::{RuntimeConfig, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_SAFETY_CHECK_INTERVAL_MS};
use crate::domain::market_state::{DEFAULT_TOKEN_CAP, DEFAULT_VELOCITY_WINDOW_MS};
use crate::domain::{CurveParams, MarketStateConfig, TradingMode, DEFAULT_SOL_PRICE_USD, DEFAULT_TOTAL_SUPPLY};
use crate::strategy::{StrategyConfig, DEFAULT_DEDUP_CAPACITY};

/// Environment variable overriding `[feed] ws_url`
pub const WS_URL_ENV: &str = "PUMP_WS_URL";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedSection,
    #[serde(default)]
    pub market: MarketSection,
    #[serde(default)]
    pub trading: TradingSection,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// One table per bot, tagged by `kind`
    #[serde(default)]
    pub bots: Vec<StrategyConfig>,
}

/// Market feed connection section
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSection {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Send `subscribeNewToken` on connect
    #[serde(default = "default_true")]
    pub subscribe_new_tokens: bool,
    /// Also subscribe to the trades of every new token
    #[serde(default)]
    pub follow_new_token_trades: bool,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// 0 = retry forever
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Frames larger than this are dropped (bytes)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    #[serde(default = "default_channel_buffer_size")]
    pub channel_buffer_size: usize,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            subscribe_new_tokens: true,
            follow_new_token_trades: false,
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            max_reconnect_attempts: 0,
            connect_timeout_secs: default_connect_timeout_secs(),
            max_message_size: default_max_message_size(),
            channel_buffer_size: default_channel_buffer_size(),
        }
    }
}

impl FeedSection {
    /// Get WebSocket URL with environment variable override
    /// Checks PUMP_WS_URL env var first, falls back to config value
    pub fn get_ws_url(&self) -> String {
        std::env::var(WS_URL_ENV)
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.ws_url.clone())
    }
}

/// Market state section
#[derive(Debug, Clone, Deserialize)]
pub struct MarketSection {
    /// Most recent tokens kept in memory
    #[serde(default = "default_token_cap")]
    pub token_cap: usize,
    /// Rolling window for trade velocity
    #[serde(default = "default_velocity_window_ms")]
    pub velocity_window_ms: u64,
    #[serde(default = "default_sol_price_usd")]
    pub sol_price_usd: f64,
    /// Token supply of a launch, used for curve progress
    #[serde(default = "default_total_supply")]
    pub total_supply: f64,
}

impl Default for MarketSection {
    fn default() -> Self {
        Self {
            token_cap: default_token_cap(),
            velocity_window_ms: default_velocity_window_ms(),
            sol_price_usd: default_sol_price_usd(),
            total_supply: default_total_supply(),
        }
    }
}

/// Trading section
#[derive(Debug, Clone, Deserialize)]
pub struct TradingSection {
    /// "simulated" or "live"
    #[serde(default)]
    pub mode: TradingMode,
    #[serde(default = "default_starting_balance_sol")]
    pub starting_balance_sol: f64,
}

impl Default for TradingSection {
    fn default() -> Self {
        Self {
            mode: TradingMode::Simulated,
            starting_balance_sol: default_starting_balance_sol(),
        }
    }
}

/// Strategy engine section
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Batch flush interval; 0 applies every event immediately
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_safety_check_interval_ms")]
    pub safety_check_interval_ms: u64,
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            safety_check_interval_ms: default_safety_check_interval_ms(),
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}
fn default_reconnect_base_ms() -> u64 {
    DEFAULT_RECONNECT_BASE_MS
}
fn default_reconnect_max_ms() -> u64 {
    DEFAULT_RECONNECT_MAX_MS
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}
fn default_channel_buffer_size() -> usize {
    1000
}
fn default_token_cap() -> usize {
    DEFAULT_TOKEN_CAP
}
fn default_velocity_window_ms() -> u64 {
    DEFAULT_VELOCITY_WINDOW_MS
}
fn default_sol_price_usd() -> f64 {
    DEFAULT_SOL_PRICE_USD
}
fn default_total_supply() -> f64 {
    DEFAULT_TOTAL_SUPPLY
}
fn default_starting_balance_sol() -> f64 {
    100.0
}
fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}
fn default_safety_check_interval_ms() -> u64 {
    DEFAULT_SAFETY_CHECK_INTERVAL_MS
}
fn default_dedup_capacity() -> usize {
    DEFAULT_DEDUP_CAPACITY
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate feed section
        if self.feed.ws_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "ws_url cannot be empty".to_string(),
            ));
        }

        if !self.feed.ws_url.starts_with("ws://") && !self.feed.ws_url.starts_with("wss://") {
            return Err(ConfigError::ValidationError(format!(
                "ws_url must be a ws:// or wss:// URL, got {}",
                self.feed.ws_url
            )));
        }

        if self.feed.reconnect_base_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect_base_ms must be > 0".to_string(),
            ));
        }

        if self.feed.reconnect_max_ms < self.feed.reconnect_base_ms {
            return Err(ConfigError::ValidationError(format!(
                "reconnect_max_ms ({}) must be >= reconnect_base_ms ({})",
                self.feed.reconnect_max_ms, self.feed.reconnect_base_ms
            )));
        }

        if self.feed.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.feed.max_message_size == 0 || self.feed.channel_buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_message_size and channel_buffer_size must be > 0".to_string(),
            ));
        }

        // Validate market section
        if self.market.token_cap == 0 {
            return Err(ConfigError::ValidationError(
                "token_cap must be > 0".to_string(),
            ));
        }

        if self.market.velocity_window_ms == 0 {
            return Err(ConfigError::ValidationError(
                "velocity_window_ms must be > 0".to_string(),
            ));
        }

        if !(self.market.sol_price_usd > 0.0) || !(self.market.total_supply > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "sol_price_usd and total_supply must be > 0, got {} and {}",
                self.market.sol_price_usd, self.market.total_supply
            )));
        }

        // Validate trading section
        if !self.trading.starting_balance_sol.is_finite() || self.trading.starting_balance_sol < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "starting_balance_sol must be >= 0, got {}",
                self.trading.starting_balance_sol
            )));
        }

        // Validate engine section
        if self.engine.safety_check_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "safety_check_interval_ms must be > 0".to_string(),
            ));
        }

        if self.engine.dedup_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "dedup_capacity must be > 0".to_string(),
            ));
        }

        // Validate bots
        let mut seen = HashSet::new();
        for bot in &self.bots {
            if !seen.insert(bot.id()) {
                return Err(ConfigError::ValidationError(format!(
                    "bot '{}' is configured more than once",
                    bot.id()
                )));
            }
            bot.validate()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        Ok(())
    }

    fn curve(&self) -> CurveParams {
        CurveParams {
            total_supply: self.market.total_supply,
            sol_price_usd: self.market.sol_price_usd,
        }
    }
}

impl From<&Config> for FeedConfig {
    fn from(config: &Config) -> Self {
        let feed = &config.feed;
        FeedConfig {
            ws_url: feed.get_ws_url(),
            subscribe_new_tokens: feed.subscribe_new_tokens,
            reconnect_base_ms: feed.reconnect_base_ms,
            reconnect_max_ms: feed.reconnect_max_ms,
            max_reconnect_attempts: feed.max_reconnect_attempts,
            connect_timeout: Duration::from_secs(feed.connect_timeout_secs),
            max_message_size: feed.max_message_size,
            channel_buffer_size: feed.channel_buffer_size,
            curve: config.curve(),
        }
    }
}

impl From<&Config> for MarketStateConfig {
    fn from(config: &Config) -> Self {
        MarketStateConfig {
            token_cap: config.market.token_cap,
            velocity_window_ms: config.market.velocity_window_ms,
            curve: config.curve(),
            starting_balance: config.trading.starting_balance_sol,
            mode: config.trading.mode,
        }
    }
}

impl From<&Config> for RuntimeConfig {
    fn from(config: &Config) -> Self {
        RuntimeConfig {
            flush_interval_ms: config.engine.flush_interval_ms,
            safety_check_interval_ms: config.engine.safety_check_interval_ms,
            follow_new_token_trades: config.feed.follow_new_token_trades,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyId;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[feed]
ws_url = "wss://pumpportal.fun/api/data"
follow_new_token_trades = true
reconnect_base_ms = 500
reconnect_max_ms = 30000

[market]
token_cap = 50
sol_price_usd = 150.0

[trading]
mode = "simulated"
starting_balance_sol = 10.0

[engine]
flush_interval_ms = 0

[logging]
level = "debug"

[[bots]]
kind = "sniper"
enabled = true
max_age_ms = 1500
block_delay = 2

[[bots]]
kind = "scalp"
enabled = true
take_profit_pct = 20.0
stop_loss_pct = 8.0

[[bots]]
kind = "master"
enabled = true
signals = { min_velocity = 3, min_volume_sol = 5.0 }
"#
        .to_string()
    }

    fn write(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write(&create_valid_config());
        let config = load_config(file.path()).unwrap();

        assert!(config.feed.follow_new_token_trades);
        assert_eq!(config.market.token_cap, 50);
        assert_eq!(config.trading.starting_balance_sol, 10.0);
        assert_eq!(config.engine.flush_interval_ms, 0);
        assert_eq!(config.engine.safety_check_interval_ms, 3_000);
        assert_eq!(config.logging.level, "debug");

        let ids: Vec<StrategyId> = config.bots.iter().map(|b| b.id()).collect();
        assert_eq!(ids, vec![StrategyId::Sniper, StrategyId::Scalp, StrategyId::Master]);
        match &config.bots[0] {
            StrategyConfig::Sniper(s) => {
                assert_eq!(s.max_age_ms, 1500);
                assert_eq!(s.entry_delay_ms(), 800);
                assert_eq!(s.snipe_amount_sol, 0.1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_file_is_valid() {
        let config = parse_config("").unwrap();
        assert_eq!(config.feed.ws_url, DEFAULT_WS_URL);
        assert!(config.feed.subscribe_new_tokens);
        assert_eq!(config.trading.mode, TradingMode::Simulated);
        assert_eq!(config.engine.dedup_capacity, DEFAULT_DEDUP_CAPACITY);
        assert_eq!(config.engine.flush_interval_ms, 1_000);
        assert!(config.bots.is_empty());
    }

    #[test]
    fn test_shipped_default_file_matches_defaults() {
        let config = parse_config(include_str!("../../config/default.toml")).unwrap();
        assert_eq!(config.engine.flush_interval_ms, DEFAULT_FLUSH_INTERVAL_MS);
        assert_eq!(
            config.engine.safety_check_interval_ms,
            DEFAULT_SAFETY_CHECK_INTERVAL_MS
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_parse_error() {
        let result = parse_config("[feed\nws_url = ");
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_unknown_bot_kind_rejected() {
        let result = parse_config("[[bots]]\nkind = \"arbitrage\"\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_duplicate_bot_rejected() {
        let result = parse_config(
            r#"
[[bots]]
kind = "whale"
enabled = true

[[bots]]
kind = "whale"
whale_threshold_sol = 100.0
"#,
        );
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_invalid_bot_rejected() {
        let result = parse_config(
            r#"
[[bots]]
kind = "master"
enabled = true
signals = {}
"#,
        );
        // master needs at least one signal
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_mirror_target_must_be_a_pubkey() {
        let bad = r#"
[[bots]]
kind = "mirror"
enabled = true
target_wallet = "not-a-wallet"
"#;
        assert!(matches!(parse_config(bad).unwrap_err(), ConfigError::ValidationError(_)));

        let good = r#"
[[bots]]
kind = "mirror"
enabled = true
target_wallet = "11111111111111111111111111111111"
copy_percent = 50.0
"#;
        assert!(parse_config(good).is_ok());
    }

    #[test]
    fn test_invalid_backoff() {
        let result = parse_config("[feed]\nreconnect_base_ms = 5000\nreconnect_max_ms = 1000\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_invalid_ws_url() {
        let result = parse_config("[feed]\nws_url = \"https://pumpportal.fun\"\n");
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_conversions() {
        let config = parse_config(&create_valid_config()).unwrap();

        let market = MarketStateConfig::from(&config);
        assert_eq!(market.token_cap, 50);
        assert_eq!(market.starting_balance, 10.0);
        assert_eq!(market.curve.sol_price_usd, 150.0);

        let runtime = RuntimeConfig::from(&config);
        assert_eq!(runtime.flush_interval_ms, 0);
        assert!(runtime.follow_new_token_trades);

        let feed = FeedConfig::from(&config);
        assert_eq!(feed.reconnect_base_ms, 500);
        assert_eq!(feed.connect_timeout, Duration::from_secs(10));
        assert_eq!(feed.curve.sol_price_usd, 150.0);
    }
}
