//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    load_config, parse_config, Config, ConfigError, EngineSection, FeedSection, LoggingSection,
    MarketSection, TradingSection, WS_URL_ENV,
};
