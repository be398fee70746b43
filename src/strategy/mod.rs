//! Strategy Layer - Seven trading bots over the shared market state
//!
//! - `config`: per-bot configuration, validation and the `StrategyId` tags
//! - `bots`: the bot rules themselves, one module per strategy
//! - `dedup`: bounded set of triggers already acted on
//! - `intent`: buy/sell intents handed to the runtime
//! - `engine`: runs every enabled bot on each trigger

pub mod bots;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod intent;

pub use bots::{StrategyError, Trigger};
pub use config::{
    MasterConfig, MasterSignals, MilestoneConfig, MirrorConfig, SafetyExitConfig, ScalpConfig,
    SniperConfig, StrategyConfig, StrategyConfigError, StrategyId, WhaleConfig,
};
pub use dedup::{DedupKey, DedupSet, DEFAULT_DEDUP_CAPACITY};
pub use engine::{EngineStats, Evaluation, StrategyEngine};
pub use intent::{ExitReason, TradeIntent};
