//! Strategy Configuration
//!
//! One variant per bot, tagged by `kind` in TOML:
//!
//! ```toml
//! [[bots]]
//! kind = "scalp"
//! enabled = true
//! take_profit_pct = 20.0
//! ```
//!
//! Every field has a serde default, so a bot table only needs the values it
//! overrides.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Strategy configuration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StrategyConfigError {
    #[error("Invalid value for {strategy}: {message}")]
    InvalidValue {
        strategy: StrategyId,
        message: String,
    },
}

/// Identifies a bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    /// Combine-all-signals entry plus trailing stop
    Master,
    /// Buys brand new launches
    Sniper,
    /// Copies a target wallet's buys
    Mirror,
    /// Time plus holder-concentration exit
    SafetyExit,
    /// Follows large buys
    Whale,
    /// Bonding-curve progress entry and pre-migration exit
    Milestone,
    /// Take-profit / stop-loss
    Scalp,
}

impl StrategyId {
    pub const ALL: [StrategyId; 7] = [
        StrategyId::Master,
        StrategyId::Sniper,
        StrategyId::Mirror,
        StrategyId::SafetyExit,
        StrategyId::Whale,
        StrategyId::Milestone,
        StrategyId::Scalp,
    ];

    /// Short upper-case tag used as log category and position source
    pub fn tag(&self) -> &'static str {
        match self {
            StrategyId::Master => "MASTER",
            StrategyId::Sniper => "SNIPER",
            StrategyId::Mirror => "MIRROR",
            StrategyId::SafetyExit => "SAFETY",
            StrategyId::Whale => "WHALE",
            StrategyId::Milestone => "MILESTONE",
            StrategyId::Scalp => "SCALP",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

// ===== Master =====

/// Sub-signals of the master strategy. `None` disables a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterSignals {
    /// Trades per velocity window must exceed this
    #[serde(default)]
    pub min_velocity: Option<u32>,
    /// Cumulative buy SOL must exceed this
    #[serde(default)]
    pub min_volume_sol: Option<f64>,
    /// Bonding-curve progress must be at least this
    #[serde(default)]
    pub min_progress_pct: Option<f64>,
    /// Top holder share must be at most this
    #[serde(default)]
    pub max_top_holder_pct: Option<f64>,
}

impl Default for MasterSignals {
    fn default() -> Self {
        Self {
            min_velocity: Some(2),
            min_volume_sol: Some(5.0),
            min_progress_pct: None,
            max_top_holder_pct: None,
        }
    }
}

impl MasterSignals {
    pub fn enabled_count(&self) -> usize {
        [
            self.min_velocity.is_some(),
            self.min_volume_sol.is_some(),
            self.min_progress_pct.is_some(),
            self.max_top_holder_pct.is_some(),
        ]
        .iter()
        .filter(|on| **on)
        .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub signals: MasterSignals,
    #[serde(default = "default_buy_amount_sol")]
    pub buy_amount_sol: f64,
    /// PnL % that arms the trailing stop
    #[serde(default = "default_trailing_activation_pct")]
    pub trailing_activation_pct: f64,
    /// Stop level (PnL %) once armed
    #[serde(default = "default_trailing_floor_pct")]
    pub trailing_floor_pct: f64,
}

// ===== Sniper =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SniperConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Only tokens younger than this are sniped
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,
    /// Slots to wait before buying
    #[serde(default)]
    pub block_delay: u32,
    #[serde(default = "default_slot_duration_ms")]
    pub slot_duration_ms: u64,
    /// Priority tip; reported only, the executor decides how to use it
    #[serde(default = "default_tip_sol")]
    pub tip_sol: f64,
    #[serde(default = "default_snipe_amount_sol")]
    pub snipe_amount_sol: f64,
}

impl SniperConfig {
    pub fn entry_delay_ms(&self) -> u64 {
        u64::from(self.block_delay).saturating_mul(self.slot_duration_ms)
    }
}

// ===== Mirror =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Wallet whose buys are copied (base58)
    #[serde(default)]
    pub target_wallet: String,
    /// Percent of the mirrored SOL amount to buy
    #[serde(default = "default_copy_percent")]
    pub copy_percent: f64,
}

// ===== Safety exit =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyExitConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Positions held longer than this are candidates for exit
    #[serde(default = "default_time_limit_min")]
    pub time_limit_min: f64,
    /// Fewer effective holders than this fails the concentration check
    #[serde(default = "default_min_holders")]
    pub min_holders: u32,
}

impl SafetyExitConfig {
    pub fn time_limit_ms(&self) -> u64 {
        (self.time_limit_min * 60_000.0).max(0.0) as u64
    }

    /// Top holder share above which the token counts as too concentrated
    pub fn max_top_holder_pct(&self) -> f64 {
        100.0 / f64::from(self.min_holders.max(1))
    }
}

// ===== Whale =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_whale_threshold_sol")]
    pub whale_threshold_sol: f64,
    #[serde(default = "default_buy_amount_sol")]
    pub buy_amount_sol: f64,
}

// ===== Milestone =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_entry_progress_pct")]
    pub entry_progress_pct: f64,
    #[serde(default = "default_exit_progress_pct")]
    pub exit_progress_pct: f64,
    #[serde(default = "default_buy_amount_sol")]
    pub buy_amount_sol: f64,
}

// ===== Scalp =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
}

// Default value functions
fn default_buy_amount_sol() -> f64 { 0.5 }
fn default_trailing_activation_pct() -> f64 { 15.0 }
fn default_trailing_floor_pct() -> f64 { 10.0 }
fn default_max_age_ms() -> u64 { 2_000 }
fn default_slot_duration_ms() -> u64 { 400 }
fn default_tip_sol() -> f64 { 0.01 }
fn default_snipe_amount_sol() -> f64 { 0.1 }
fn default_copy_percent() -> f64 { 100.0 }
fn default_time_limit_min() -> f64 { 5.0 }
fn default_min_holders() -> u32 { 20 }
fn default_whale_threshold_sol() -> f64 { 50.0 }
fn default_entry_progress_pct() -> f64 { 90.0 }
fn default_exit_progress_pct() -> f64 { 99.0 }
fn default_take_profit_pct() -> f64 { 15.0 }
fn default_stop_loss_pct() -> f64 { 10.0 }

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            signals: MasterSignals::default(),
            buy_amount_sol: default_buy_amount_sol(),
            trailing_activation_pct: default_trailing_activation_pct(),
            trailing_floor_pct: default_trailing_floor_pct(),
        }
    }
}

impl Default for SniperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_age_ms: default_max_age_ms(),
            block_delay: 0,
            slot_duration_ms: default_slot_duration_ms(),
            tip_sol: default_tip_sol(),
            snipe_amount_sol: default_snipe_amount_sol(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_wallet: String::new(),
            copy_percent: default_copy_percent(),
        }
    }
}

impl Default for SafetyExitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time_limit_min: default_time_limit_min(),
            min_holders: default_min_holders(),
        }
    }
}

impl Default for WhaleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            whale_threshold_sol: default_whale_threshold_sol(),
            buy_amount_sol: default_buy_amount_sol(),
        }
    }
}

impl Default for MilestoneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            entry_progress_pct: default_entry_progress_pct(),
            exit_progress_pct: default_exit_progress_pct(),
            buy_amount_sol: default_buy_amount_sol(),
        }
    }
}

impl Default for ScalpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            take_profit_pct: default_take_profit_pct(),
            stop_loss_pct: default_stop_loss_pct(),
        }
    }
}

/// Per-bot configuration, tagged by strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    Master(MasterConfig),
    Sniper(SniperConfig),
    Mirror(MirrorConfig),
    SafetyExit(SafetyExitConfig),
    Whale(WhaleConfig),
    Milestone(MilestoneConfig),
    Scalp(ScalpConfig),
}

impl StrategyConfig {
    /// Disabled default configuration for `id`
    pub fn default_for(id: StrategyId) -> Self {
        match id {
            StrategyId::Master => StrategyConfig::Master(MasterConfig::default()),
            StrategyId::Sniper => StrategyConfig::Sniper(SniperConfig::default()),
            StrategyId::Mirror => StrategyConfig::Mirror(MirrorConfig::default()),
            StrategyId::SafetyExit => StrategyConfig::SafetyExit(SafetyExitConfig::default()),
            StrategyId::Whale => StrategyConfig::Whale(WhaleConfig::default()),
            StrategyId::Milestone => StrategyConfig::Milestone(MilestoneConfig::default()),
            StrategyId::Scalp => StrategyConfig::Scalp(ScalpConfig::default()),
        }
    }

    pub fn id(&self) -> StrategyId {
        match self {
            StrategyConfig::Master(_) => StrategyId::Master,
            StrategyConfig::Sniper(_) => StrategyId::Sniper,
            StrategyConfig::Mirror(_) => StrategyId::Mirror,
            StrategyConfig::SafetyExit(_) => StrategyId::SafetyExit,
            StrategyConfig::Whale(_) => StrategyId::Whale,
            StrategyConfig::Milestone(_) => StrategyId::Milestone,
            StrategyConfig::Scalp(_) => StrategyId::Scalp,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            StrategyConfig::Master(c) => c.enabled,
            StrategyConfig::Sniper(c) => c.enabled,
            StrategyConfig::Mirror(c) => c.enabled,
            StrategyConfig::SafetyExit(c) => c.enabled,
            StrategyConfig::Whale(c) => c.enabled,
            StrategyConfig::Milestone(c) => c.enabled,
            StrategyConfig::Scalp(c) => c.enabled,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        match self {
            StrategyConfig::Master(c) => c.enabled = enabled,
            StrategyConfig::Sniper(c) => c.enabled = enabled,
            StrategyConfig::Mirror(c) => c.enabled = enabled,
            StrategyConfig::SafetyExit(c) => c.enabled = enabled,
            StrategyConfig::Whale(c) => c.enabled = enabled,
            StrategyConfig::Milestone(c) => c.enabled = enabled,
            StrategyConfig::Scalp(c) => c.enabled = enabled,
        }
    }

    /// One-line description of the thresholds, for status output
    pub fn describe(&self) -> String {
        match self {
            StrategyConfig::Master(c) => format!(
                "velocity>{:?} volume>{:?} progress>={:?} top_holder<={:?} buy={} SOL trail {}%->{}%",
                c.signals.min_velocity,
                c.signals.min_volume_sol,
                c.signals.min_progress_pct,
                c.signals.max_top_holder_pct,
                c.buy_amount_sol,
                c.trailing_activation_pct,
                c.trailing_floor_pct
            ),
            StrategyConfig::Sniper(c) => format!(
                "age<{}ms delay={}ms buy={} SOL tip={} SOL",
                c.max_age_ms,
                c.entry_delay_ms(),
                c.snipe_amount_sol,
                c.tip_sol
            ),
            StrategyConfig::Mirror(c) => format!(
                "target={} copy={}%",
                if c.target_wallet.is_empty() { "<unset>" } else { c.target_wallet.as_str() },
                c.copy_percent
            ),
            StrategyConfig::SafetyExit(c) => format!(
                "hold>{}min top_holder>{:.1}%",
                c.time_limit_min,
                c.max_top_holder_pct()
            ),
            StrategyConfig::Whale(c) => format!(
                "buy>={} SOL buy={} SOL",
                c.whale_threshold_sol, c.buy_amount_sol
            ),
            StrategyConfig::Milestone(c) => format!(
                "entry>={}% exit>={}% buy={} SOL",
                c.entry_progress_pct, c.exit_progress_pct, c.buy_amount_sol
            ),
            StrategyConfig::Scalp(c) => format!(
                "tp>={}% sl<=-{}%",
                c.take_profit_pct, c.stop_loss_pct
            ),
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        let id = self.id();
        let invalid = |message: String| StrategyConfigError::InvalidValue {
            strategy: id,
            message,
        };
        let check_amount = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(invalid(format!("{} must be > 0, got {}", name, value)))
            }
        };

        match self {
            StrategyConfig::Master(c) => {
                check_amount("buy_amount_sol", c.buy_amount_sol)?;
                if c.signals.enabled_count() == 0 {
                    return Err(invalid("at least one signal must be enabled".to_string()));
                }
                if c.trailing_floor_pct > c.trailing_activation_pct {
                    return Err(invalid(format!(
                        "trailing_floor_pct ({}) must be <= trailing_activation_pct ({})",
                        c.trailing_floor_pct, c.trailing_activation_pct
                    )));
                }
            }
            StrategyConfig::Sniper(c) => {
                check_amount("snipe_amount_sol", c.snipe_amount_sol)?;
                if c.max_age_ms == 0 {
                    return Err(invalid("max_age_ms must be > 0".to_string()));
                }
                if c.tip_sol < 0.0 {
                    return Err(invalid(format!("tip_sol must be >= 0, got {}", c.tip_sol)));
                }
            }
            StrategyConfig::Mirror(c) => {
                if c.copy_percent <= 0.0 || c.copy_percent > 1_000.0 {
                    return Err(invalid(format!(
                        "copy_percent must be 0-1000, got {}",
                        c.copy_percent
                    )));
                }
                if !c.target_wallet.is_empty() {
                    let decoded = bs58::decode(&c.target_wallet)
                        .into_vec()
                        .map_err(|e| invalid(format!("target_wallet is not base58: {}", e)))?;
                    if decoded.len() != 32 {
                        return Err(invalid(format!(
                            "target_wallet must decode to 32 bytes, got {}",
                            decoded.len()
                        )));
                    }
                }
            }
            StrategyConfig::SafetyExit(c) => {
                if c.time_limit_min < 0.0 || !c.time_limit_min.is_finite() {
                    return Err(invalid(format!(
                        "time_limit_min must be >= 0, got {}",
                        c.time_limit_min
                    )));
                }
                if c.min_holders == 0 {
                    return Err(invalid("min_holders must be > 0".to_string()));
                }
            }
            StrategyConfig::Whale(c) => {
                check_amount("whale_threshold_sol", c.whale_threshold_sol)?;
                check_amount("buy_amount_sol", c.buy_amount_sol)?;
            }
            StrategyConfig::Milestone(c) => {
                check_amount("buy_amount_sol", c.buy_amount_sol)?;
                if !(0.0..=100.0).contains(&c.entry_progress_pct)
                    || !(0.0..=100.0).contains(&c.exit_progress_pct)
                {
                    return Err(invalid("progress percentages must be 0-100".to_string()));
                }
                if c.exit_progress_pct <= c.entry_progress_pct {
                    return Err(invalid(format!(
                        "exit_progress_pct ({}) must be > entry_progress_pct ({})",
                        c.exit_progress_pct, c.entry_progress_pct
                    )));
                }
            }
            StrategyConfig::Scalp(c) => {
                check_amount("take_profit_pct", c.take_profit_pct)?;
                if c.stop_loss_pct <= 0.0 || c.stop_loss_pct > 100.0 {
                    return Err(invalid(format!(
                        "stop_loss_pct must be 0-100, got {}",
                        c.stop_loss_pct
                    )));
                }
            }
        }
        Ok(())
    }
}
