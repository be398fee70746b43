//! Bot Strategies
//!
//! Each bot is a function of the trigger, the market state, its own config
//! and the shared dedup set. Buys go through the dedup set before an intent is
//! emitted; sells need no dedup because a closed position is simply absent
//! from the next evaluation.

mod master;
mod milestone;
mod mirror;
mod safety_exit;
mod scalp;
mod sniper;
mod whale;

use thiserror::Error;

use super::config::StrategyConfig;
use super::dedup::DedupSet;
use super::intent::TradeIntent;
use crate::domain::{MarketState, Position, PositionId, TradeEvent};

/// State change a strategy reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// A token was added to the market state
    TokenCreated(String),
    /// A trade was recorded
    Trade(TradeEvent),
    /// Price and curve fields of a token changed
    CurveUpdate(String),
    /// Timer tick for time-based checks
    Periodic,
}

impl Trigger {
    pub fn mint(&self) -> Option<&str> {
        match self {
            Trigger::TokenCreated(mint) | Trigger::CurveUpdate(mint) => Some(mint),
            Trigger::Trade(trade) => Some(&trade.mint),
            Trigger::Periodic => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StrategyError {
    #[error("Non-finite {field} on {mint}: {value}")]
    NonFinite {
        field: &'static str,
        mint: String,
        value: f64,
    },
}

/// Everything a strategy may read or touch during one evaluation
pub struct EvalContext<'a> {
    pub trigger: &'a Trigger,
    pub state: &'a mut MarketState,
    pub dedup: &'a mut DedupSet,
    pub now_ms: u64,
}

/// Run one strategy against one trigger
pub fn evaluate(
    config: &StrategyConfig,
    ctx: &mut EvalContext<'_>,
) -> Result<Vec<TradeIntent>, StrategyError> {
    match config {
        StrategyConfig::Master(c) => master::evaluate(c, ctx),
        StrategyConfig::Sniper(c) => sniper::evaluate(c, ctx),
        StrategyConfig::Mirror(c) => mirror::evaluate(c, ctx),
        StrategyConfig::SafetyExit(c) => safety_exit::evaluate(c, ctx),
        StrategyConfig::Whale(c) => whale::evaluate(c, ctx),
        StrategyConfig::Milestone(c) => milestone::evaluate(c, ctx),
        StrategyConfig::Scalp(c) => scalp::evaluate(c, ctx),
    }
}

/// Snapshot of a position for exit checks
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExitView {
    pub id: PositionId,
    pub pnl_percent: f64,
    pub hold_ms: u64,
    pub progress: f64,
    pub top_holder_percent: f64,
}

impl ExitView {
    fn of(position: &Position, now_ms: u64) -> Self {
        Self {
            id: position.id,
            pnl_percent: position.pnl_percent,
            hold_ms: position.hold_time_ms(now_ms),
            progress: position.token.bonding_curve_progress,
            top_holder_percent: position.token.top_holder_percent,
        }
    }
}

/// Positions an exit rule should look at: the updated mint on a curve
/// update, everything on a periodic tick, nothing otherwise.
pub(crate) fn exit_scope(state: &MarketState, trigger: &Trigger, now_ms: u64) -> Vec<(String, ExitView)> {
    match trigger {
        Trigger::CurveUpdate(mint) => state
            .positions_for(mint)
            .map(|p| (p.mint().to_string(), ExitView::of(p, now_ms)))
            .collect(),
        Trigger::Periodic => state
            .positions()
            .iter()
            .map(|p| (p.mint().to_string(), ExitView::of(p, now_ms)))
            .collect(),
        Trigger::TokenCreated(_) | Trigger::Trade(_) => Vec::new(),
    }
}

pub(crate) fn ensure_finite(field: &'static str, mint: &str, value: f64) -> Result<f64, StrategyError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StrategyError::NonFinite {
            field,
            mint: mint.to_string(),
            value,
        })
    }
}
