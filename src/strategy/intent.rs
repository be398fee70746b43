//! Trade Intents
//!
//! What strategies ask the runtime to do. Intents carry no execution state;
//! the runtime settles them against the ledger (and the executor in live mode).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::StrategyId;
use crate::domain::PositionId;

/// Why a position is being sold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    MasterTrailing,
    SafetyExit,
    MilestoneExit,
    ScalpTakeProfit,
    ScalpStopLoss,
    Manual,
    Panic,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ExitReason::MasterTrailing => "MASTER-TRAILING",
            ExitReason::SafetyExit => "SAFETY-EXIT",
            ExitReason::MilestoneExit => "MILESTONE-EXIT",
            ExitReason::ScalpTakeProfit => "SCALP-TP",
            ExitReason::ScalpStopLoss => "SCALP-SL",
            ExitReason::Manual => "MANUAL",
            ExitReason::Panic => "PANIC",
        };
        write!(f, "{}", tag)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeIntent {
    Buy {
        strategy: StrategyId,
        mint: String,
        sol_amount: f64,
        /// Wait this long before executing
        delay: Duration,
    },
    Sell {
        strategy: StrategyId,
        position_id: PositionId,
        percent: f64,
        reason: ExitReason,
    },
}

impl TradeIntent {
    pub fn buy(strategy: StrategyId, mint: &str, sol_amount: f64) -> Self {
        TradeIntent::Buy {
            strategy,
            mint: mint.to_string(),
            sol_amount,
            delay: Duration::ZERO,
        }
    }

    pub fn sell_all(strategy: StrategyId, position_id: PositionId, reason: ExitReason) -> Self {
        TradeIntent::Sell {
            strategy,
            position_id,
            percent: 100.0,
            reason,
        }
    }

    /// Delay the intent (buys only)
    pub fn delayed(self, by: Duration) -> Self {
        match self {
            TradeIntent::Buy {
                strategy,
                mint,
                sol_amount,
                ..
            } => TradeIntent::Buy {
                strategy,
                mint,
                sol_amount,
                delay: by,
            },
            sell => sell,
        }
    }

    pub fn strategy(&self) -> StrategyId {
        match self {
            TradeIntent::Buy { strategy, .. } | TradeIntent::Sell { strategy, .. } => *strategy,
        }
    }

    pub fn delay(&self) -> Duration {
        match self {
            TradeIntent::Buy { delay, .. } => *delay,
            TradeIntent::Sell { .. } => Duration::ZERO,
        }
    }
}
