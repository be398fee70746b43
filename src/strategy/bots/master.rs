//! Master strategy: enter when every enabled signal agrees, exit on a
//! trailing stop that arms once the position is far enough in profit.

use tracing::{debug, info};

use super::{ensure_finite, exit_scope, EvalContext, StrategyError, Trigger};
use crate::domain::MarketState;
use crate::strategy::config::{MasterConfig, StrategyId};
use crate::strategy::dedup::DedupKey;
use crate::strategy::intent::{ExitReason, TradeIntent};

pub(super) fn evaluate(
    config: &MasterConfig,
    ctx: &mut EvalContext<'_>,
) -> Result<Vec<TradeIntent>, StrategyError> {
    let mut intents = Vec::new();
    let trigger = ctx.trigger;
    let now_ms = ctx.now_ms;

    match trigger {
        Trigger::TokenCreated(mint) | Trigger::CurveUpdate(mint) => {
            intents.extend(entry(config, ctx, mint, now_ms));
        }
        // velocity is judged as of the trade itself, not the flush that delivered it
        Trigger::Trade(trade) => {
            intents.extend(entry(config, ctx, &trade.mint, trade.timestamp_ms));
        }
        Trigger::Periodic => {}
    }

    for (mint, view) in exit_scope(ctx.state, trigger, now_ms) {
        let pnl = ensure_finite("pnl_percent", &mint, view.pnl_percent)?;
        if pnl >= config.trailing_activation_pct
            && ctx.state.raise_trailing_stop(view.id, config.trailing_floor_pct)
        {
            info!(
                "Trailing stop armed on {} at {:.1}% (pnl {:.1}%)",
                view.id, config.trailing_floor_pct, pnl
            );
        }
        if let Some(stop) = ctx.state.trailing_stop(view.id) {
            if pnl < stop {
                intents.push(TradeIntent::sell_all(
                    StrategyId::Master,
                    view.id,
                    ExitReason::MasterTrailing,
                ));
            }
        }
    }

    Ok(intents)
}

fn entry(config: &MasterConfig, ctx: &mut EvalContext<'_>, mint: &str, at_ms: u64) -> Option<TradeIntent> {
    if !signals_pass(config, ctx.state, mint, at_ms) {
        return None;
    }
    if !ctx.dedup.check_and_insert(DedupKey::per_token(StrategyId::Master, mint)) {
        return None;
    }
    debug!("All signals green on {}", mint);
    Some(TradeIntent::buy(StrategyId::Master, mint, config.buy_amount_sol))
}

/// True when at least one signal is enabled and every enabled signal holds
fn signals_pass(config: &MasterConfig, state: &MarketState, mint: &str, at_ms: u64) -> bool {
    let signals = &config.signals;
    if signals.enabled_count() == 0 {
        return false;
    }
    let Some(token) = state.token(mint) else {
        return false;
    };

    if let Some(min) = signals.min_velocity {
        if state.trade_velocity(mint, at_ms) <= min as usize {
            return false;
        }
    }
    if let Some(min) = signals.min_volume_sol {
        if state.token_volume(mint) <= min {
            return false;
        }
    }
    if let Some(min) = signals.min_progress_pct {
        if token.bonding_curve_progress < min {
            return false;
        }
    }
    if let Some(max) = signals.max_top_holder_pct {
        if token.top_holder_percent > max {
            return false;
        }
    }
    true
}
