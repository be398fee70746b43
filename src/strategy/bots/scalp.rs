//! Scalp: fixed take-profit and stop-loss on every open position.

use super::{ensure_finite, exit_scope, EvalContext, StrategyError};
use crate::strategy::config::{ScalpConfig, StrategyId};
use crate::strategy::intent::{ExitReason, TradeIntent};

pub(super) fn evaluate(
    config: &ScalpConfig,
    ctx: &mut EvalContext<'_>,
) -> Result<Vec<TradeIntent>, StrategyError> {
    let mut intents = Vec::new();
    for (mint, view) in exit_scope(ctx.state, ctx.trigger, ctx.now_ms) {
        let pnl = ensure_finite("pnl_percent", &mint, view.pnl_percent)?;
        let reason = if pnl >= config.take_profit_pct {
            ExitReason::ScalpTakeProfit
        } else if pnl <= -config.stop_loss_pct {
            ExitReason::ScalpStopLoss
        } else {
            continue;
        };
        intents.push(TradeIntent::sell_all(StrategyId::Scalp, view.id, reason));
    }
    Ok(intents)
}
