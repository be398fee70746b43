//! Safety exit: dump positions held too long on tokens whose supply is too
//! concentrated in one wallet.

use tracing::debug;

use super::{exit_scope, EvalContext, StrategyError, Trigger};
use crate::strategy::config::{SafetyExitConfig, StrategyId};
use crate::strategy::intent::{ExitReason, TradeIntent};

pub(super) fn evaluate(
    config: &SafetyExitConfig,
    ctx: &mut EvalContext<'_>,
) -> Result<Vec<TradeIntent>, StrategyError> {
    if !matches!(ctx.trigger, Trigger::Periodic) {
        return Ok(Vec::new());
    }
    let limit_ms = config.time_limit_ms();
    let max_top = config.max_top_holder_pct();

    let intents = exit_scope(ctx.state, ctx.trigger, ctx.now_ms)
        .into_iter()
        .filter(|(_, view)| view.hold_ms > limit_ms && view.top_holder_percent > max_top)
        .map(|(mint, view)| {
            debug!(
                "{} on {} held {}s, top holder {:.1}% > {:.1}%",
                view.id,
                mint,
                view.hold_ms / 1000,
                view.top_holder_percent,
                max_top
            );
            TradeIntent::sell_all(StrategyId::SafetyExit, view.id, ExitReason::SafetyExit)
        })
        .collect();
    Ok(intents)
}
