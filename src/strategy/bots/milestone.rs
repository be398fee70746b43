//! Milestone: ride the last stretch of the bonding curve. Enter once progress
//! reaches the entry mark, exit when it reaches the exit mark.

use tracing::debug;

use super::{exit_scope, EvalContext, StrategyError, Trigger};
use crate::strategy::config::{MilestoneConfig, StrategyId};
use crate::strategy::dedup::DedupKey;
use crate::strategy::intent::{ExitReason, TradeIntent};

pub(super) fn evaluate(
    config: &MilestoneConfig,
    ctx: &mut EvalContext<'_>,
) -> Result<Vec<TradeIntent>, StrategyError> {
    let mut intents = Vec::new();
    let trigger = ctx.trigger;

    if let Trigger::TokenCreated(mint) | Trigger::CurveUpdate(mint) = trigger {
        let progress = ctx.state.token(mint).map(|t| t.bonding_curve_progress);
        if let Some(progress) = progress {
            // past the exit mark there is nothing left to ride
            if progress >= config.entry_progress_pct
                && progress < config.exit_progress_pct
                && ctx.dedup.check_and_insert(DedupKey::per_token(StrategyId::Milestone, mint))
            {
                debug!("{} at {:.1}% progress", mint, progress);
                intents.push(TradeIntent::buy(StrategyId::Milestone, mint, config.buy_amount_sol));
            }
        }
    }

    for (mint, view) in exit_scope(ctx.state, trigger, ctx.now_ms) {
        if view.progress >= config.exit_progress_pct {
            debug!("{} on {} reached {:.1}%", view.id, mint, view.progress);
            intents.push(TradeIntent::sell_all(
                StrategyId::Milestone,
                view.id,
                ExitReason::MilestoneExit,
            ));
        }
    }

    Ok(intents)
}
