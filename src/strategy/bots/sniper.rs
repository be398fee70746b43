//! Sniper: buy brand-new tokens while they are still young enough.

use std::time::Duration;

use tracing::debug;

use super::{EvalContext, StrategyError, Trigger};
use crate::strategy::config::{SniperConfig, StrategyId};
use crate::strategy::dedup::DedupKey;
use crate::strategy::intent::TradeIntent;

pub(super) fn evaluate(
    config: &SniperConfig,
    ctx: &mut EvalContext<'_>,
) -> Result<Vec<TradeIntent>, StrategyError> {
    let Trigger::TokenCreated(mint) = ctx.trigger else {
        return Ok(Vec::new());
    };
    let Some(token) = ctx.state.token(mint) else {
        return Ok(Vec::new());
    };

    let age = token.age_ms(ctx.now_ms);
    if age >= config.max_age_ms {
        debug!("{} too old ({}ms)", token.label(), age);
        return Ok(Vec::new());
    }
    if !ctx.dedup.check_and_insert(DedupKey::per_token(StrategyId::Sniper, mint)) {
        return Ok(Vec::new());
    }

    let delay = Duration::from_millis(config.entry_delay_ms());
    debug!(
        "Sniping {} at {}ms old, delay {:?}, tip {} SOL",
        mint, age, delay, config.tip_sol
    );
    Ok(vec![
        TradeIntent::buy(StrategyId::Sniper, mint, config.snipe_amount_sol).delayed(delay),
    ])
}
