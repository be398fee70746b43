//! Whale: follow any single buy at or above the whale threshold.

use tracing::debug;

use super::{ensure_finite, EvalContext, StrategyError, Trigger};
use crate::strategy::config::{StrategyId, WhaleConfig};
use crate::strategy::dedup::DedupKey;
use crate::strategy::intent::TradeIntent;

pub(super) fn evaluate(
    config: &WhaleConfig,
    ctx: &mut EvalContext<'_>,
) -> Result<Vec<TradeIntent>, StrategyError> {
    let Trigger::Trade(trade) = ctx.trigger else {
        return Ok(Vec::new());
    };
    if !trade.is_buy {
        return Ok(Vec::new());
    }
    let sol = ensure_finite("sol_amount", &trade.mint, trade.sol_amount)?;
    if sol < config.whale_threshold_sol || ctx.state.token(&trade.mint).is_none() {
        return Ok(Vec::new());
    }
    if !ctx
        .dedup
        .check_and_insert(DedupKey::per_trade(StrategyId::Whale, &trade.mint, trade.timestamp_ms))
    {
        return Ok(Vec::new());
    }

    debug!("{:.1} SOL buy on {} by {}", sol, trade.mint, trade.trader_key);
    Ok(vec![TradeIntent::buy(StrategyId::Whale, &trade.mint, config.buy_amount_sol)])
}
