//! Mirror: copy buys placed by one target wallet.

use tracing::debug;

use super::{ensure_finite, EvalContext, StrategyError, Trigger};
use crate::strategy::config::{MirrorConfig, StrategyId};
use crate::strategy::dedup::DedupKey;
use crate::strategy::intent::TradeIntent;

pub(super) fn evaluate(
    config: &MirrorConfig,
    ctx: &mut EvalContext<'_>,
) -> Result<Vec<TradeIntent>, StrategyError> {
    let Trigger::Trade(trade) = ctx.trigger else {
        return Ok(Vec::new());
    };
    // exact match: base58 is case sensitive
    if config.target_wallet.is_empty() || !trade.is_buy || trade.trader_key != config.target_wallet {
        return Ok(Vec::new());
    }
    if ctx.state.token(&trade.mint).is_none() {
        return Ok(Vec::new());
    }

    let sol = ensure_finite("sol_amount", &trade.mint, trade.sol_amount)?;
    let amount = sol * config.copy_percent / 100.0;
    if amount <= 0.0 {
        return Ok(Vec::new());
    }
    if !ctx
        .dedup
        .check_and_insert(DedupKey::per_trade(StrategyId::Mirror, &trade.mint, trade.timestamp_ms))
    {
        return Ok(Vec::new());
    }

    debug!("Copying {:.3} SOL buy on {}", sol, trade.mint);
    Ok(vec![TradeIntent::buy(StrategyId::Mirror, &trade.mint, amount)])
}
