//! Strategy Engine
//!
//! Holds one config per bot, the shared dedup set, and runs every enabled bot
//! against each trigger. A failing bot is logged and skipped; the others still
//! run on the same trigger.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::bots::{self, EvalContext, StrategyError, Trigger};
use super::config::{StrategyConfig, StrategyConfigError, StrategyId};
use super::dedup::DedupSet;
use super::intent::TradeIntent;
use crate::domain::MarketState;

/// Result of running all bots on one trigger
#[derive(Debug, Default)]
pub struct Evaluation {
    pub intents: Vec<TradeIntent>,
    pub errors: Vec<(StrategyId, StrategyError)>,
}

/// Running counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub evaluations: u64,
    pub intents: u64,
    pub errors: u64,
}

pub struct StrategyEngine {
    configs: BTreeMap<StrategyId, StrategyConfig>,
    dedup: DedupSet,
    stats: EngineStats,
}

impl StrategyEngine {
    /// Build from the configured bots. Bots not listed get their disabled
    /// defaults, so every strategy always has a config.
    pub fn new(
        configs: impl IntoIterator<Item = StrategyConfig>,
        dedup_capacity: usize,
    ) -> Result<Self, StrategyConfigError> {
        let mut map: BTreeMap<StrategyId, StrategyConfig> = StrategyId::ALL
            .iter()
            .map(|id| (*id, StrategyConfig::default_for(*id)))
            .collect();
        for config in configs {
            config.validate()?;
            map.insert(config.id(), config);
        }

        for config in map.values().filter(|c| c.enabled()) {
            info!(strategy = config.id().tag(), "Enabled: {}", config.describe());
        }

        Ok(Self {
            configs: map,
            dedup: DedupSet::new(dedup_capacity),
            stats: EngineStats::default(),
        })
    }

    pub fn config(&self, id: StrategyId) -> Option<&StrategyConfig> {
        self.configs.get(&id)
    }

    /// All configs in strategy order
    pub fn configs(&self) -> impl Iterator<Item = &StrategyConfig> {
        self.configs.values()
    }

    pub fn enabled_count(&self) -> usize {
        self.configs.values().filter(|c| c.enabled()).count()
    }

    /// Replace a bot's config. The old config stays on validation failure.
    pub fn update_config(&mut self, config: StrategyConfig) -> Result<(), StrategyConfigError> {
        config.validate()?;
        info!(strategy = config.id().tag(), "Config updated: {}", config.describe());
        self.configs.insert(config.id(), config);
        Ok(())
    }

    /// Flip a bot on or off. Returns whether anything changed.
    pub fn set_enabled(&mut self, id: StrategyId, enabled: bool) -> bool {
        match self.configs.get_mut(&id) {
            Some(config) if config.enabled() != enabled => {
                config.set_enabled(enabled);
                true
            }
            _ => false,
        }
    }

    pub fn dedup(&self) -> &DedupSet {
        &self.dedup
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Run every enabled bot on `trigger`, in strategy order
    pub fn evaluate(&mut self, trigger: &Trigger, state: &mut MarketState, now_ms: u64) -> Evaluation {
        let mut evaluation = Evaluation::default();
        self.stats.evaluations += 1;

        for config in self.configs.values().filter(|c| c.enabled()) {
            let mut ctx = EvalContext {
                trigger,
                state: &mut *state,
                dedup: &mut self.dedup,
                now_ms,
            };
            match bots::evaluate(config, &mut ctx) {
                Ok(intents) => {
                    if !intents.is_empty() {
                        debug!(strategy = config.id().tag(), "{} intent(s) on {:?}", intents.len(), trigger);
                    }
                    evaluation.intents.extend(intents);
                }
                Err(e) => {
                    warn!(strategy = config.id().tag(), "Evaluation failed: {}", e);
                    self.stats.errors += 1;
                    evaluation.errors.push((config.id(), e));
                }
            }
        }

        self.stats.intents += evaluation.intents.len() as u64;
        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurveSnapshot, MarketStateConfig, Token, TradeEvent};
    use crate::strategy::config::{MirrorConfig, ScalpConfig, WhaleConfig};
    use crate::strategy::dedup::DEFAULT_DEDUP_CAPACITY;
    use crate::strategy::intent::ExitReason;

    fn whale_trade(sol: f64, ts: u64) -> TradeEvent {
        TradeEvent {
            mint: "mintA".into(),
            trader_key: "whale".into(),
            sol_amount: sol,
            is_buy: true,
            timestamp_ms: ts,
        }
    }

    fn state_with_token() -> MarketState {
        let mut state = MarketState::new(MarketStateConfig::default());
        let mut token = Token::new("mintA", "AAA", "Token A");
        token.market_cap_sol = 30.0;
        state.add_token(token);
        state
    }

    #[test]
    fn test_missing_bots_get_disabled_defaults() {
        let engine = StrategyEngine::new(Vec::new(), DEFAULT_DEDUP_CAPACITY).unwrap();
        assert_eq!(engine.configs().count(), StrategyId::ALL.len());
        assert_eq!(engine.enabled_count(), 0);
    }

    #[test]
    fn test_disabled_bots_emit_nothing() {
        let mut engine = StrategyEngine::new(Vec::new(), DEFAULT_DEDUP_CAPACITY).unwrap();
        let mut state = state_with_token();

        let eval = engine.evaluate(&Trigger::Trade(whale_trade(100.0, 1)), &mut state, 1);
        assert!(eval.intents.is_empty());
        assert_eq!(engine.stats().evaluations, 1);
    }

    #[test]
    fn test_toggle_and_evaluate() {
        let mut engine = StrategyEngine::new(Vec::new(), DEFAULT_DEDUP_CAPACITY).unwrap();
        let mut state = state_with_token();

        assert!(engine.set_enabled(StrategyId::Whale, true));
        assert!(!engine.set_enabled(StrategyId::Whale, true));

        let eval = engine.evaluate(&Trigger::Trade(whale_trade(100.0, 1)), &mut state, 1);
        assert_eq!(eval.intents, vec![TradeIntent::buy(StrategyId::Whale, "mintA", 0.5)]);
        assert_eq!(engine.dedup().len(), 1);
    }

    #[test]
    fn test_invalid_update_keeps_old_config() {
        let mut engine = StrategyEngine::new(
            vec![StrategyConfig::Whale(WhaleConfig {
                enabled: true,
                ..WhaleConfig::default()
            })],
            DEFAULT_DEDUP_CAPACITY,
        )
        .unwrap();

        let bad = StrategyConfig::Mirror(MirrorConfig {
            enabled: true,
            target_wallet: "not-a-wallet".into(),
            copy_percent: 100.0,
        });
        assert!(engine.update_config(bad).is_err());
        assert_eq!(
            engine.config(StrategyId::Mirror),
            Some(&StrategyConfig::default_for(StrategyId::Mirror))
        );
    }

    #[test]
    fn test_failing_bot_does_not_block_others() {
        let mut engine = StrategyEngine::new(
            vec![
                StrategyConfig::Whale(WhaleConfig {
                    enabled: true,
                    ..WhaleConfig::default()
                }),
                StrategyConfig::Scalp(ScalpConfig {
                    enabled: true,
                    ..ScalpConfig::default()
                }),
            ],
            DEFAULT_DEDUP_CAPACITY,
        )
        .unwrap();
        let mut state = state_with_token();

        // NaN trade size breaks the whale bot only
        let eval = engine.evaluate(&Trigger::Trade(whale_trade(f64::NAN, 1)), &mut state, 1);
        assert_eq!(eval.errors.len(), 1);
        assert_eq!(eval.errors[0].0, StrategyId::Whale);
        assert_eq!(engine.stats().errors, 1);

        // scalp still runs afterwards
        let id = state.open_position("mintA", 1.0, "MANUAL", true, 1).unwrap();
        state.apply_curve(&CurveSnapshot::market_cap("mintA", 40.0));
        let eval = engine.evaluate(&Trigger::CurveUpdate("mintA".into()), &mut state, 2);
        assert_eq!(
            eval.intents,
            vec![TradeIntent::sell_all(StrategyId::Scalp, id, ExitReason::ScalpTakeProfit)]
        );
    }
}
