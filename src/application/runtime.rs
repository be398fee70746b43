//! Bot Runtime
//!
//! The single writer of the market state. Consumes feed events, feeds the
//! strategy engine and settles the resulting intents against the ledger (and
//! the trade executor in live mode).
//!
//! Triggers are evaluated in a fixed order per flush: new tokens, then trades
//! in arrival order, then one curve update per mint. A periodic tick drives
//! the time-based exits.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::adapters::pump_fun::{EventBatch, EventBatcher, FeedClient, FeedError, FeedEvent};
use crate::domain::{
    LedgerError, MarketSummary, PositionId, SellOutcome, SharedMarketState, TokenInsert,
    TradingMode,
};
use crate::ports::clock::Clock;
use crate::ports::executor::TradeExecutor;
use crate::ports::log_sink::{LogSink, CATEGORY_ERROR, CATEGORY_SYSTEM};
use crate::strategy::{
    Evaluation, ExitReason, StrategyConfig, StrategyConfigError, StrategyEngine, StrategyId,
    TradeIntent, Trigger,
};

/// Default batch flush interval, once per second
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1_000;
/// Default interval of the periodic safety tick
pub const DEFAULT_SAFETY_CHECK_INTERVAL_MS: u64 = 3_000;

/// Position source recorded for operator buys
const MANUAL_SOURCE: &str = "MANUAL";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Execution failed for {mint}: {error}")]
    Execution { mint: String, error: String },

    #[error("Strategy config error: {0}")]
    Config(#[from] StrategyConfigError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Runtime has stopped")]
    Stopped,
}

/// Runtime tuning
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// 0 applies every event as it arrives
    pub flush_interval_ms: u64,
    pub safety_check_interval_ms: u64,
    /// Subscribe to the trades of every newly created token
    pub follow_new_token_trades: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            safety_check_interval_ms: DEFAULT_SAFETY_CHECK_INTERVAL_MS,
            follow_new_token_trades: false,
        }
    }
}

/// What happened to one intent
#[derive(Debug, Clone, PartialEq)]
pub enum Executed {
    Opened(PositionId),
    Sold(SellOutcome),
    /// Sell for a position that no longer exists
    Skipped,
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

/// Operator commands accepted by the runtime task
#[derive(Debug)]
pub enum RuntimeCommand {
    UpdateStrategy(StrategyConfig, Reply<()>),
    SetStrategyEnabled(StrategyId, bool),
    SetMode(TradingMode),
    ManualBuy {
        mint: String,
        sol_amount: f64,
        reply: Reply<PositionId>,
    },
    ClosePosition {
        id: PositionId,
        percent: f64,
        reply: Reply<Executed>,
    },
    PanicSellAll(oneshot::Sender<usize>),
    ForceReconnect,
    Shutdown,
}

/// Control handle for a running [`BotRuntime`]. Cheap to clone.
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::UnboundedSender<RuntimeCommand>,
    state: SharedMarketState,
}

impl RuntimeHandle {
    /// Replace one bot's configuration. Invalid configs are rejected and the
    /// previous one stays active.
    pub async fn update_strategy(&self, config: StrategyConfig) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeCommand::UpdateStrategy(config, reply))?;
        rx.await.map_err(|_| RuntimeError::Stopped)?
    }

    pub fn set_strategy_enabled(&self, id: StrategyId, enabled: bool) -> Result<(), RuntimeError> {
        self.send(RuntimeCommand::SetStrategyEnabled(id, enabled))
    }

    pub fn set_mode(&self, mode: TradingMode) -> Result<(), RuntimeError> {
        self.send(RuntimeCommand::SetMode(mode))
    }

    pub async fn manual_buy(&self, mint: &str, sol_amount: f64) -> Result<PositionId, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeCommand::ManualBuy {
            mint: mint.to_string(),
            sol_amount,
            reply,
        })?;
        rx.await.map_err(|_| RuntimeError::Stopped)?
    }

    pub async fn close_position(&self, id: PositionId, percent: f64) -> Result<Executed, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeCommand::ClosePosition { id, percent, reply })?;
        rx.await.map_err(|_| RuntimeError::Stopped)?
    }

    /// Sell every open position; returns how many were closed
    pub async fn panic_sell_all(&self) -> Result<usize, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(RuntimeCommand::PanicSellAll(reply))?;
        rx.await.map_err(|_| RuntimeError::Stopped)
    }

    pub fn force_reconnect(&self) -> Result<(), RuntimeError> {
        self.send(RuntimeCommand::ForceReconnect)
    }

    pub fn shutdown(&self) -> Result<(), RuntimeError> {
        self.send(RuntimeCommand::Shutdown)
    }

    pub async fn summary(&self) -> MarketSummary {
        self.state.read().await.summary()
    }

    fn send(&self, command: RuntimeCommand) -> Result<(), RuntimeError> {
        self.command_tx.send(command).map_err(|_| RuntimeError::Stopped)
    }
}

pub struct BotRuntime {
    config: RuntimeConfig,
    state: SharedMarketState,
    engine: StrategyEngine,
    feed: FeedClient,
    executor: Arc<dyn TradeExecutor>,
    clock: Arc<dyn Clock>,
    log: Arc<dyn LogSink>,
    batcher: EventBatcher,
    delayed: JoinSet<TradeIntent>,
    command_rx: mpsc::UnboundedReceiver<RuntimeCommand>,
}

impl BotRuntime {
    pub fn new(
        config: RuntimeConfig,
        state: SharedMarketState,
        engine: StrategyEngine,
        feed: FeedClient,
        executor: Arc<dyn TradeExecutor>,
        clock: Arc<dyn Clock>,
        log: Arc<dyn LogSink>,
    ) -> (Self, RuntimeHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = RuntimeHandle {
            command_tx,
            state: Arc::clone(&state),
        };
        let runtime = Self {
            config,
            state,
            engine,
            feed,
            executor,
            clock,
            log,
            batcher: EventBatcher::new(),
            delayed: JoinSet::new(),
            command_rx,
        };
        (runtime, handle)
    }

    pub fn engine(&self) -> &StrategyEngine {
        &self.engine
    }

    /// Main loop. Returns when shut down or when the feed's event channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<FeedEvent>) -> Result<(), RuntimeError> {
        let flush_ms = self.config.flush_interval_ms;
        let safety_ms = self.config.safety_check_interval_ms.max(1);
        info!(
            "Starting - flush every {}ms, safety tick every {}ms, {} bot(s) enabled",
            flush_ms,
            safety_ms,
            self.engine.enabled_count()
        );
        self.log.log(CATEGORY_SYSTEM, "Bot brain online");
        self.sync_mirror_subscription();

        let flush_period = Duration::from_millis(flush_ms.max(1));
        let mut flush = interval_at(Instant::now() + flush_period, flush_period);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let safety_period = Duration::from_millis(safety_ms);
        let mut safety = interval_at(Instant::now() + safety_period, safety_period);
        safety.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) if flush_ms == 0 => self.apply_batch(EventBatch::single(event)).await,
                    Some(event) => self.batcher.push(event),
                    None => {
                        info!("Feed closed");
                        break;
                    }
                },
                _ = flush.tick(), if flush_ms > 0 => self.flush().await,
                _ = safety.tick() => self.on_periodic().await,
                Some(joined) = self.delayed.join_next(), if !self.delayed.is_empty() => match joined {
                    Ok(intent) => {
                        let _ = self.execute(intent).await;
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => warn!("Delayed intent task failed: {}", e),
                },
                command = self.command_rx.recv() => match command {
                    None | Some(RuntimeCommand::Shutdown) => break,
                    Some(command) => self.handle_command(command).await,
                },
            }
        }

        let pending = self.delayed.len();
        self.delayed.abort_all();
        if pending > 0 {
            debug!("Dropped {} delayed intent(s)", pending);
        }
        self.log.log(CATEGORY_SYSTEM, "Bot brain stopped");
        info!("Stopped");
        Ok(())
    }

    /// Apply and evaluate everything buffered since the last flush
    pub async fn flush(&mut self) {
        if self.batcher.is_empty() {
            return;
        }
        let batch = self.batcher.drain();
        self.apply_batch(batch).await;
    }

    /// Apply one batch to the store, evaluating a trigger after each change
    pub async fn apply_batch(&mut self, batch: EventBatch) {
        for token in batch.tokens {
            let mint = token.mint.clone();
            let evicted = {
                let state = Arc::clone(&self.state);
                let mut state = state.write().await;
                match state.add_token(token) {
                    TokenInsert::Duplicate => {
                        debug!("Duplicate token {}", mint);
                        continue;
                    }
                    TokenInsert::Added { evicted } => {
                        evicted.filter(|old| !state.has_position_in(&old.mint))
                    }
                }
            };
            if self.config.follow_new_token_trades {
                self.feed_command(self.feed.subscribe_token_trades(vec![mint.clone()]));
            }
            if let Some(old) = evicted {
                self.feed_command(self.feed.unsubscribe_token_trades(vec![old.mint]));
            }
            self.evaluate(Trigger::TokenCreated(mint)).await;
        }

        for trade in batch.trades {
            self.state.write().await.record_trade(&trade);
            self.evaluate(Trigger::Trade(trade)).await;
        }

        for curve in batch.curves {
            self.state.write().await.apply_curve(&curve);
            self.evaluate(Trigger::CurveUpdate(curve.mint)).await;
        }
    }

    /// Periodic tick: time-based exits and PnL checks over every position
    pub async fn on_periodic(&mut self) {
        self.evaluate(Trigger::Periodic).await;
    }

    async fn evaluate(&mut self, trigger: Trigger) {
        let now_ms = self.clock.now_ms();
        let evaluation = {
            let state = Arc::clone(&self.state);
            let mut state = state.write().await;
            self.engine.evaluate(&trigger, &mut state, now_ms)
        };
        self.dispatch(evaluation).await;
    }

    async fn dispatch(&mut self, evaluation: Evaluation) {
        for (id, error) in evaluation.errors {
            self.log.log(CATEGORY_ERROR, &format!("{} skipped: {}", id.tag(), error));
        }
        for intent in evaluation.intents {
            let delay = intent.delay();
            if delay.is_zero() {
                let _ = self.execute(intent).await;
            } else {
                debug!("{} intent delayed {:?}", intent.strategy().tag(), delay);
                self.delayed.spawn(async move {
                    tokio::time::sleep(delay).await;
                    intent
                });
            }
        }
    }

    /// Settle one intent now, ignoring its delay. Failures are reported
    /// through the log sink before being returned.
    pub async fn execute(&mut self, intent: TradeIntent) -> Result<Executed, RuntimeError> {
        match intent {
            TradeIntent::Buy {
                strategy,
                mint,
                sol_amount,
                ..
            } => self.buy(strategy.tag(), &mint, sol_amount).await.map(Executed::Opened),
            TradeIntent::Sell {
                strategy,
                position_id,
                percent,
                reason,
            } => self.sell(strategy.tag(), position_id, percent, reason).await,
        }
    }

    async fn buy(&mut self, source: &str, mint: &str, sol_amount: f64) -> Result<PositionId, RuntimeError> {
        let now_ms = self.clock.now_ms();
        let (mode, label) = {
            let state = self.state.read().await;
            let label = state
                .token(mint)
                .map(|t| t.label())
                .unwrap_or_else(|| mint.to_string());
            (state.mode(), label)
        };

        let opened = match mode {
            TradingMode::Simulated => {
                self.state
                    .write()
                    .await
                    .open_position(mint, sol_amount, source, true, now_ms)
            }
            TradingMode::Live => {
                let balance = self.state.read().await.balance();
                if sol_amount > balance {
                    Err(LedgerError::InsufficientBalance {
                        have: balance,
                        need: sol_amount,
                    })
                } else {
                    let result = self.executor.buy(mint, sol_amount).await;
                    if !result.success {
                        let error = result.error.unwrap_or_else(|| "unknown error".to_string());
                        self.log
                            .log(CATEGORY_ERROR, &format!("{} BUY {} failed: {}", source, label, error));
                        return Err(RuntimeError::Execution {
                            mint: mint.to_string(),
                            error,
                        });
                    }
                    let spent = if result.sol_amount.is_finite() && result.sol_amount > 0.0 {
                        result.sol_amount
                    } else {
                        sol_amount
                    };
                    if let Some(signature) = &result.signature {
                        debug!("{} buy {} confirmed: {}", source, mint, signature);
                    }
                    self.state
                        .write()
                        .await
                        .open_position(mint, spent, source, false, now_ms)
                }
            }
        };

        match opened {
            Ok(id) => {
                self.log
                    .log(source, &format!("BUY {} for {} SOL", label, sol_amount));
                self.feed_command(self.feed.subscribe_token_trades(vec![mint.to_string()]));
                Ok(id)
            }
            Err(e) => {
                let message = match &e {
                    LedgerError::InsufficientBalance { have, need } => format!(
                        "Insufficient balance for {} BUY {} ({} SOL needed, {:.4} SOL available)",
                        source, label, need, have
                    ),
                    other => format!("{} BUY {} rejected: {}", source, label, other),
                };
                self.log.log(CATEGORY_ERROR, &message);
                Err(e.into())
            }
        }
    }

    async fn sell(
        &mut self,
        source: &str,
        id: PositionId,
        percent: f64,
        reason: ExitReason,
    ) -> Result<Executed, RuntimeError> {
        let (mint, label, simulated) = {
            let state = self.state.read().await;
            match state.position(id) {
                Some(p) => (p.mint().to_string(), p.token.label(), p.is_simulated),
                None => {
                    debug!("{} sell for closed position {}", source, id);
                    return Ok(Executed::Skipped);
                }
            }
        };

        let proceeds = if simulated {
            None
        } else {
            let result = self.executor.sell(&mint, percent).await;
            if !result.success {
                let error = result.error.unwrap_or_else(|| "unknown error".to_string());
                self.log
                    .log(CATEGORY_ERROR, &format!("{} SELL {} failed: {}", source, label, error));
                return Err(RuntimeError::Execution { mint, error });
            }
            Some(result.sol_amount)
        };

        let (settled, released) = {
            let mut state = self.state.write().await;
            let settled = state.settle_position(id, percent, proceeds, &reason.to_string());
            // a followed token keeps its trade feed while it stays in the list
            let released = !state.has_position_in(&mint)
                && (!state.is_tracked(&mint) || !self.config.follow_new_token_trades);
            (settled, released)
        };

        match settled {
            Ok(outcome) => {
                self.log.log(
                    source,
                    &format!(
                        "SELL {:.0}% {} [{}] for {:.4} SOL | PnL {:+.4} SOL ({:+.1}%)",
                        outcome.percent,
                        label,
                        reason,
                        outcome.sol_returned,
                        outcome.realized_pnl,
                        outcome.pnl_percent
                    ),
                );
                if released {
                    self.feed_command(self.feed.unsubscribe_token_trades(vec![mint]));
                }
                Ok(Executed::Sold(outcome))
            }
            // closed by an earlier intent in the same flush
            Err(LedgerError::PositionNotFound(_)) => Ok(Executed::Skipped),
            Err(e) => {
                self.log
                    .log(CATEGORY_ERROR, &format!("{} SELL {} rejected: {}", source, label, e));
                Err(e.into())
            }
        }
    }

    async fn handle_command(&mut self, command: RuntimeCommand) {
        match command {
            RuntimeCommand::UpdateStrategy(config, reply) => {
                let id = config.id();
                let result = self.engine.update_config(config);
                match &result {
                    Ok(()) => {
                        self.log.log(CATEGORY_SYSTEM, &format!("{} config updated", id.tag()));
                        self.sync_mirror_subscription();
                    }
                    Err(e) => self.log.log(CATEGORY_ERROR, &e.to_string()),
                }
                let _ = reply.send(result.map_err(RuntimeError::from));
            }
            RuntimeCommand::SetStrategyEnabled(id, enabled) => {
                self.set_strategy_enabled(id, enabled);
            }
            RuntimeCommand::SetMode(mode) => self.set_mode(mode).await,
            RuntimeCommand::ManualBuy {
                mint,
                sol_amount,
                reply,
            } => {
                let result = self.buy(MANUAL_SOURCE, &mint, sol_amount).await;
                let _ = reply.send(result);
            }
            RuntimeCommand::ClosePosition { id, percent, reply } => {
                let result = self.sell(MANUAL_SOURCE, id, percent, ExitReason::Manual).await;
                let _ = reply.send(result);
            }
            RuntimeCommand::PanicSellAll(reply) => {
                let closed = self.panic_sell_all().await;
                let _ = reply.send(closed);
            }
            RuntimeCommand::ForceReconnect => self.feed_command(self.feed.force_reconnect()),
            RuntimeCommand::Shutdown => {}
        }
    }

    /// Enable or disable a bot, logging only actual changes
    pub fn set_strategy_enabled(&mut self, id: StrategyId, enabled: bool) -> bool {
        let changed = self.engine.set_enabled(id, enabled);
        if changed {
            let word = if enabled { "ACTIVATED" } else { "DEACTIVATED" };
            info!("{} {}", id.tag(), word);
            self.log.log(CATEGORY_SYSTEM, &format!("{} {}", id.tag(), word));
            if id == StrategyId::Mirror {
                self.sync_mirror_subscription();
            }
        }
        changed
    }

    pub async fn set_mode(&mut self, mode: TradingMode) {
        let mut state = self.state.write().await;
        if state.mode() == mode {
            return;
        }
        state.set_mode(mode);
        let message = match mode {
            TradingMode::Live => "Switched to LIVE mode",
            TradingMode::Simulated => "Switched to SIMULATION mode",
        };
        warn!("{}", message);
        self.log.log(CATEGORY_SYSTEM, message);
    }

    /// Sell 100% of every open position
    pub async fn panic_sell_all(&mut self) -> usize {
        let ids: Vec<PositionId> = self.state.read().await.positions().iter().map(|p| p.id).collect();
        warn!("Panic sell of {} position(s)", ids.len());
        self.log
            .log(CATEGORY_SYSTEM, &format!("PANIC SELL ALL ({} positions)", ids.len()));

        let mut closed = 0;
        for id in ids {
            if let Ok(Executed::Sold(_)) = self.sell("PANIC", id, 100.0, ExitReason::Panic).await {
                closed += 1;
            }
        }
        closed
    }

    /// Follow the mirror target's trades while the mirror bot is enabled
    fn sync_mirror_subscription(&self) {
        if let Some(StrategyConfig::Mirror(mirror)) = self.engine.config(StrategyId::Mirror) {
            if mirror.enabled && !mirror.target_wallet.is_empty() {
                self.feed_command(
                    self.feed
                        .subscribe_account_trades(vec![mirror.target_wallet.clone()]),
                );
            }
        }
    }

    fn feed_command(&self, result: Result<(), FeedError>) {
        if let Err(e) = result {
            warn!("Feed command dropped: {}", e);
        }
    }
}
