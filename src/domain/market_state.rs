//! Market State Store
//!
//! Single source of truth shared by the feed client, the strategy engine and
//! the runtime: known tokens (newest first, bounded), per-token trade velocity
//! and buy volume, the position ledger, master trailing stops, and connection
//! telemetry.
//!
//! Shared as [`SharedMarketState`]. Ledger mutation only happens from the bot
//! runtime task, each step under one write lock.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::ledger::{LedgerError, LedgerStats, PositionLedger, SellOutcome};
use super::position::{Position, PositionId};
use super::token::{CurveParams, CurveSnapshot, Token, TradeEvent};

/// Default number of tokens kept in memory
pub const DEFAULT_TOKEN_CAP: usize = 100;
/// Default rolling window for trade velocity
pub const DEFAULT_VELOCITY_WINDOW_MS: u64 = 1_000;

pub type SharedMarketState = Arc<RwLock<MarketState>>;

/// Feed connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Initializing,
    Connecting,
    Online,
    Error,
    Offline,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Initializing => "INITIALIZING",
            ConnectionStatus::Connecting => "CONNECTING",
            ConnectionStatus::Online => "ONLINE",
            ConnectionStatus::Error => "ERROR",
            ConnectionStatus::Offline => "OFFLINE",
        };
        write!(f, "{}", label)
    }
}

/// Whether intents are settled by the ledger alone or sent to an executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    #[default]
    Simulated,
    Live,
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Simulated => write!(f, "SIMULATION"),
            TradingMode::Live => write!(f, "LIVE"),
        }
    }
}

/// Connection telemetry written by the feed client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub status: ConnectionStatus,
    /// Dial-to-open time of the last successful connection
    pub latency_ms: Option<u64>,
    pub packets_received: u64,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Initializing,
            latency_ms: None,
            packets_received: 0,
            retry_count: 0,
            last_error: None,
        }
    }
}

/// Store tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketStateConfig {
    pub token_cap: usize,
    pub velocity_window_ms: u64,
    pub curve: CurveParams,
    pub starting_balance: f64,
    pub mode: TradingMode,
}

impl Default for MarketStateConfig {
    fn default() -> Self {
        Self {
            token_cap: DEFAULT_TOKEN_CAP,
            velocity_window_ms: DEFAULT_VELOCITY_WINDOW_MS,
            curve: CurveParams::default(),
            starting_balance: 100.0,
            mode: TradingMode::Simulated,
        }
    }
}

/// Outcome of [`MarketState::add_token`]
#[derive(Debug, Clone, PartialEq)]
pub enum TokenInsert {
    Added { evicted: Option<Token> },
    Duplicate,
}

/// Point-in-time view for status output
#[derive(Debug, Clone, Serialize)]
pub struct MarketSummary {
    pub status: ConnectionStatus,
    pub latency_ms: Option<u64>,
    pub packets_received: u64,
    pub mode: TradingMode,
    pub tokens_tracked: usize,
    pub open_positions: usize,
    pub balance_sol: f64,
    pub unrealized_pnl_sol: f64,
    pub stats: LedgerStats,
}

#[derive(Debug)]
pub struct MarketState {
    config: MarketStateConfig,
    tokens: VecDeque<Token>,
    velocity: HashMap<String, VecDeque<u64>>,
    volumes: HashMap<String, f64>,
    ledger: PositionLedger,
    trailing_stops: HashMap<PositionId, f64>,
    telemetry: Telemetry,
    mode: TradingMode,
    latest_trade: Option<TradeEvent>,
}

impl MarketState {
    pub fn new(config: MarketStateConfig) -> Self {
        Self {
            ledger: PositionLedger::new(config.starting_balance),
            mode: config.mode,
            config,
            tokens: VecDeque::new(),
            velocity: HashMap::new(),
            volumes: HashMap::new(),
            trailing_stops: HashMap::new(),
            telemetry: Telemetry::default(),
            latest_trade: None,
        }
    }

    pub fn shared(config: MarketStateConfig) -> SharedMarketState {
        Arc::new(RwLock::new(Self::new(config)))
    }

    pub fn config(&self) -> &MarketStateConfig {
        &self.config
    }

    // ---- tokens ----

    /// Insert a new token at the front, evicting the oldest beyond the cap
    pub fn add_token(&mut self, token: Token) -> TokenInsert {
        if self.tokens.iter().any(|t| t.mint == token.mint) {
            return TokenInsert::Duplicate;
        }
        self.tokens.push_front(token);

        let mut evicted = None;
        if self.tokens.len() > self.config.token_cap {
            if let Some(old) = self.tokens.pop_back() {
                if !self.ledger.has_position_in(&old.mint) {
                    self.velocity.remove(&old.mint);
                    self.volumes.remove(&old.mint);
                }
                debug!("Evicted token {} ({})", old.symbol, old.mint);
                evicted = Some(old);
            }
        }
        TokenInsert::Added { evicted }
    }

    /// Known tokens, newest first
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Look up a token in the list, falling back to an open position's snapshot
    pub fn token(&self, mint: &str) -> Option<&Token> {
        self.tokens
            .iter()
            .find(|t| t.mint == mint)
            .or_else(|| {
                self.ledger
                    .positions()
                    .iter()
                    .find(|p| p.mint() == mint)
                    .map(|p| &p.token)
            })
    }

    pub fn latest_token(&self) -> Option<&Token> {
        self.tokens.front()
    }

    // ---- trades ----

    /// Record a trade into the velocity window and buy volume. Trades on mints
    /// that are neither tracked nor held are ignored so the aggregates stay bounded.
    pub fn record_trade(&mut self, trade: &TradeEvent) {
        self.latest_trade = Some(trade.clone());
        if !self.is_watched(&trade.mint) {
            return;
        }

        let window = self.config.velocity_window_ms;
        let stamps = self.velocity.entry(trade.mint.clone()).or_default();
        stamps.retain(|ts| trade.timestamp_ms.saturating_sub(*ts) < window);
        stamps.push_back(trade.timestamp_ms);

        if trade.is_buy {
            *self.volumes.entry(trade.mint.clone()).or_insert(0.0) += trade.sol_amount;
        }
    }

    /// In the token list (open-position snapshots don't count)
    pub fn is_tracked(&self, mint: &str) -> bool {
        self.tokens.iter().any(|t| t.mint == mint)
    }

    /// Tracked in the token list or backing an open position
    pub fn is_watched(&self, mint: &str) -> bool {
        self.is_tracked(mint) || self.ledger.has_position_in(mint)
    }

    /// Trades on `mint` inside the velocity window ending at `now_ms`
    pub fn trade_velocity(&self, mint: &str, now_ms: u64) -> usize {
        let window = self.config.velocity_window_ms;
        self.velocity
            .get(mint)
            .map(|stamps| {
                stamps
                    .iter()
                    .filter(|ts| now_ms.saturating_sub(**ts) < window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Cumulative buy SOL on `mint`
    pub fn token_volume(&self, mint: &str) -> f64 {
        self.volumes.get(mint).copied().unwrap_or(0.0)
    }

    pub fn latest_trade(&self) -> Option<&TradeEvent> {
        self.latest_trade.as_ref()
    }

    /// Apply a curve snapshot to the token and every position on it.
    /// Returns the number of positions re-marked.
    pub fn apply_curve(&mut self, curve: &CurveSnapshot) -> usize {
        let params = self.config.curve;
        let mut refreshed = None;
        if let Some(token) = self.tokens.iter_mut().find(|t| t.mint == curve.mint) {
            token.apply_curve(curve, &params);
            refreshed = Some(token.clone());
        }

        match refreshed {
            Some(token) => self.ledger.refresh_token(&token),
            None => {
                for position in self.ledger.positions_mut().filter(|p| p.token.mint == curve.mint) {
                    position.token.apply_curve(curve, &params);
                }
            }
        }
        self.ledger.update_price(&curve.mint, curve.market_cap_sol)
    }

    // ---- positions ----

    pub fn update_position_price(&mut self, mint: &str, price: f64) -> usize {
        self.ledger.update_price(mint, price)
    }

    /// Open a position on a known token. Balance check and debit happen together.
    pub fn open_position(
        &mut self,
        mint: &str,
        sol_amount: f64,
        source: &str,
        is_simulated: bool,
        now_ms: u64,
    ) -> Result<PositionId, LedgerError> {
        let token = self
            .token(mint)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownToken(mint.to_string()))?;
        self.ledger.open(token, sol_amount, source, is_simulated, now_ms)
    }

    /// Sell `percent` of a position; `reason` is recorded in the debug log only
    pub fn close_position(
        &mut self,
        id: PositionId,
        percent: f64,
        reason: &str,
    ) -> Result<SellOutcome, LedgerError> {
        self.settle_position(id, percent, None, reason)
    }

    /// Sell with executor-reported proceeds (live mode)
    pub fn settle_position(
        &mut self,
        id: PositionId,
        percent: f64,
        proceeds: Option<f64>,
        reason: &str,
    ) -> Result<SellOutcome, LedgerError> {
        let outcome = self.ledger.settle_sell(id, percent, proceeds)?;
        if outcome.closed {
            self.trailing_stops.remove(&id);
            if !self.is_watched(&outcome.mint) {
                self.velocity.remove(&outcome.mint);
                self.volumes.remove(&outcome.mint);
            }
        }
        debug!("{}: closed {:.0}% of {}", reason, outcome.percent, id);
        Ok(outcome)
    }

    pub fn positions(&self) -> &[Position] {
        self.ledger.positions()
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.ledger.position(id)
    }

    pub fn positions_for<'a>(&'a self, mint: &'a str) -> impl Iterator<Item = &'a Position> + 'a {
        self.ledger.positions_for(mint)
    }

    /// Distinct mints backing open positions
    pub fn open_mints(&self) -> Vec<String> {
        let mut mints: Vec<String> = Vec::new();
        for position in self.ledger.positions() {
            if !mints.iter().any(|m| m == position.mint()) {
                mints.push(position.mint().to_string());
            }
        }
        mints
    }

    pub fn has_position_in(&self, mint: &str) -> bool {
        self.ledger.has_position_in(mint)
    }

    pub fn balance(&self) -> f64 {
        self.ledger.balance()
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    // ---- trailing stops ----

    pub fn trailing_stop(&self, id: PositionId) -> Option<f64> {
        self.trailing_stops.get(&id).copied()
    }

    /// Raise the stop for `id` to `stop_pct`. Never lowers an existing stop.
    pub fn raise_trailing_stop(&mut self, id: PositionId, stop_pct: f64) -> bool {
        let current = self.trailing_stops.entry(id).or_insert(f64::NEG_INFINITY);
        if stop_pct > *current {
            *current = stop_pct;
            true
        } else {
            false
        }
    }

    // ---- mode & telemetry ----

    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TradingMode) {
        self.mode = mode;
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn set_connection_status(&mut self, status: ConnectionStatus) {
        self.telemetry.status = status;
    }

    pub fn record_connected(&mut self, latency_ms: u64) {
        self.telemetry.status = ConnectionStatus::Online;
        self.telemetry.latency_ms = Some(latency_ms);
        self.telemetry.retry_count = 0;
        self.telemetry.last_error = None;
    }

    pub fn record_connection_error(&mut self, error: impl Into<String>, retry_count: u32) {
        self.telemetry.status = ConnectionStatus::Error;
        self.telemetry.retry_count = retry_count;
        self.telemetry.last_error = Some(error.into());
    }

    pub fn record_packet(&mut self) {
        self.telemetry.packets_received += 1;
    }

    pub fn summary(&self) -> MarketSummary {
        MarketSummary {
            status: self.telemetry.status,
            latency_ms: self.telemetry.latency_ms,
            packets_received: self.telemetry.packets_received,
            mode: self.mode,
            tokens_tracked: self.tokens.len(),
            open_positions: self.ledger.positions().len(),
            balance_sol: self.ledger.balance(),
            unrealized_pnl_sol: self.ledger.unrealized_pnl(),
            stats: self.ledger.stats().clone(),
        }
    }
}

impl Default for MarketState {
    fn default() -> Self {
        Self::new(MarketStateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn token(mint: &str, mcap: f64) -> Token {
        let mut token = Token::new(mint, mint.to_uppercase(), mint);
        token.market_cap_sol = mcap;
        token
    }

    fn trade(mint: &str, sol: f64, is_buy: bool, ts: u64) -> TradeEvent {
        TradeEvent {
            mint: mint.to_string(),
            trader_key: "trader".to_string(),
            sol_amount: sol,
            is_buy,
            timestamp_ms: ts,
        }
    }

    fn state_with_cap(cap: usize) -> MarketState {
        MarketState::new(MarketStateConfig {
            token_cap: cap,
            ..MarketStateConfig::default()
        })
    }

    #[test]
    fn test_add_token_newest_first() {
        let mut state = MarketState::default();
        state.add_token(token("a", 1.0));
        state.add_token(token("b", 1.0));

        let mints: Vec<&str> = state.tokens().map(|t| t.mint.as_str()).collect();
        assert_eq!(mints, vec!["b", "a"]);
        assert_eq!(state.latest_token().unwrap().mint, "b");
    }

    #[test]
    fn test_add_duplicate_token() {
        let mut state = MarketState::default();
        state.add_token(token("a", 1.0));
        assert_eq!(state.add_token(token("a", 2.0)), TokenInsert::Duplicate);
        assert_eq!(state.token_count(), 1);
        assert_eq!(state.token("a").unwrap().market_cap_sol, 1.0);
    }

    #[test]
    fn test_token_cap_evicts_oldest() {
        let mut state = state_with_cap(2);
        state.add_token(token("a", 1.0));
        state.record_trade(&trade("a", 1.0, true, 0));
        state.add_token(token("b", 1.0));

        match state.add_token(token("c", 1.0)) {
            TokenInsert::Added { evicted: Some(old) } => assert_eq!(old.mint, "a"),
            other => panic!("expected eviction, got {:?}", other),
        }
        assert_eq!(state.token_count(), 2);
        assert!(state.token("a").is_none());
        assert_eq!(state.token_volume("a"), 0.0);
    }

    #[test]
    fn test_evicted_token_kept_for_open_position() {
        let mut state = state_with_cap(1);
        state.add_token(token("a", 1.0));
        state.open_position("a", 1.0, "MANUAL", true, 0).unwrap();
        state.record_trade(&trade("a", 2.0, true, 0));
        state.add_token(token("b", 1.0));

        assert_eq!(state.token("a").unwrap().mint, "a");
        assert_relative_eq!(state.token_volume("a"), 2.0);
    }

    #[test]
    fn test_velocity_window() {
        let mut state = MarketState::default();
        state.add_token(token("a", 1.0));
        state.record_trade(&trade("a", 0.1, true, 1_000));
        state.record_trade(&trade("a", 0.1, false, 1_400));
        state.record_trade(&trade("a", 0.1, true, 1_900));

        assert_eq!(state.trade_velocity("a", 1_900), 3);
        // 1000 drops out at exactly one window later
        assert_eq!(state.trade_velocity("a", 2_000), 2);
        assert_eq!(state.trade_velocity("a", 2_500), 1);
        assert_eq!(state.trade_velocity("a", 3_000), 0);
        assert_eq!(state.trade_velocity("unknown", 0), 0);
    }

    #[test]
    fn test_record_trade_prunes_stale_entries() {
        let mut state = MarketState::default();
        state.add_token(token("a", 1.0));
        for ts in 0..50 {
            state.record_trade(&trade("a", 0.1, true, ts * 100));
        }
        assert_eq!(state.velocity.get("a").unwrap().len(), 10);
    }

    #[test]
    fn test_volume_counts_buys_only() {
        let mut state = MarketState::default();
        state.add_token(token("a", 1.0));
        state.record_trade(&trade("a", 2.0, true, 0));
        state.record_trade(&trade("a", 5.0, false, 0));
        state.record_trade(&trade("a", 1.5, true, 0));
        assert_relative_eq!(state.token_volume("a"), 3.5);
        assert_eq!(state.latest_trade().unwrap().sol_amount, 1.5);
    }

    #[test]
    fn test_untracked_trades_leave_no_aggregates() {
        let mut state = MarketState::default();
        for i in 0..1_000 {
            state.record_trade(&trade(&format!("ghost{}", i), 1.0, true, i));
        }
        assert!(state.velocity.is_empty());
        assert!(state.volumes.is_empty());
        assert_eq!(state.token_volume("ghost7"), 0.0);
        assert_eq!(state.latest_trade().unwrap().mint, "ghost999");
    }

    #[test]
    fn test_aggregates_dropped_when_last_position_on_evicted_token_closes() {
        let mut state = state_with_cap(1);
        state.add_token(token("a", 1.0));
        let first = state.open_position("a", 1.0, "MANUAL", true, 0).unwrap();
        let second = state.open_position("a", 1.0, "MANUAL", true, 0).unwrap();
        state.add_token(token("b", 1.0));

        // evicted but still held: keeps aggregating
        state.record_trade(&trade("a", 2.0, true, 10));
        assert_relative_eq!(state.token_volume("a"), 2.0);

        state.close_position(first, 100.0, "TEST").unwrap();
        assert_relative_eq!(state.token_volume("a"), 2.0);

        state.close_position(second, 100.0, "TEST").unwrap();
        assert!(!state.velocity.contains_key("a"));
        assert!(!state.volumes.contains_key("a"));

        state.record_trade(&trade("a", 2.0, true, 20));
        assert_eq!(state.token_volume("a"), 0.0);
    }

    #[test]
    fn test_open_position_unknown_token() {
        let mut state = MarketState::default();
        let result = state.open_position("ghost", 1.0, "MANUAL", true, 0);
        assert_eq!(result, Err(LedgerError::UnknownToken("ghost".to_string())));
    }

    #[test]
    fn test_apply_curve_updates_token_and_positions() {
        let mut state = MarketState::default();
        state.add_token(token("a", 1.0));
        let id = state.open_position("a", 1.0, "MANUAL", true, 0).unwrap();

        let touched = state.apply_curve(&CurveSnapshot {
            mint: "a".to_string(),
            market_cap_sol: 1.5,
            v_sol_in_curve: Some(40.0),
            v_tokens_in_curve: Some(100_000_000.0),
        });

        assert_eq!(touched, 1);
        let position = state.position(id).unwrap();
        assert_relative_eq!(position.pnl_percent, 50.0);
        assert_relative_eq!(position.token.bonding_curve_progress, 90.0, epsilon = 1e-9);
        assert_relative_eq!(state.token("a").unwrap().market_cap_usd, 262.5);
    }

    #[test]
    fn test_apply_curve_after_eviction_updates_snapshot() {
        let mut state = state_with_cap(1);
        state.add_token(token("a", 1.0));
        let id = state.open_position("a", 1.0, "MANUAL", true, 0).unwrap();
        state.add_token(token("b", 1.0));

        state.apply_curve(&CurveSnapshot {
            mint: "a".to_string(),
            market_cap_sol: 2.0,
            v_sol_in_curve: None,
            v_tokens_in_curve: Some(0.0),
        });

        let position = state.position(id).unwrap();
        assert_relative_eq!(position.pnl_percent, 100.0);
        assert_relative_eq!(position.token.bonding_curve_progress, 100.0);
    }

    #[test]
    fn test_trailing_stop_monotonic() {
        let mut state = MarketState::default();
        let id = PositionId(1);
        assert!(state.trailing_stop(id).is_none());
        assert!(state.raise_trailing_stop(id, 10.0));
        assert!(!state.raise_trailing_stop(id, 5.0));
        assert_eq!(state.trailing_stop(id), Some(10.0));
        assert!(state.raise_trailing_stop(id, 12.0));
        assert_eq!(state.trailing_stop(id), Some(12.0));
    }

    #[test]
    fn test_closing_position_drops_trailing_stop() {
        let mut state = MarketState::default();
        state.add_token(token("a", 1.0));
        let id = state.open_position("a", 1.0, "MASTER", true, 0).unwrap();
        state.raise_trailing_stop(id, 10.0);

        state.close_position(id, 100.0, "TEST").unwrap();
        assert!(state.trailing_stop(id).is_none());
        assert!(state.open_mints().is_empty());
    }

    #[test]
    fn test_open_mints_distinct() {
        let mut state = MarketState::default();
        state.add_token(token("a", 1.0));
        state.add_token(token("b", 1.0));
        state.open_position("a", 1.0, "MANUAL", true, 0).unwrap();
        state.open_position("a", 1.0, "MANUAL", true, 0).unwrap();
        state.open_position("b", 1.0, "MANUAL", true, 0).unwrap();
        assert_eq!(state.open_mints(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_telemetry_transitions() {
        let mut state = MarketState::default();
        assert_eq!(state.telemetry().status, ConnectionStatus::Initializing);

        state.record_connection_error("refused", 2);
        assert_eq!(state.telemetry().status, ConnectionStatus::Error);
        assert_eq!(state.telemetry().retry_count, 2);

        state.record_connected(42);
        state.record_packet();
        let telemetry = state.telemetry();
        assert_eq!(telemetry.status, ConnectionStatus::Online);
        assert_eq!(telemetry.latency_ms, Some(42));
        assert_eq!(telemetry.retry_count, 0);
        assert_eq!(telemetry.packets_received, 1);
        assert!(telemetry.last_error.is_none());
    }

    #[test]
    fn test_summary() {
        let mut state = MarketState::default();
        state.add_token(token("a", 1.0));
        state.open_position("a", 10.0, "MANUAL", true, 0).unwrap();
        state.update_position_price("a", 1.1);

        let summary = state.summary();
        assert_eq!(summary.mode, TradingMode::Simulated);
        assert_eq!(summary.open_positions, 1);
        assert_relative_eq!(summary.balance_sol, 90.0);
        assert_relative_eq!(summary.unrealized_pnl_sol, 1.0, epsilon = 1e-9);
    }
}
