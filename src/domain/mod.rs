//! Domain Layer - Core market and ledger logic
//!
//! Pure types and state with no I/O. All external interactions happen
//! through the ports layer.
//!
//! - `token`: launched tokens, trade events and curve snapshots
//! - `position`: a single position and its PnL math
//! - `ledger`: balance plus open positions, buys and partial/full sells
//! - `market_state`: the shared store read by strategies and written by the runtime

pub mod token;
pub mod position;
pub mod ledger;
pub mod market_state;

pub use token::{CurveParams, CurveSnapshot, Token, TradeEvent, DEFAULT_SOL_PRICE_USD, DEFAULT_TOTAL_SUPPLY};
pub use position::{Position, PositionError, PositionId};
pub use ledger::{LedgerError, LedgerStats, PositionLedger, SellOutcome};
pub use market_state::{
    ConnectionStatus, MarketState, MarketStateConfig, MarketSummary, SharedMarketState,
    Telemetry, TokenInsert, TradingMode,
};
