//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - The market feed transport (WebSocket sessions)
//! - Trade execution (live buys and sells)
//! - The activity log sink
//! - Wall-clock time

pub mod clock;
pub mod executor;
pub mod feed;
pub mod log_sink;
pub mod mocks;

pub use clock::{Clock, ManualClock, SystemClock};
pub use executor::{ExecutionResult, TradeExecutor};
pub use feed::{FeedConnector, FeedSession, TransportError};
pub use log_sink::{LogSink, CATEGORY_ERROR, CATEGORY_FEED, CATEGORY_LEDGER, CATEGORY_SYSTEM};
