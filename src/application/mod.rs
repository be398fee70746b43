//! Application Layer - Wires the feed, market state, strategies and executor

pub mod runtime;

pub use runtime::{
    BotRuntime, Executed, RuntimeCommand, RuntimeConfig, RuntimeError, RuntimeHandle,
    DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_SAFETY_CHECK_INTERVAL_MS,
};
