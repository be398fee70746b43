//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Pump.fun: PumpPortal WebSocket feed client, decoder and batcher
//! - Executor: placeholder trade executor for live runs
//! - Log sink: tracing and in-memory activity logs
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod executor;
pub mod log_sink;
pub mod pump_fun;

pub use cli::CliApp;
pub use executor::PlaceholderExecutor;
pub use log_sink::{LogEntry, MemoryLogSink, TracingLogSink, DEFAULT_LOG_CAPACITY};
pub use pump_fun::{FeedClient, FeedConfig, WsConnector};
