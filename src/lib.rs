//! pump-brain - Multi-strategy bot brain for pump.fun bonding-curve launches
//!
//! # Modules
//!
//! - `domain`: Core state (Token, Position, PositionLedger, MarketState)
//! - `ports`: Trait abstractions (FeedConnector, TradeExecutor, LogSink, Clock)
//! - `strategy`: The seven bots, their configs and the StrategyEngine
//! - `adapters`: External implementations (PumpPortal feed, log sinks, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: The BotRuntime that ties everything together

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;
