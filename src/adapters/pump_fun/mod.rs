//! Pump.fun Adapter
//!
//! Live market feed from the PumpPortal data socket.
//!
//! # Overview
//!
//! Pump.fun launches tokens on a bonding curve. The data socket at
//! `wss://pumpportal.fun/api/data` streams:
//! - New token creations (`subscribeNewToken`)
//! - Trades on specific mints (`subscribeTokenTrade`)
//! - Trades by specific wallets (`subscribeAccountTrade`)
//!
//! Subscription frames are JSON objects with a `method` and an optional
//! `keys` array.
//!
//! # Layout
//!
//! - `client`: connection state machine, reconnect and resubscription
//! - `backoff`: reconnect delay schedule
//! - `types`: wire frames and the decoder
//! - `batcher`: buffers decoded events between runtime flushes
//! - `transport`: tokio-tungstenite implementation of the feed port

mod backoff;
mod batcher;
mod client;
mod transport;
mod types;

pub use backoff::{ReconnectBackoff, DEFAULT_RECONNECT_BASE_MS, DEFAULT_RECONNECT_MAX_MS};
pub use batcher::{EventBatch, EventBatcher};
pub use client::{FeedClient, FeedConfig, FeedConfigBuilder, FeedError};
pub use transport::{WsConnector, WsSession};
pub use types::{
    DecodeError, FeedDecoder, FeedEvent, FeedMessage, FeedMessageKind, SubscribeMessage,
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_WS_URL,
};
