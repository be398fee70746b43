//! Market Feed Transport Port
//!
//! A duplex text-message connection to the market data source. The feed
//! client owns reconnection and decoding; transports only move frames.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Connection closed: {0}")]
    Closed(String),
}

/// Dials new sessions
#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn FeedSession>, TransportError>;
}

/// One open connection
#[async_trait]
pub trait FeedSession: Send {
    /// Send a text frame
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next text frame. `None` means the remote closed the stream.
    /// Must be cancel safe: it is polled inside `select!`.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the session; errors are ignored
    async fn close(&mut self);
}
