//! Pump.fun Feed Client
//!
//! Keeps one WebSocket session to the PumpPortal data socket alive, decodes
//! its frames and forwards market events to the runtime.
//!
//! The connection is an explicit state machine driven by one task:
//!
//! ```text
//! Idle ──connect──▶ Connecting ──open──▶ Online
//!   ▲                  │  ▲                │
//!   │            fail  ▼  │ timer     close│
//!   └──disconnect── Waiting ◀──────────────┘
//! ```
//!
//! `Waiting` owns the only reconnect timer; leaving it for any reason drops the
//! timer. Intentional disconnects go straight to `Idle` and never schedule a
//! reconnect. When `max_reconnect_attempts` is exhausted the client parks in
//! `Idle` until `force_reconnect()`.
//!
//! # Example
//! ```ignore
//! let (client, mut events) = FeedClient::new(config, connector, state, clock, log);
//! tokio::spawn({
//!     let client = client.clone();
//!     async move { client.run().await }
//! });
//! client.connect()?;
//! while let Some(event) = events.recv().await {
//!     // apply to the market state
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::backoff::{ReconnectBackoff, DEFAULT_RECONNECT_BASE_MS, DEFAULT_RECONNECT_MAX_MS};
use super::types::{DecodeError, FeedDecoder, FeedEvent, SubscribeMessage, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_WS_URL};
use crate::domain::{ConnectionStatus, CurveParams, SharedMarketState};
use crate::ports::clock::Clock;
use crate::ports::feed::{FeedConnector, FeedSession, TransportError};
use crate::ports::log_sink::{LogSink, CATEGORY_FEED};

/// Default dial timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Consecutive receive errors tolerated before the session is dropped
const MAX_CONSECUTIVE_RECV_ERRORS: u32 = 3;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeedError {
    #[error("Feed client has stopped")]
    ChannelClosed,

    #[error("Feed client is already running")]
    AlreadyRunning,
}

/// Configuration for [`FeedClient`]
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub ws_url: String,
    /// Send `subscribeNewToken` on every open
    pub subscribe_new_tokens: bool,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    /// 0 = unlimited
    pub max_reconnect_attempts: u32,
    pub connect_timeout: Duration,
    pub max_message_size: usize,
    /// Event channel buffer size
    pub channel_buffer_size: usize,
    pub curve: CurveParams,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            subscribe_new_tokens: true,
            reconnect_base_ms: DEFAULT_RECONNECT_BASE_MS,
            reconnect_max_ms: DEFAULT_RECONNECT_MAX_MS,
            max_reconnect_attempts: 0,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            channel_buffer_size: 1000,
            curve: CurveParams::default(),
        }
    }
}

/// Builder for [`FeedConfig`]
#[derive(Debug, Default)]
pub struct FeedConfigBuilder {
    config: FeedConfig,
}

impl FeedConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.config.ws_url = url.into();
        self
    }

    pub fn subscribe_new_tokens(mut self, enabled: bool) -> Self {
        self.config.subscribe_new_tokens = enabled;
        self
    }

    pub fn reconnect_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.config.reconnect_base_ms = base_ms;
        self.config.reconnect_max_ms = max_ms;
        self
    }

    /// Set maximum reconnection attempts (0 = unlimited)
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.config.max_message_size = bytes;
        self
    }

    pub fn channel_buffer_size(mut self, size: usize) -> Self {
        self.config.channel_buffer_size = size;
        self
    }

    pub fn curve(mut self, curve: CurveParams) -> Self {
        self.config.curve = curve;
        self
    }

    pub fn build(self) -> FeedConfig {
        self.config
    }
}

/// Commands accepted by the client task
#[derive(Debug, Clone, PartialEq)]
enum FeedCommand {
    Connect,
    Disconnect,
    ForceReconnect,
    SubscribeTokenTrades(Vec<String>),
    UnsubscribeTokenTrades(Vec<String>),
    SubscribeAccountTrades(Vec<String>),
    Shutdown,
}

/// Where the state machine goes next
enum Phase {
    Idle,
    Connecting,
    Online(Box<dyn FeedSession>),
    Waiting(Duration),
    Stopped,
}

/// Mints and wallets to (re)subscribe on every open
#[derive(Debug, Default)]
struct Subscriptions {
    token_trades: BTreeSet<String>,
    accounts: BTreeSet<String>,
}

/// Handle to the feed task. Cheap to clone; every clone drives the same task.
#[derive(Clone)]
pub struct FeedClient {
    command_tx: mpsc::UnboundedSender<FeedCommand>,
    status_rx: watch::Receiver<ConnectionStatus>,
    worker: Arc<Mutex<Option<FeedWorker>>>,
}

impl FeedClient {
    /// Create a client and the receiver for its events. Nothing happens until
    /// [`run`](Self::run) is spawned and [`connect`](Self::connect) is called.
    pub fn new(
        config: FeedConfig,
        connector: Arc<dyn FeedConnector>,
        state: SharedMarketState,
        clock: Arc<dyn Clock>,
        log: Arc<dyn LogSink>,
    ) -> (Self, mpsc::Receiver<FeedEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size.max(1));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Initializing);

        let worker = FeedWorker {
            decoder: FeedDecoder::new(config.curve, config.max_message_size),
            backoff: ReconnectBackoff::new(config.reconnect_base_ms, config.reconnect_max_ms),
            config,
            connector,
            state,
            clock,
            log,
            event_tx,
            command_rx,
            status_tx,
            subscriptions: Subscriptions::default(),
        };

        let client = Self {
            command_tx,
            status_rx,
            worker: Arc::new(Mutex::new(Some(worker))),
        };
        (client, event_rx)
    }

    /// Run the client task until shutdown. Only the first call runs.
    pub async fn run(&self) -> Result<(), FeedError> {
        let worker = self.worker.lock().await.take().ok_or(FeedError::AlreadyRunning)?;
        worker.run().await;
        Ok(())
    }

    /// Open the connection. No-op while connecting or online.
    pub fn connect(&self) -> Result<(), FeedError> {
        self.send(FeedCommand::Connect)
    }

    /// Close the connection without reconnecting. Idempotent.
    pub fn disconnect(&self) -> Result<(), FeedError> {
        self.send(FeedCommand::Disconnect)
    }

    /// Drop any session or pending timer and dial again now
    pub fn force_reconnect(&self) -> Result<(), FeedError> {
        self.send(FeedCommand::ForceReconnect)
    }

    /// Follow trades on `mints`, now and after every reconnect
    pub fn subscribe_token_trades(&self, mints: Vec<String>) -> Result<(), FeedError> {
        if mints.is_empty() {
            return Ok(());
        }
        self.send(FeedCommand::SubscribeTokenTrades(mints))
    }

    pub fn unsubscribe_token_trades(&self, mints: Vec<String>) -> Result<(), FeedError> {
        if mints.is_empty() {
            return Ok(());
        }
        self.send(FeedCommand::UnsubscribeTokenTrades(mints))
    }

    /// Follow trades placed by `accounts`
    pub fn subscribe_account_trades(&self, accounts: Vec<String>) -> Result<(), FeedError> {
        if accounts.is_empty() {
            return Ok(());
        }
        self.send(FeedCommand::SubscribeAccountTrades(accounts))
    }

    /// Stop the task; the event channel closes afterwards
    pub fn shutdown(&self) -> Result<(), FeedError> {
        self.send(FeedCommand::Shutdown)
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch connection status changes
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    fn send(&self, command: FeedCommand) -> Result<(), FeedError> {
        self.command_tx.send(command).map_err(|_| FeedError::ChannelClosed)
    }
}

/// The task side of the client
struct FeedWorker {
    config: FeedConfig,
    connector: Arc<dyn FeedConnector>,
    state: SharedMarketState,
    clock: Arc<dyn Clock>,
    log: Arc<dyn LogSink>,
    decoder: FeedDecoder,
    backoff: ReconnectBackoff,
    event_tx: mpsc::Sender<FeedEvent>,
    command_rx: mpsc::UnboundedReceiver<FeedCommand>,
    status_tx: watch::Sender<ConnectionStatus>,
    subscriptions: Subscriptions,
}

impl FeedWorker {
    async fn run(mut self) {
        info!("Client started for {}", self.config.ws_url);
        let mut phase = Phase::Idle;
        loop {
            phase = match phase {
                Phase::Idle => self.idle().await,
                Phase::Connecting => self.connecting().await,
                Phase::Online(session) => self.online(session).await,
                Phase::Waiting(delay) => self.waiting(delay).await,
                Phase::Stopped => break,
            };
        }
        self.set_status(ConnectionStatus::Offline).await;
        info!("Client stopped");
    }

    async fn idle(&mut self) -> Phase {
        match self.command_rx.recv().await {
            None | Some(FeedCommand::Shutdown) => Phase::Stopped,
            Some(FeedCommand::Connect) => Phase::Connecting,
            Some(FeedCommand::ForceReconnect) => {
                self.backoff.reset();
                Phase::Connecting
            }
            Some(FeedCommand::Disconnect) => Phase::Idle,
            Some(other) => {
                self.track(&other);
                Phase::Idle
            }
        }
    }

    async fn connecting(&mut self) -> Phase {
        self.set_status(ConnectionStatus::Connecting).await;
        self.log.log(CATEGORY_FEED, "Establishing uplink...");

        let connector = Arc::clone(&self.connector);
        let url = self.config.ws_url.clone();
        let timeout = self.config.connect_timeout;
        let started = Instant::now();
        let dial = tokio::time::timeout(timeout, connector.connect(&url));
        tokio::pin!(dial);

        loop {
            tokio::select! {
                result = &mut dial => {
                    return match result {
                        Ok(Ok(session)) => {
                            let latency = started.elapsed();
                            self.opened(session, latency).await
                        }
                        Ok(Err(e)) => self.connection_lost(&e.to_string()).await,
                        Err(_) => {
                            self.connection_lost(&format!("connect timed out after {:?}", timeout)).await
                        }
                    };
                }
                command = self.command_rx.recv() => match command {
                    None | Some(FeedCommand::Shutdown) => return Phase::Stopped,
                    Some(FeedCommand::Disconnect) => return self.went_offline().await,
                    Some(FeedCommand::ForceReconnect) => {
                        self.backoff.reset();
                        return Phase::Connecting;
                    }
                    Some(FeedCommand::Connect) => debug!("Already connecting"),
                    Some(other) => {
                        self.track(&other);
                    }
                },
            }
        }
    }

    async fn online(&mut self, mut session: Box<dyn FeedSession>) -> Phase {
        let mut recv_errors = 0u32;
        loop {
            tokio::select! {
                frame = session.recv() => match frame {
                    Some(Ok(text)) => {
                        recv_errors = 0;
                        if !self.on_frame(&text).await {
                            session.close().await;
                            return Phase::Stopped;
                        }
                    }
                    Some(Err(e)) => {
                        recv_errors += 1;
                        warn!("Receive error: {}", e);
                        if recv_errors >= MAX_CONSECUTIVE_RECV_ERRORS {
                            session.close().await;
                            return self.connection_lost(&e.to_string()).await;
                        }
                    }
                    None => return self.connection_lost("connection closed by remote").await,
                },
                command = self.command_rx.recv() => match command {
                    None | Some(FeedCommand::Shutdown) => {
                        session.close().await;
                        return Phase::Stopped;
                    }
                    Some(FeedCommand::Disconnect) => {
                        session.close().await;
                        return self.went_offline().await;
                    }
                    Some(FeedCommand::ForceReconnect) => {
                        info!("Force reconnect");
                        self.log.log(CATEGORY_FEED, "FORCE RECONNECT initiated...");
                        session.close().await;
                        self.backoff.reset();
                        return Phase::Connecting;
                    }
                    Some(FeedCommand::Connect) => debug!("Already online"),
                    Some(other) => {
                        if let Some(message) = self.track(&other) {
                            if let Err(e) = send_message(session.as_mut(), &message).await {
                                session.close().await;
                                return self.connection_lost(&e.to_string()).await;
                            }
                        }
                    }
                },
            }
        }
    }

    async fn waiting(&mut self, delay: Duration) -> Phase {
        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => return Phase::Connecting,
                command = self.command_rx.recv() => match command {
                    None | Some(FeedCommand::Shutdown) => return Phase::Stopped,
                    Some(FeedCommand::Disconnect) => return self.went_offline().await,
                    Some(FeedCommand::ForceReconnect) => {
                        self.backoff.reset();
                        return Phase::Connecting;
                    }
                    Some(FeedCommand::Connect) => debug!("Reconnect already scheduled"),
                    Some(other) => {
                        self.track(&other);
                    }
                },
            }
        }
    }

    /// Session is open: reset backoff, record telemetry and (re)subscribe
    async fn opened(&mut self, mut session: Box<dyn FeedSession>, latency: Duration) -> Phase {
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.backoff.reset();

        let mut mints: BTreeSet<String> = {
            let mut state = self.state.write().await;
            state.record_connected(latency_ms);
            state.open_mints().into_iter().collect()
        };
        let _ = self.status_tx.send(ConnectionStatus::Online);
        info!("Connected to {} in {}ms", self.config.ws_url, latency_ms);
        self.log
            .log(CATEGORY_FEED, &format!("SYSTEM ONLINE | Latency: {}ms", latency_ms));

        let mut messages = Vec::new();
        if self.config.subscribe_new_tokens {
            messages.push(SubscribeMessage::new_token());
        }
        mints.extend(self.subscriptions.token_trades.iter().cloned());
        if !mints.is_empty() {
            messages.push(SubscribeMessage::token_trades(mints.into_iter().collect()));
        }
        if !self.subscriptions.accounts.is_empty() {
            messages.push(SubscribeMessage::account_trades(
                self.subscriptions.accounts.iter().cloned().collect(),
            ));
        }

        for message in &messages {
            if let Err(e) = send_message(session.as_mut(), message).await {
                session.close().await;
                return self.connection_lost(&e.to_string()).await;
            }
        }
        debug!("Sent {} subscription(s)", messages.len());
        Phase::Online(session)
    }

    /// Unintentional loss: schedule a reconnect or give up
    async fn connection_lost(&mut self, reason: &str) -> Phase {
        let max = self.config.max_reconnect_attempts;
        if max > 0 && self.backoff.attempts() >= max {
            error!("{} - giving up after {} reconnect attempts", reason, max);
            self.state
                .write()
                .await
                .record_connection_error(reason, self.backoff.attempts());
            self.set_status(ConnectionStatus::Offline).await;
            self.log.log(
                CATEGORY_FEED,
                &format!("CONNECTION LOST. Gave up after {} attempts", max),
            );
            return Phase::Idle;
        }

        let delay = self.backoff.next_delay();
        self.state
            .write()
            .await
            .record_connection_error(reason, self.backoff.attempts());
        let _ = self.status_tx.send(ConnectionStatus::Error);
        warn!(
            "{} - reconnecting in {}ms (attempt {})",
            reason,
            delay.as_millis(),
            self.backoff.attempts()
        );
        self.log.log(
            CATEGORY_FEED,
            &format!("CONNECTION LOST. Retrying in {}ms...", delay.as_millis()),
        );
        Phase::Waiting(delay)
    }

    async fn went_offline(&mut self) -> Phase {
        info!("Disconnected");
        self.set_status(ConnectionStatus::Offline).await;
        Phase::Idle
    }

    /// Handle one inbound frame. Returns `false` once nobody listens for events.
    async fn on_frame(&mut self, text: &str) -> bool {
        self.state.write().await.record_packet();

        match self.decoder.decode(text, self.clock.now_ms()) {
            Ok(Some(event)) => {
                if self.event_tx.send(event).await.is_err() {
                    warn!("Event receiver dropped, stopping");
                    return false;
                }
            }
            Ok(None) => debug!("Ignoring non-event frame"),
            Err(DecodeError::Server(e)) => warn!("Server error: {}", e),
            Err(e) => debug!("Dropping frame: {}", e),
        }
        true
    }

    /// Record a subscription change; returns the frame to send if online
    fn track(&mut self, command: &FeedCommand) -> Option<SubscribeMessage> {
        match command {
            FeedCommand::SubscribeTokenTrades(mints) => {
                let fresh: Vec<String> = mints
                    .iter()
                    .filter(|m| self.subscriptions.token_trades.insert((*m).clone()))
                    .cloned()
                    .collect();
                (!fresh.is_empty()).then(|| SubscribeMessage::token_trades(fresh))
            }
            FeedCommand::UnsubscribeTokenTrades(mints) => {
                let dropped: Vec<String> = mints
                    .iter()
                    .filter(|m| self.subscriptions.token_trades.remove(m.as_str()))
                    .cloned()
                    .collect();
                (!dropped.is_empty()).then(|| SubscribeMessage::unsubscribe_token_trades(dropped))
            }
            FeedCommand::SubscribeAccountTrades(accounts) => {
                let fresh: Vec<String> = accounts
                    .iter()
                    .filter(|a| self.subscriptions.accounts.insert((*a).clone()))
                    .cloned()
                    .collect();
                (!fresh.is_empty()).then(|| SubscribeMessage::account_trades(fresh))
            }
            _ => None,
        }
    }

    async fn set_status(&self, status: ConnectionStatus) {
        self.state.write().await.set_connection_status(status);
        let _ = self.status_tx.send(status);
    }
}

async fn send_message(session: &mut dyn FeedSession, message: &SubscribeMessage) -> Result<(), TransportError> {
    let json = message
        .to_json()
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    debug!("-> {}", json);
    session.send(json).await
}
