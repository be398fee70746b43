//! Test doubles for the ports layer
//!
//! Recording implementations usable from unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::executor::{ExecutionResult, TradeExecutor};
use super::feed::{FeedConnector, FeedSession, TransportError};

/// Executor call recorded by [`RecordingExecutor`]
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorCall {
    Buy { mint: String, sol_amount: f64 },
    Sell { mint: String, percent: f64 },
}

/// Executor that records calls and answers with a configurable result
#[derive(Debug, Clone)]
pub struct RecordingExecutor {
    calls: Arc<Mutex<Vec<ExecutorCall>>>,
    failure: Option<String>,
    sell_proceeds: f64,
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            failure: None,
            sell_proceeds: 0.0,
        }
    }

    /// Builder method: every call fails with `error`
    pub fn failing(mut self, error: &str) -> Self {
        self.failure = Some(error.to_string());
        self
    }

    /// Builder method: sells report `proceeds` SOL received
    pub fn with_sell_proceeds(mut self, proceeds: f64) -> Self {
        self.sell_proceeds = proceeds;
        self
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, call: ExecutorCall) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }
}

#[async_trait]
impl TradeExecutor for RecordingExecutor {
    async fn buy(&self, mint: &str, sol_amount: f64) -> ExecutionResult {
        self.record(ExecutorCall::Buy {
            mint: mint.to_string(),
            sol_amount,
        });
        match &self.failure {
            Some(error) => ExecutionResult::failed(error.clone()),
            None => ExecutionResult::filled(sol_amount, format!("recorded_buy_{}", mint)),
        }
    }

    async fn sell(&self, mint: &str, percent: f64) -> ExecutionResult {
        self.record(ExecutorCall::Sell {
            mint: mint.to_string(),
            percent,
        });
        match &self.failure {
            Some(error) => ExecutionResult::failed(error.clone()),
            None => ExecutionResult::filled(self.sell_proceeds, format!("recorded_sell_{}", mint)),
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Script for one dial attempt of a [`ScriptedConnector`]
pub enum DialScript {
    /// Dial fails with the given error
    Refuse(String),
    /// Dial succeeds; the test drives the session through the returned ends
    Accept(ScriptedSession),
    /// Dial succeeds once the paired sender fires or is dropped
    Held(ScriptedSession, oneshot::Receiver<()>),
}

/// Test-side handle of an accepted session
pub struct SessionRemote {
    /// Push frames to the client; drop to simulate a remote close
    pub inbound: mpsc::UnboundedSender<String>,
    /// Frames the client sent
    pub outbound: mpsc::UnboundedReceiver<String>,
}

/// In-memory session backed by channels
pub struct ScriptedSession {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
}

impl ScriptedSession {
    /// Create a session and the remote end used to drive it
    pub fn pair() -> (Self, SessionRemote) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            Self {
                inbound: in_rx,
                outbound: out_tx,
            },
            SessionRemote {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }
}

#[async_trait]
impl FeedSession for ScriptedSession {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(text)
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

/// Connector that plays back a queue of dial outcomes.
/// Dials beyond the script are refused.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<VecDeque<DialScript>>>,
    dials: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful dial and return its remote end
    pub fn accept(&self) -> SessionRemote {
        let (session, remote) = ScriptedSession::pair();
        self.push(DialScript::Accept(session));
        remote
    }

    /// Queue a dial that stays pending until the returned sender is used
    pub fn accept_held(&self) -> (SessionRemote, oneshot::Sender<()>) {
        let (session, remote) = ScriptedSession::pair();
        let (release, held) = oneshot::channel();
        self.push(DialScript::Held(session, held));
        (remote, release)
    }

    /// Queue a refused dial
    pub fn refuse(&self, error: &str) {
        self.push(DialScript::Refuse(error.to_string()));
    }

    /// URLs dialed so far
    pub fn dial_count(&self) -> usize {
        self.dials.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn push(&self, step: DialScript) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
    }
}

#[async_trait]
impl FeedConnector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn FeedSession>, TransportError> {
        self.dials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        let step = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match step {
            Some(DialScript::Accept(session)) => Ok(Box::new(session)),
            Some(DialScript::Held(session, held)) => {
                let _ = held.await;
                Ok(Box::new(session))
            }
            Some(DialScript::Refuse(error)) => Err(TransportError::ConnectFailed(error)),
            None => Err(TransportError::ConnectFailed("no scripted dial".to_string())),
        }
    }
}
