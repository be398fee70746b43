//! Pump.fun Types
//!
//! Wire types for the PumpPortal data socket and the decoder that turns raw
//! frames into feed events.
//!
//! Inbound frames are flat JSON objects. Creation frames carry
//! `txType = "create"` (older frames carry a `mint` with no `txType` at all);
//! trade frames carry `txType = "buy" | "sell"`. Anything else is a
//! subscription confirmation (`message`) or a server error (`errors`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CurveParams, CurveSnapshot, Token, TradeEvent};

/// Default WebSocket URL for pump.fun data
pub const DEFAULT_WS_URL: &str = "wss://pumpportal.fun/api/data";

/// Maximum inbound frame size in bytes
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Raw inbound frame. Every field is optional; classification decides which
/// ones must be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMessage {
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub tx_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    /// Creator on create frames, trader on trade frames
    #[serde(default)]
    pub trader_public_key: Option<String>,
    /// Creator's initial buy, in tokens
    #[serde(default)]
    pub initial_buy: Option<f64>,
    #[serde(default)]
    pub sol_amount: Option<f64>,
    #[serde(default)]
    pub market_cap_sol: Option<f64>,
    #[serde(default)]
    pub v_sol_in_bonding_curve: Option<f64>,
    #[serde(default)]
    pub v_tokens_in_bonding_curve: Option<f64>,
    /// Subscription confirmation text
    #[serde(default)]
    pub message: Option<String>,
    /// Server-side error, a string or a list depending on the endpoint
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

/// What an inbound frame is
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessageKind {
    TokenCreated,
    Trade { is_buy: bool },
    Confirmation(String),
    ServerError(String),
    Unrecognized,
}

impl FeedMessage {
    pub fn kind(&self) -> FeedMessageKind {
        if let Some(errors) = &self.errors {
            let text = match errors {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return FeedMessageKind::ServerError(text);
        }
        match self.tx_type.as_deref() {
            Some("create") => FeedMessageKind::TokenCreated,
            Some("buy") => FeedMessageKind::Trade { is_buy: true },
            Some("sell") => FeedMessageKind::Trade { is_buy: false },
            None if self.mint.is_some() => FeedMessageKind::TokenCreated,
            _ => match &self.message {
                Some(text) => FeedMessageKind::Confirmation(text.clone()),
                None => FeedMessageKind::Unrecognized,
            },
        }
    }

    fn curve(&self, mint: &str) -> CurveSnapshot {
        CurveSnapshot {
            mint: mint.to_string(),
            market_cap_sol: self.market_cap_sol.unwrap_or(0.0),
            v_sol_in_curve: self.v_sol_in_bonding_curve,
            v_tokens_in_curve: self.v_tokens_in_bonding_curve,
        }
    }
}

/// Outbound subscription frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscribeMessage {
    pub method: String,
    /// Mints or wallets, depending on the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
}

impl SubscribeMessage {
    pub fn new_token() -> Self {
        Self {
            method: "subscribeNewToken".to_string(),
            keys: None,
        }
    }

    pub fn token_trades(mints: Vec<String>) -> Self {
        Self {
            method: "subscribeTokenTrade".to_string(),
            keys: Some(mints),
        }
    }

    pub fn unsubscribe_token_trades(mints: Vec<String>) -> Self {
        Self {
            method: "unsubscribeTokenTrade".to_string(),
            keys: Some(mints),
        }
    }

    pub fn account_trades(accounts: Vec<String>) -> Self {
        Self {
            method: "subscribeAccountTrade".to_string(),
            keys: Some(accounts),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decoded market event handed to the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    TokenCreated(Token),
    TradeOccurred {
        trade: TradeEvent,
        /// Curve state after the trade
        curve: CurveSnapshot,
    },
}

impl FeedEvent {
    pub fn mint(&self) -> &str {
        match self {
            FeedEvent::TokenCreated(token) => &token.mint,
            FeedEvent::TradeOccurred { trade, .. } => &trade.mint,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Message too large: {0} bytes")]
    TooLarge(usize),

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Server error: {0}")]
    Server(String),
}

/// Turns raw frames into [`FeedEvent`]s
#[derive(Debug, Clone, Copy)]
pub struct FeedDecoder {
    curve: CurveParams,
    max_message_size: usize,
}

impl Default for FeedDecoder {
    fn default() -> Self {
        Self::new(CurveParams::default(), DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl FeedDecoder {
    pub fn new(curve: CurveParams, max_message_size: usize) -> Self {
        Self {
            curve,
            max_message_size,
        }
    }

    /// Decode one frame received at `now_ms`.
    ///
    /// `Ok(None)` covers frames that carry no market event (empty frames,
    /// confirmations, unrecognized shapes).
    pub fn decode(&self, raw: &str, now_ms: u64) -> Result<Option<FeedEvent>, DecodeError> {
        if raw.len() > self.max_message_size {
            return Err(DecodeError::TooLarge(raw.len()));
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let message: FeedMessage =
            serde_json::from_str(trimmed).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        match message.kind() {
            FeedMessageKind::TokenCreated => self.token(&message, now_ms).map(Some),
            FeedMessageKind::Trade { is_buy } => self.trade(&message, is_buy, now_ms).map(Some),
            FeedMessageKind::ServerError(error) => Err(DecodeError::Server(error)),
            FeedMessageKind::Confirmation(_) | FeedMessageKind::Unrecognized => Ok(None),
        }
    }

    fn token(&self, message: &FeedMessage, now_ms: u64) -> Result<FeedEvent, DecodeError> {
        let mint = message.mint.as_deref().ok_or(DecodeError::MissingField("mint"))?;

        let mut token = Token::new(
            mint,
            message.symbol.clone().unwrap_or_default(),
            message.name.clone().unwrap_or_default(),
        );
        token.uri = message.uri.clone();
        token.creator = message.trader_public_key.clone().unwrap_or_default();
        token.created_at_ms = now_ms;
        token.apply_curve(&message.curve(mint), &self.curve);
        token.top_holder_percent = self.curve.supply_share(message.initial_buy.unwrap_or(0.0));

        Ok(FeedEvent::TokenCreated(token))
    }

    fn trade(&self, message: &FeedMessage, is_buy: bool, now_ms: u64) -> Result<FeedEvent, DecodeError> {
        let mint = message.mint.as_deref().ok_or(DecodeError::MissingField("mint"))?;

        // older frames omit solAmount; fall back to the curve reserve, then the initial buy
        let sol_amount = message
            .sol_amount
            .or(message.v_sol_in_bonding_curve)
            .or(message.initial_buy)
            .unwrap_or(0.0)
            .abs();

        Ok(FeedEvent::TradeOccurred {
            trade: TradeEvent {
                mint: mint.to_string(),
                trader_key: message.trader_public_key.clone().unwrap_or_default(),
                sol_amount,
                is_buy,
                timestamp_ms: now_ms,
            },
            curve: message.curve(mint),
        })
    }
}
