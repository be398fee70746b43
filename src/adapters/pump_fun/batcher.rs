//! Event Batcher
//!
//! Buffers decoded feed events between flushes. A drained batch lists new
//! tokens, then trades in arrival order, then one curve snapshot per mint
//! (the latest one, ordered by the mint's first appearance in the batch).

use std::collections::HashMap;

use super::types::FeedEvent;
use crate::domain::{CurveSnapshot, Token, TradeEvent};

/// Events collected since the last flush
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBatch {
    pub tokens: Vec<Token>,
    pub trades: Vec<TradeEvent>,
    pub curves: Vec<CurveSnapshot>,
}

impl EventBatch {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.trades.is_empty() && self.curves.is_empty()
    }

    /// Batch holding a single event, for unbatched delivery
    pub fn single(event: FeedEvent) -> Self {
        let mut batcher = EventBatcher::default();
        batcher.push(event);
        batcher.drain()
    }
}

#[derive(Debug, Default)]
pub struct EventBatcher {
    tokens: Vec<Token>,
    trades: Vec<TradeEvent>,
    curves: Vec<CurveSnapshot>,
    curve_slots: HashMap<String, usize>,
    pushed: usize,
}

impl EventBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: FeedEvent) {
        self.pushed += 1;
        match event {
            FeedEvent::TokenCreated(token) => self.tokens.push(token),
            FeedEvent::TradeOccurred { trade, curve } => {
                self.trades.push(trade);
                match self.curve_slots.get(&curve.mint) {
                    Some(slot) => self.curves[*slot] = curve,
                    None => {
                        self.curve_slots.insert(curve.mint.clone(), self.curves.len());
                        self.curves.push(curve);
                    }
                }
            }
        }
    }

    /// Events pushed since the last drain
    pub fn len(&self) -> usize {
        self.pushed
    }

    pub fn is_empty(&self) -> bool {
        self.pushed == 0
    }

    /// Take everything buffered, leaving the batcher empty
    pub fn drain(&mut self) -> EventBatch {
        self.curve_slots.clear();
        self.pushed = 0;
        EventBatch {
            tokens: std::mem::take(&mut self.tokens),
            trades: std::mem::take(&mut self.trades),
            curves: std::mem::take(&mut self.curves),
        }
    }
}
