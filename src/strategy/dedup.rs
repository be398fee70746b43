//! Trigger Deduplication
//!
//! Buy strategies mark each trigger they act on. The set is cleared wholesale
//! once it reaches capacity, so dedup is approximate: a condition seen before
//! the last clear can fire again.

use std::collections::HashSet;

use tracing::debug;

use super::config::StrategyId;

/// Default number of keys kept before a wholesale clear
pub const DEFAULT_DEDUP_CAPACITY: usize = 500;

/// A trigger already acted upon
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub strategy: StrategyId,
    pub mint: String,
    /// Set for per-trade triggers, so every distinct trade counts once
    pub instant_ms: Option<u64>,
}

impl DedupKey {
    /// One trigger per strategy and token
    pub fn per_token(strategy: StrategyId, mint: &str) -> Self {
        Self {
            strategy,
            mint: mint.to_string(),
            instant_ms: None,
        }
    }

    /// One trigger per strategy, token and trade timestamp
    pub fn per_trade(strategy: StrategyId, mint: &str, timestamp_ms: u64) -> Self {
        Self {
            strategy,
            mint: mint.to_string(),
            instant_ms: Some(timestamp_ms),
        }
    }
}

#[derive(Debug)]
pub struct DedupSet {
    keys: HashSet<DedupKey>,
    capacity: usize,
    clears: u64,
}

impl Default for DedupSet {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

impl DedupSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            keys: HashSet::new(),
            capacity: capacity.max(1),
            clears: 0,
        }
    }

    /// Mark `key`. Returns `true` the first time a key is seen.
    pub fn check_and_insert(&mut self, key: DedupKey) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        if self.keys.len() >= self.capacity {
            debug!("Dedup set reached {} keys, clearing", self.keys.len());
            self.keys.clear();
            self.clears += 1;
        }
        self.keys.insert(key)
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of wholesale clears so far
    pub fn clears(&self) -> u64 {
        self.clears
    }
}
