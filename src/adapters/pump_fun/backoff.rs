//! Reconnect backoff: `base * 1.5^(n-1)` milliseconds, capped.

use std::time::Duration;

/// Reconnection delay base
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 500;
/// Maximum reconnection delay
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 30_000;

const GROWTH: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base_ms: u64,
    max_ms: u64,
    attempts: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_BASE_MS, DEFAULT_RECONNECT_MAX_MS)
    }
}

impl ReconnectBackoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms: max_ms.max(base_ms),
            attempts: 0,
        }
    }

    /// Count one more attempt and return how long to wait before it
    pub fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        Duration::from_millis(self.delay_ms(self.attempts))
    }

    /// Delay before attempt `n` (1-based)
    pub fn delay_ms(&self, n: u32) -> u64 {
        let exp = n.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.base_ms as f64 * GROWTH.powi(exp);
        raw.min(self.max_ms as f64).round() as u64
    }

    /// Attempts since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Call once a connection opens
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
