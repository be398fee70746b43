use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::token::Token;

/// Token units received per SOL at a market cap of 1 SOL
pub const TOKENS_PER_MCAP_SOL: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    /// Snapshot of the token, refreshed by the market state on every curve update
    pub token: Token,
    pub entry_price: f64,
    pub current_price: f64,
    pub amount: f64,
    pub sol_spent: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub entry_time_ms: u64,
    pub is_simulated: bool,
    /// Strategy tag or "MANUAL"
    pub source: String,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PositionError {
    #[error("Invalid SOL amount: {0}")]
    InvalidAmount(f64),
    #[error("Invalid entry price: {0}")]
    InvalidEntryPrice(f64),
    #[error("Invalid sell fraction: {0}")]
    InvalidFraction(f64),
}

impl Position {
    pub fn open(
        id: PositionId,
        token: Token,
        sol_amount: f64,
        source: impl Into<String>,
        is_simulated: bool,
        now_ms: u64,
    ) -> Result<Self, PositionError> {
        if !sol_amount.is_finite() || sol_amount <= 0.0 {
            return Err(PositionError::InvalidAmount(sol_amount));
        }
        let price = token.market_cap_sol;
        if !price.is_finite() || price <= 0.0 {
            return Err(PositionError::InvalidEntryPrice(price));
        }

        Ok(Self {
            id,
            amount: sol_amount / price * TOKENS_PER_MCAP_SOL,
            token,
            entry_price: price,
            current_price: price,
            sol_spent: sol_amount,
            pnl: 0.0,
            pnl_percent: 0.0,
            entry_time_ms: now_ms,
            is_simulated,
            source: source.into(),
        })
    }

    pub fn mint(&self) -> &str {
        &self.token.mint
    }

    pub fn hold_time_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entry_time_ms)
    }

    /// Mark to a new price and recompute PnL
    pub fn mark(&mut self, price: f64) {
        self.current_price = price;
        self.pnl_percent = (price - self.entry_price) / self.entry_price * 100.0;
        self.pnl = self.sol_spent * self.pnl_percent / 100.0;
    }

    /// SOL returned for selling `fraction` (0-1] at the current PnL
    pub fn exit_value(&self, fraction: f64) -> f64 {
        self.sol_spent * (1.0 + self.pnl_percent / 100.0) * fraction
    }

    /// Shrink the position after selling `fraction` of it
    pub fn scale_down(&mut self, fraction: f64) -> Result<(), PositionError> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(PositionError::InvalidFraction(fraction));
        }
        let keep = 1.0 - fraction;
        self.amount *= keep;
        self.sol_spent *= keep;
        self.pnl = self.sol_spent * self.pnl_percent / 100.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn token_at(mcap: f64) -> Token {
        let mut token = Token::new("mintX", "XTK", "X Token");
        token.market_cap_sol = mcap;
        token
    }

    #[test]
    fn test_open_position() {
        let position = Position::open(PositionId(1), token_at(2.0), 3.0, "SNIPER", true, 500).unwrap();
        assert_eq!(position.entry_price, 2.0);
        assert_eq!(position.current_price, 2.0);
        assert_relative_eq!(position.amount, 1.5e9);
        assert_eq!(position.sol_spent, 3.0);
        assert_eq!(position.pnl, 0.0);
        assert_eq!(position.source, "SNIPER");
        assert_eq!(position.mint(), "mintX");
    }

    #[test]
    fn test_open_invalid_amount() {
        let result = Position::open(PositionId(1), token_at(1.0), 0.0, "MANUAL", true, 0);
        assert!(matches!(result, Err(PositionError::InvalidAmount(_))));
    }

    #[test]
    fn test_open_invalid_price() {
        let result = Position::open(PositionId(1), token_at(0.0), 1.0, "MANUAL", true, 0);
        assert!(matches!(result, Err(PositionError::InvalidEntryPrice(_))));
    }

    #[test]
    fn test_mark_recomputes_pnl() {
        let mut position = Position::open(PositionId(1), token_at(1.0), 3.0, "MANUAL", true, 0).unwrap();
        position.mark(2.0);
        assert_relative_eq!(position.pnl_percent, 100.0);
        assert_relative_eq!(position.pnl, 3.0);

        position.mark(0.5);
        assert_relative_eq!(position.pnl_percent, -50.0);
        assert_relative_eq!(position.pnl, -1.5);
    }

    #[test]
    fn test_scale_down() {
        let mut position = Position::open(PositionId(1), token_at(1.0), 4.0, "MANUAL", true, 0).unwrap();
        position.mark(1.5);
        position.scale_down(0.25).unwrap();
        assert_relative_eq!(position.sol_spent, 3.0);
        assert_relative_eq!(position.amount, 3.0e9);
        assert_relative_eq!(position.pnl, 1.5);
    }

    #[test]
    fn test_scale_down_rejects_full_exit() {
        let mut position = Position::open(PositionId(1), token_at(1.0), 4.0, "MANUAL", true, 0).unwrap();
        assert!(position.scale_down(1.0).is_err());
        assert!(position.scale_down(0.0).is_err());
    }

    #[test]
    fn test_hold_time() {
        let position = Position::open(PositionId(7), token_at(1.0), 1.0, "MANUAL", true, 1_000).unwrap();
        assert_eq!(position.hold_time_ms(61_000), 60_000);
        assert_eq!(format!("{}", position.id), "#7");
    }
}
