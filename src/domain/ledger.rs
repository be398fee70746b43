//! Position Ledger
//!
//! Tracks the trading balance and open positions. Opening debits the balance,
//! selling credits `sol_spent * (1 + pnl%/100) * fraction` back and either
//! shrinks the position or removes it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::position::{Position, PositionError, PositionId};
use super::token::Token;

/// Ledger errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient balance: have {have:.4} SOL, need {need:.4} SOL")]
    InsufficientBalance { have: f64, need: f64 },

    #[error("Position not found: {0}")]
    PositionNotFound(PositionId),

    #[error("Invalid sell percent: {0}")]
    InvalidPercent(f64),

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error(transparent)]
    Position(#[from] PositionError),
}

/// Result of a partial or full sell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellOutcome {
    pub position_id: PositionId,
    pub mint: String,
    pub symbol: String,
    /// Percent actually sold (clamped to 100)
    pub percent: f64,
    pub sol_returned: f64,
    /// Realized PnL of the sold slice
    pub realized_pnl: f64,
    pub pnl_percent: f64,
    /// Whether the position was removed
    pub closed: bool,
}

/// Ledger statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerStats {
    pub buy_count: u32,
    pub sell_count: u32,
    pub winning_sells: u32,
    pub losing_sells: u32,
    pub total_realized_pnl_sol: f64,
    pub total_volume_sol: f64,
    pub largest_win_sol: f64,
    pub largest_loss_sol: f64,
    sum_wins_sol: f64,
    sum_losses_sol: f64,
}

impl LedgerStats {
    /// Win rate as a percentage (0-100)
    pub fn win_rate(&self) -> f64 {
        let total_closed = self.winning_sells + self.losing_sells;
        if total_closed == 0 {
            return 0.0;
        }
        (self.winning_sells as f64 / total_closed as f64) * 100.0
    }

    /// Profit factor (gross profits / gross losses)
    pub fn profit_factor(&self) -> f64 {
        if self.sum_losses_sol.abs() < 1e-10 {
            if self.sum_wins_sol > 0.0 {
                return f64::INFINITY;
            }
            return 0.0;
        }
        self.sum_wins_sol / self.sum_losses_sol.abs()
    }

    fn record_buy(&mut self, sol_amount: f64) {
        self.buy_count += 1;
        self.total_volume_sol += sol_amount;
    }

    fn record_sell(&mut self, outcome: &SellOutcome) {
        self.sell_count += 1;
        self.total_volume_sol += outcome.sol_returned;

        let pnl = outcome.realized_pnl;
        self.total_realized_pnl_sol += pnl;
        if pnl > 0.0 {
            self.winning_sells += 1;
            self.sum_wins_sol += pnl;
            self.largest_win_sol = self.largest_win_sol.max(pnl);
        } else if pnl < 0.0 {
            self.losing_sells += 1;
            self.sum_losses_sol += pnl.abs();
            self.largest_loss_sol = self.largest_loss_sol.max(pnl.abs());
        }
    }
}

/// Balance plus open positions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLedger {
    balance: f64,
    initial_balance: f64,
    positions: Vec<Position>,
    next_id: u64,
    stats: LedgerStats,
}

impl PositionLedger {
    pub fn new(starting_balance: f64) -> Self {
        info!("Position ledger initialized with {} SOL", starting_balance);

        Self {
            balance: starting_balance,
            initial_balance: starting_balance,
            positions: Vec::new(),
            next_id: 1,
            stats: LedgerStats::default(),
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn stats(&self) -> &LedgerStats {
        &self.stats
    }

    /// Open positions in entry order
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn positions_for<'a>(&'a self, mint: &'a str) -> impl Iterator<Item = &'a Position> + 'a {
        self.positions.iter().filter(move |p| p.mint() == mint)
    }

    pub fn has_position_in(&self, mint: &str) -> bool {
        self.positions.iter().any(|p| p.mint() == mint)
    }

    /// Sum of unrealized PnL over open positions
    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.iter().map(|p| p.pnl).sum()
    }

    /// Open a position, debiting the balance in the same step
    pub fn open(
        &mut self,
        token: Token,
        sol_amount: f64,
        source: &str,
        is_simulated: bool,
        now_ms: u64,
    ) -> Result<PositionId, LedgerError> {
        if sol_amount > self.balance {
            return Err(LedgerError::InsufficientBalance {
                have: self.balance,
                need: sol_amount,
            });
        }

        let id = PositionId(self.next_id);
        let position = Position::open(id, token, sol_amount, source, is_simulated, now_ms)?;

        self.next_id += 1;
        self.balance -= sol_amount;
        self.stats.record_buy(sol_amount);

        debug!(
            "Opened {} {} for {:.4} SOL @ {:.4} (balance {:.4})",
            id,
            position.token.label(),
            sol_amount,
            position.entry_price,
            self.balance
        );

        self.positions.push(position);
        Ok(id)
    }

    /// Sell `percent` of a position at its current PnL
    pub fn sell(&mut self, id: PositionId, percent: f64) -> Result<SellOutcome, LedgerError> {
        self.settle_sell(id, percent, None)
    }

    /// Sell `percent` of a position, crediting `proceeds` when an executor reported them
    pub fn settle_sell(
        &mut self,
        id: PositionId,
        percent: f64,
        proceeds: Option<f64>,
    ) -> Result<SellOutcome, LedgerError> {
        if percent.is_nan() || percent <= 0.0 {
            return Err(LedgerError::InvalidPercent(percent));
        }
        let index = self
            .positions
            .iter()
            .position(|p| p.id == id)
            .ok_or(LedgerError::PositionNotFound(id))?;

        let percent = percent.min(100.0);
        let fraction = percent / 100.0;
        let closed = percent >= 100.0;

        let position = &self.positions[index];
        let cost_basis = position.sol_spent * fraction;
        let sol_returned = proceeds
            .filter(|p| p.is_finite() && *p > 0.0)
            .unwrap_or_else(|| position.exit_value(fraction));

        let outcome = SellOutcome {
            position_id: id,
            mint: position.mint().to_string(),
            symbol: position.token.symbol.clone(),
            percent,
            sol_returned,
            realized_pnl: sol_returned - cost_basis,
            pnl_percent: position.pnl_percent,
            closed,
        };

        if closed {
            self.positions.remove(index);
        } else {
            self.positions[index].scale_down(fraction)?;
        }

        self.balance += sol_returned;
        self.stats.record_sell(&outcome);

        debug!(
            "Sold {:.0}% of {} for {:.4} SOL (balance {:.4})",
            percent, id, sol_returned, self.balance
        );

        Ok(outcome)
    }

    /// Mark every position on `mint` to `price`, returning how many were touched
    pub fn update_price(&mut self, mint: &str, price: f64) -> usize {
        if !price.is_finite() || price <= 0.0 {
            return 0;
        }
        let mut touched = 0;
        for position in self.positions.iter_mut().filter(|p| p.token.mint == mint) {
            position.mark(price);
            touched += 1;
        }
        touched
    }

    /// Replace the token snapshot of every position on `token.mint`
    pub fn refresh_token(&mut self, token: &Token) {
        for position in self.positions.iter_mut().filter(|p| p.token.mint == token.mint) {
            position.token = token.clone();
        }
    }

    pub(crate) fn positions_mut(&mut self) -> impl Iterator<Item = &mut Position> {
        self.positions.iter_mut()
    }
}
