//! Token and Trade Types
//!
//! Bonding-curve tokens as tracked by the market state, plus the trade and
//! curve events decoded from the feed.

use serde::{Deserialize, Serialize};

/// Default token supply used for curve progress (pump.fun mints 1B tokens)
pub const DEFAULT_TOTAL_SUPPLY: f64 = 1_000_000_000.0;
/// Default SOL/USD conversion for market cap display
pub const DEFAULT_SOL_PRICE_USD: f64 = 175.0;

/// Launch parameters needed to derive token fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveParams {
    /// Total token supply of a launch
    pub total_supply: f64,
    /// SOL price in USD
    pub sol_price_usd: f64,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            total_supply: DEFAULT_TOTAL_SUPPLY,
            sol_price_usd: DEFAULT_SOL_PRICE_USD,
        }
    }
}

impl CurveParams {
    /// Percent of supply sold out of the curve, clamped to [0, 100]
    pub fn progress(&self, v_tokens_in_curve: f64) -> f64 {
        if self.total_supply <= 0.0 || !v_tokens_in_curve.is_finite() {
            return 0.0;
        }
        let pct = (self.total_supply - v_tokens_in_curve) / self.total_supply * 100.0;
        pct.clamp(0.0, 100.0)
    }

    /// Share of supply held by a wallet holding `tokens`, clamped to [0, 100]
    pub fn supply_share(&self, tokens: f64) -> f64 {
        if self.total_supply <= 0.0 || !tokens.is_finite() {
            return 0.0;
        }
        (tokens / self.total_supply * 100.0).clamp(0.0, 100.0)
    }
}

/// A token launched on the bonding curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Token mint address
    pub mint: String,
    /// Token symbol
    pub symbol: String,
    /// Token name
    pub name: String,
    /// Metadata URI (not fetched)
    pub uri: Option<String>,
    /// Creator wallet
    pub creator: String,
    /// When the launch was observed (unix ms)
    pub created_at_ms: u64,
    /// Virtual SOL reserves in the curve
    pub v_sol_in_curve: f64,
    /// Virtual token reserves in the curve
    pub v_tokens_in_curve: f64,
    /// Market cap in SOL, also used as the position price
    pub market_cap_sol: f64,
    /// Market cap in USD
    pub market_cap_usd: f64,
    /// Percent of the curve sold (0-100)
    pub bonding_curve_progress: f64,
    /// Largest single holder share of supply (0-100)
    pub top_holder_percent: f64,
}

impl Token {
    /// Create a token with zeroed curve fields
    pub fn new(mint: impl Into<String>, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mint: mint.into(),
            symbol: symbol.into(),
            name: name.into(),
            uri: None,
            creator: String::new(),
            created_at_ms: 0,
            v_sol_in_curve: 0.0,
            v_tokens_in_curve: 0.0,
            market_cap_sol: 0.0,
            market_cap_usd: 0.0,
            bonding_curve_progress: 0.0,
            top_holder_percent: 0.0,
        }
    }

    /// Age of the token relative to `now_ms`
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }

    /// Apply a curve snapshot, recomputing the derived fields
    pub fn apply_curve(&mut self, curve: &CurveSnapshot, params: &CurveParams) {
        if curve.market_cap_sol.is_finite() && curve.market_cap_sol > 0.0 {
            self.market_cap_sol = curve.market_cap_sol;
            self.market_cap_usd = curve.market_cap_sol * params.sol_price_usd;
        }
        if let Some(v_sol) = curve.v_sol_in_curve.filter(|v| v.is_finite()) {
            self.v_sol_in_curve = v_sol;
        }
        if let Some(v_tokens) = curve.v_tokens_in_curve.filter(|v| v.is_finite()) {
            self.v_tokens_in_curve = v_tokens;
            self.bonding_curve_progress = params.progress(v_tokens);
        }
    }

    /// Display label used in activity logs
    pub fn label(&self) -> String {
        format!("${}", self.symbol)
    }
}

/// A single buy or sell on a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub mint: String,
    /// Wallet that placed the trade
    pub trader_key: String,
    /// SOL size of the trade (always >= 0)
    pub sol_amount: f64,
    pub is_buy: bool,
    /// When the trade was received (unix ms)
    pub timestamp_ms: u64,
}

/// Curve state reported alongside a trade, the source of price ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSnapshot {
    pub mint: String,
    pub market_cap_sol: f64,
    pub v_sol_in_curve: Option<f64>,
    pub v_tokens_in_curve: Option<f64>,
}

impl CurveSnapshot {
    /// Snapshot carrying only a market cap
    pub fn market_cap(mint: impl Into<String>, market_cap_sol: f64) -> Self {
        Self {
            mint: mint.into(),
            market_cap_sol,
            v_sol_in_curve: None,
            v_tokens_in_curve: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_progress_from_reserves() {
        let params = CurveParams::default();
        assert_relative_eq!(params.progress(1_000_000_000.0), 0.0);
        assert_relative_eq!(params.progress(250_000_000.0), 75.0, epsilon = 1e-9);
        assert_relative_eq!(params.progress(0.0), 100.0);
    }

    #[test]
    fn test_progress_clamped() {
        let params = CurveParams::default();
        // Fresh pump.fun curves start above the nominal supply
        assert_eq!(params.progress(1_073_000_000.0), 0.0);
        assert_eq!(params.progress(-5.0), 100.0);
        assert_eq!(params.progress(f64::NAN), 0.0);
    }

    #[test]
    fn test_supply_share() {
        let params = CurveParams::default();
        assert_relative_eq!(params.supply_share(50_000_000.0), 5.0, epsilon = 1e-9);
        assert_eq!(params.supply_share(5_000_000_000.0), 100.0);
    }

    #[test]
    fn test_apply_curve_updates_derived_fields() {
        let params = CurveParams::default();
        let mut token = Token::new("mint1", "PEPE", "Pepe");

        token.apply_curve(
            &CurveSnapshot {
                mint: "mint1".to_string(),
                market_cap_sol: 40.0,
                v_sol_in_curve: Some(35.0),
                v_tokens_in_curve: Some(900_000_000.0),
            },
            &params,
        );

        assert_relative_eq!(token.market_cap_sol, 40.0);
        assert_relative_eq!(token.market_cap_usd, 7000.0);
        assert_relative_eq!(token.v_sol_in_curve, 35.0);
        assert_relative_eq!(token.bonding_curve_progress, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_apply_curve_ignores_bad_price() {
        let params = CurveParams::default();
        let mut token = Token::new("mint1", "PEPE", "Pepe");
        token.market_cap_sol = 30.0;

        token.apply_curve(
            &CurveSnapshot {
                mint: "mint1".to_string(),
                market_cap_sol: 0.0,
                v_sol_in_curve: None,
                v_tokens_in_curve: None,
            },
            &params,
        );

        assert_eq!(token.market_cap_sol, 30.0);
    }

    #[test]
    fn test_age() {
        let mut token = Token::new("mint1", "PEPE", "Pepe");
        token.created_at_ms = 1_000;
        assert_eq!(token.age_ms(2_500), 1_500);
        assert_eq!(token.age_ms(500), 0);
    }
}
