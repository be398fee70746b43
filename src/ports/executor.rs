//! Trade Executor Port
//!
//! Contract for settling buys and sells on-chain. The runtime only calls an
//! executor in live mode; simulated intents are settled by the ledger alone.
//! Failures are reported in the result, never as a panic or an `Err`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of a buy or sell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// SOL spent (buy) or received (sell)
    pub sol_amount: f64,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn filled(sol_amount: f64, signature: impl Into<String>) -> Self {
        Self {
            success: true,
            sol_amount,
            signature: Some(signature.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            sol_amount: 0.0,
            signature: None,
            error: Some(error.into()),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// Buy `sol_amount` SOL worth of `mint`
    async fn buy(&self, mint: &str, sol_amount: f64) -> ExecutionResult;

    /// Sell `percent` (0-100] of the holding in `mint`
    async fn sell(&self, mint: &str, percent: f64) -> ExecutionResult;

    fn name(&self) -> &str {
        "executor"
    }
}
