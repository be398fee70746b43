//! Placeholder Trade Executor
//!
//! Stands in for wallet integration during `--live` runs. Every buy and sell
//! succeeds with a synthetic `mock_buy_*` / `mock_sell_*` signature and no
//! transaction is built. Sells report zero proceeds, so the ledger credits its
//! own mark-to-market value.

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::ports::executor::{ExecutionResult, TradeExecutor};

#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderExecutor;

impl PlaceholderExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TradeExecutor for PlaceholderExecutor {
    async fn buy(&self, mint: &str, sol_amount: f64) -> ExecutionResult {
        if !sol_amount.is_finite() || sol_amount <= 0.0 {
            return ExecutionResult::failed(format!("invalid buy amount: {}", sol_amount));
        }
        let signature = format!("mock_buy_{}", Utc::now().timestamp_millis());
        info!("Placeholder buy {} SOL of {} ({})", sol_amount, mint, signature);
        ExecutionResult::filled(sol_amount, signature)
    }

    async fn sell(&self, mint: &str, percent: f64) -> ExecutionResult {
        if !(percent > 0.0) {
            return ExecutionResult::failed(format!("invalid sell percent: {}", percent));
        }
        let signature = format!("mock_sell_{}", Utc::now().timestamp_millis());
        info!("Placeholder sell {}% of {} ({})", percent, mint, signature);
        ExecutionResult::filled(0.0, signature)
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}
