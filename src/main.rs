//! pump-brain - Multi-strategy bot brain for pump.fun launches
//!
//! Follows the PumpPortal live feed and runs the configured bots against a
//! simulated (or executor-backed) SOL ledger.

use anyhow::Result;

use pump_brain::adapters::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (PUMP_WS_URL and friends)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}
