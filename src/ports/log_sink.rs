//! Activity Log Port
//!
//! Fire-and-forget sink for human-readable activity lines ("SNIPER: BUY $PEPE
//! for 0.1 SOL"). Implementations must never block the caller.

/// Category used for system-level activity
pub const CATEGORY_SYSTEM: &str = "SYSTEM";
/// Category used for failures
pub const CATEGORY_ERROR: &str = "ERROR";
/// Category used for ledger settlement
pub const CATEGORY_LEDGER: &str = "LEDGER";
/// Category used for feed connection events
pub const CATEGORY_FEED: &str = "WS";

pub trait LogSink: Send + Sync {
    fn log(&self, category: &str, message: &str);
}
