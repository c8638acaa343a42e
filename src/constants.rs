//! # System Constants
//!
//! Fixed values of the recovery rules. Tunable settings live in [`crate::config`].

/// Recovery-policy timings
pub mod recovery {
    /// First rate-limit backoff, doubled per retry
    pub const RATE_LIMIT_BASE_DELAY_SECS: f64 = 30.0;
    /// Hard ceiling for rate-limit backoff
    pub const RATE_LIMIT_MAX_DELAY_SECS: f64 = 300.0;

    /// First congestion backoff, multiplied by [`CONGESTION_BACKOFF_FACTOR`] per retry
    pub const CONGESTION_BASE_DELAY_SECS: f64 = 10.0;
    pub const CONGESTION_BACKOFF_FACTOR: f64 = 1.5;

    pub const TIMEOUT_BACKOFF_FACTOR: f64 = 1.5;

    /// Single slippage retry waits this long
    pub const SLIPPAGE_RETRY_DELAY_SECS: f64 = 5.0;
}

/// Call-parameter keys adjusted between attempts
pub mod adjustments {
    pub const PRIORITY_FEE_MULTIPLIER: &str = "priority_fee_multiplier";
    pub const PRIORITY_FEE_FACTOR: f64 = 1.5;

    pub const SLIPPAGE_TOLERANCE_MULTIPLIER: &str = "slippage_tolerance_multiplier";
    pub const SLIPPAGE_TOLERANCE_FACTOR: f64 = 1.2;
}

/// In-memory bookkeeping limits
pub mod history {
    /// Classified errors retained, oldest evicted first
    pub const ERROR_HISTORY_CAPACITY: usize = 100;
    /// Entries included in a statistics snapshot
    pub const RECENT_ERRORS_IN_SNAPSHOT: usize = 10;
}
