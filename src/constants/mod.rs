//! Constants used throughout the client

/// PDA seed strings
pub mod seeds {
    pub const ANALYSIS: &str = "analysis";
    pub const METRICS: &str = "metrics";
    pub const NETWORK_STATS: &str = "network-stats";
}

/// Instruction discriminants, the leading byte of every instruction payload
pub mod discriminant {
    pub const ANALYZE_CONTRACT: u8 = 0;
    pub const RECORD_METRICS: u8 = 1;
}

/// Account buffer sizes requested from the program
pub mod buffer_sizes {
    pub const ANALYSIS: u64 = 1024;
    pub const METRICS: u64 = 512;
    pub const NETWORK_STATS: u64 = 256;
}

/// Polling intervals in milliseconds
pub mod refresh_intervals {
    pub const FAST: u64 = 5_000;
    pub const MEDIUM: u64 = 15_000;
    pub const SLOW: u64 = 30_000;
}

/// Risk score thresholds (scores are 0-100, higher is safer)
pub mod risk {
    pub const LOW_RISK_MIN_SCORE: u8 = 80;
    pub const MEDIUM_RISK_MIN_SCORE: u8 = 50;
}

/// Gas baseline used before any metrics have been recorded.
pub const GAS_WARNING_THRESHOLD: u64 = 100_000;

/// SOON devnet RPC endpoint
pub const SOON_DEVNET_RPC: &str = "https://rpc.devnet.soo.network/rpc";

pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// How long one broadcast attempt waits for its commitment level, in
/// milliseconds. Finalization trails confirmation by roughly 32 slots.
pub mod confirm_timeouts {
    pub const PROCESSED: u64 = 5_000;
    pub const CONFIRMED: u64 = 15_000;
    pub const FINALIZED: u64 = 30_000;
}

/// Delay between signature status polls within one attempt
pub const DEFAULT_STATUS_POLL_INTERVAL_MS: u64 = 500;
