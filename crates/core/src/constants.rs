/// First reconnect delay for the real-time channel.
pub const RECONNECT_BASE_DELAY_MS: u64 = 500;

/// Upper bound on a single reconnect delay.
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// Consecutive failed reconnects before the channel reports itself unavailable.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 8;

/// Full-refetch cadence while the channel is unavailable.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Ids of optimistic placeholders start with this prefix.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Finished mutations kept for inspection.
pub const MUTATION_HISTORY_LIMIT: usize = 64;

/// Default REST request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
