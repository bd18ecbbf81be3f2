//! Tunable design constants for the ledger core.
//!
//! All values here are defaults; `ledgerchain::LedgerConfig` allows a host
//! application to override every one of them (block size, rate limits,
//! difficulty targets and the health interval all need to be
//! injectable for testing).

/// Soft cap on transactions per sealed block.
pub const BLOCK_SIZE: usize = 5_000;

/// Genesis / startup proof-of-work difficulty, in leading hex-zero nibbles.
pub const INITIAL_DIFFICULTY: u32 = 2;

/// Target wall-clock time between sealed blocks, in seconds.
pub const TARGET_BLOCK_TIME_SECS: i64 = 10;

/// Re-evaluate difficulty every this many sealed blocks.
pub const ADJUST_EVERY: u64 = 10;

/// Rate-limit sliding window, in seconds.
pub const RATE_WINDOW_SECS: i64 = 60;

/// Maximum transactions a single actor may submit per rate window.
pub const RATE_MAX: u32 = 100;

/// How often the health supervisor re-checks chain/store consistency.
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 300;

/// Clock skew tolerated for a transaction's `timestamp` (future side).
pub const FUTURE_TOLERANCE_SECS: i64 = 60;

/// Age past which a transaction's `timestamp` triggers a staleness
/// warning rather than a rejection.
pub const STALE_WARNING_SECS: i64 = 24 * 3600;

/// Minimum difficulty the adjustment algorithm will ever settle on.
pub const MIN_DIFFICULTY: u32 = 1;

/// Previous-hash value used by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";
