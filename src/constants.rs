//! Relay constants.

use std::time::Duration;

/// Hard fallback for the maximum sponsor fee a caller is charged, in USD6
/// (6-decimal fixed point, so 1_000_000 == 1 USD).
///
/// Used when neither the request nor the operator configuration supplies a
/// fee cap.
pub const DEFAULT_MAX_FEE_USD6: u64 = 1_000_000;

/// Default timeout for a single RPC call.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a full orchestrator subprocess run.
///
/// The subprocess builds a user operation, asks the bundler for gas
/// estimates and submits, so this is an order of magnitude above the RPC
/// timeout.
pub const DEFAULT_ORCHESTRATOR_TIMEOUT: Duration = Duration::from_secs(45);

/// TTL for token facts (decimals, USD price).
///
/// Decimals are immutable and the price feed the paymaster reads from
/// updates slowly, so a 24h TTL is safe.
pub const TOKEN_FACTS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// TTL for smart account facts.
///
/// Deployment state can flip between two quote calls within one flow, so
/// this is seconds-scale.
pub const ACCOUNT_FACTS_TTL: Duration = Duration::from_secs(30);

/// TTL for ERC-20 allowance probes.
pub const ALLOWANCE_TTL: Duration = Duration::from_secs(30);

/// Default capacity for each TTL cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Default maximum number of recipients in a bulk settlement.
pub const DEFAULT_BULK_MAX_RECIPIENTS: usize = 50;

/// Default AckLink lifetime.
pub const DEFAULT_LINK_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Upper bound on a caller-requested AckLink lifetime.
pub const MAX_LINK_EXPIRY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default per-address mutating-action budget within [`RATE_LIMIT_WINDOW`].
pub const RATE_LIMIT_MAX_ACTIONS: u32 = 10;

/// Default rate limit window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Cap on captured subprocess output per stream. Anything beyond this is
/// discarded so a chatty child cannot exhaust memory.
pub const MAX_STREAM_CAPTURE: usize = 1024 * 1024;

/// Returns the current unix timestamp in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
