//! RPC endpoint resolution.
//!
//! Operators configure general RPC and bundler endpoints somewhat
//! interchangeably. Instead of trusting configuration blindly, every
//! candidate is probed for its reported chain id and the first match wins,
//! making the choice deterministic and chain-safe.

use crate::{
    error::{ConfigError, RelayResult},
    supervisor::{with_timeout, TimeoutMeta},
};
use alloy::providers::{Provider, ProviderBuilder};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// The verified endpoint pair the settlement flows run against.
#[derive(Debug, Clone)]
pub struct VerifiedEndpoints {
    /// General RPC endpoint, chain-id verified.
    pub rpc: Url,
    /// Bundler endpoint, chain-id verified.
    pub bundler: Url,
}

/// Returns the first candidate whose reported chain id matches
/// `expected_chain_id`.
///
/// Each probe is bounded by `timeout`; probes that fail or time out simply
/// do not match. Fails with `RPC_URL_MISSING` when no candidates were
/// supplied and `RPC_CHAIN_MISMATCH` when none match.
pub async fn resolve_endpoint(
    kind: &'static str,
    candidates: &[Url],
    expected_chain_id: u64,
    timeout: Duration,
) -> RelayResult<Url> {
    if candidates.is_empty() {
        return Err(ConfigError::MissingRpcUrl(kind).into());
    }

    for url in candidates {
        let provider = ProviderBuilder::new().connect_http(url.clone());
        let probe = with_timeout(
            provider.get_chain_id(),
            timeout,
            TimeoutMeta::rpc(format!("eth_chainId probe of {kind} endpoint")),
        )
        .await;

        match probe {
            Ok(chain_id) if chain_id == expected_chain_id => {
                debug!(%url, chain_id, kind, "endpoint verified");
                return Ok(url.clone());
            }
            Ok(chain_id) => {
                warn!(%url, got = chain_id, expected = expected_chain_id, kind, "endpoint reports wrong chain");
            }
            Err(err) => {
                warn!(%url, kind, %err, "endpoint probe failed");
            }
        }
    }

    Err(ConfigError::ChainMismatch { expected: expected_chain_id }.into())
}
