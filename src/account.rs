//! Smart account resolution.
//!
//! A smart account is deterministically addressable from its owner key
//! before deployment. The factory's `getAddress(owner, 0)` view derives the
//! counterfactual address; a code-presence probe tells whether it is
//! already deployed. Results are cached with a seconds-scale TTL because
//! deployment state can flip between two quote calls within one flow.

use crate::{
    cache::RelayCaches,
    error::{ConfigError, RelayResult},
    supervisor::{with_timeout, TimeoutMeta},
    types::{contracts::IAccountFactory, SmartAccountFact},
};
use alloy::{
    primitives::{Address, U256},
    providers::{Provider, ProviderBuilder},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument};
use url::Url;

/// Resolves counterfactual smart account addresses, cached by
/// `(rpc_url, factory, owner)`.
#[derive(Debug, Clone)]
pub struct AccountResolver {
    caches: Arc<RelayCaches>,
}

impl AccountResolver {
    /// Creates a resolver backed by the shared cache set.
    pub fn new(caches: Arc<RelayCaches>) -> Self {
        Self { caches }
    }

    /// Resolves the smart account for `owner` via `factory`.
    #[instrument(skip(self, rpc_url), fields(%factory, %owner))]
    pub async fn resolve(
        &self,
        rpc_url: &Url,
        factory: Address,
        owner: Address,
        timeout: Duration,
    ) -> RelayResult<SmartAccountFact> {
        if factory.is_zero() {
            return Err(ConfigError::MissingAddress("contracts.factory").into());
        }

        let key = (rpc_url.to_string(), factory, owner);
        if let Some(fact) = self.caches.accounts.get(&key) {
            return Ok(fact);
        }

        let provider = ProviderBuilder::new().connect_http(rpc_url.clone());
        // The relay always derives with salt 0.
        let sender = with_timeout(
            IAccountFactory::new(factory, &provider).getAddress(owner, U256::ZERO).call(),
            timeout,
            TimeoutMeta::rpc("factory getAddress"),
        )
        .await?;

        let code = with_timeout(
            provider.get_code_at(sender),
            timeout,
            TimeoutMeta::rpc("smart account code probe"),
        )
        .await?;

        let fact = SmartAccountFact { sender, deployed: !code.is_empty() };
        debug!(sender = %fact.sender, deployed = fact.deployed, "resolved smart account");
        self.caches.accounts.insert(key, fact);
        Ok(fact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_factory_is_a_config_error() {
        let resolver = AccountResolver::new(Arc::new(RelayCaches::new()));
        let err = resolver
            .resolve(
                &Url::parse("http://127.0.0.1:1/").unwrap(),
                Address::ZERO,
                Address::repeat_byte(1),
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_config");
    }
}
