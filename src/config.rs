//! Relay configuration.

use crate::{
    constants::{
        DEFAULT_BULK_MAX_RECIPIENTS, DEFAULT_LINK_EXPIRY, DEFAULT_MAX_FEE_USD6,
        DEFAULT_ORCHESTRATOR_TIMEOUT, DEFAULT_RPC_TIMEOUT, MAX_LINK_EXPIRY,
        RATE_LIMIT_MAX_ACTIONS, RATE_LIMIT_WINDOW,
    },
    error::ConfigError,
    types::{LaneLists, OrchestratorContracts},
};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};
use url::Url;

/// Relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Chain endpoints.
    pub chain: ChainConfig,
    /// Contract addresses.
    pub contracts: ContractsConfig,
    /// Quote configuration.
    #[serde(default)]
    pub quote: QuoteConfig,
    /// Orchestrator subprocess configuration.
    pub orchestrator: OrchestratorConfig,
    /// Lane allow-lists.
    #[serde(default)]
    pub lanes: LaneLists,
    /// Request limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// AckLink expiry bounds.
    #[serde(default)]
    pub acklink: LinkConfig,
    /// Edge collaborator endpoints.
    #[serde(default)]
    pub collaborators: CollaboratorsConfig,
}

/// Edge collaborator endpoints.
///
/// Unset endpoints fall back to in-process implementations, which is the
/// single-binary deployment shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollaboratorsConfig {
    /// Base URL of the receipt/note service.
    pub receipts_url: Option<Url>,
    /// Endpoint of the sponsorship-cost recorder.
    pub costs_url: Option<Url>,
    /// Timeout for collaborator calls.
    #[serde(default = "default_edge_timeout")]
    pub timeout: Duration,
}

fn default_edge_timeout() -> Duration {
    DEFAULT_RPC_TIMEOUT
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address to serve on.
    pub address: IpAddr,
    /// The port to serve on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: IpAddr::V4(Ipv4Addr::LOCALHOST), port: 9229 }
    }
}

/// Chain endpoints.
///
/// General and bundler endpoints are both candidate lists; each is verified
/// against the configured chain id before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// The chain the relay settles on.
    pub chain_id: u64,
    /// Candidate general RPC endpoints.
    pub endpoints: Vec<Url>,
    /// Candidate bundler endpoints.
    pub bundler_endpoints: Vec<Url>,
}

/// Contract addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// ERC-4337 entrypoint.
    pub entrypoint: Address,
    /// Smart account factory.
    pub factory: Address,
    /// Settlement router.
    pub router: Address,
    /// Sponsoring paymaster.
    pub paymaster: Address,
    /// AckLink escrow vault.
    pub vault: Address,
    /// The Permit2 contract.
    pub permit2: Address,
    /// The token fees are denominated in.
    pub fee_token: Address,
    /// The single token supported for bulk settlement.
    pub bulk_token: Address,
}

/// Quote configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    /// Timeout applied to each RPC call made while quoting.
    pub rpc_timeout: Duration,
    /// Operator default for the fee ceiling, in USD6. Falls back to
    /// [`DEFAULT_MAX_FEE_USD6`] when unset.
    pub default_max_fee_usd6: Option<u64>,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self { rpc_timeout: DEFAULT_RPC_TIMEOUT, default_max_fee_usd6: None }
    }
}

/// Orchestrator subprocess configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// The program to run, e.g. `node`.
    pub program: String,
    /// Arguments passed before the generated environment, e.g. the script
    /// path.
    #[serde(default)]
    pub args: Vec<String>,
    /// Timeout for one full run.
    #[serde(default = "default_orchestrator_timeout")]
    pub timeout: Duration,
    /// Pre-supplied signing key for relay-signed flows. Never serialized.
    #[serde(skip_serializing, default)]
    pub signer_key: Option<String>,
}

fn default_orchestrator_timeout() -> Duration {
    DEFAULT_ORCHESTRATOR_TIMEOUT
}

/// Request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum recipients in one bulk settlement.
    pub bulk_max_recipients: usize,
    /// Per-address mutating-action budget within the window.
    pub rate_limit_max_actions: u32,
    /// Rate limit window.
    pub rate_limit_window: Duration,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            bulk_max_recipients: DEFAULT_BULK_MAX_RECIPIENTS,
            rate_limit_max_actions: RATE_LIMIT_MAX_ACTIONS,
            rate_limit_window: RATE_LIMIT_WINDOW,
        }
    }
}

/// AckLink expiry bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Lifetime applied when the caller does not request one.
    pub default_expiry: Duration,
    /// Upper bound on a caller-requested lifetime.
    pub max_expiry: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self { default_expiry: DEFAULT_LINK_EXPIRY, max_expiry: MAX_LINK_EXPIRY }
    }
}

impl RelayConfig {
    /// Checks that every required endpoint and contract address is present.
    ///
    /// Configuration problems are reported with their configuration source
    /// so operators can fix them without reading code.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.endpoints.is_empty() {
            return Err(ConfigError::MissingEndpoint("chain.endpoints"));
        }
        if self.chain.bundler_endpoints.is_empty() {
            return Err(ConfigError::MissingEndpoint("chain.bundler_endpoints"));
        }
        for (addr, source) in [
            (self.contracts.entrypoint, "contracts.entrypoint"),
            (self.contracts.factory, "contracts.factory"),
            (self.contracts.router, "contracts.router"),
            (self.contracts.paymaster, "contracts.paymaster"),
            (self.contracts.vault, "contracts.vault"),
            (self.contracts.permit2, "contracts.permit2"),
            (self.contracts.fee_token, "contracts.fee_token"),
            (self.contracts.bulk_token, "contracts.bulk_token"),
        ] {
            if addr.is_zero() {
                return Err(ConfigError::MissingAddress(source));
            }
        }
        if self.orchestrator.program.is_empty() {
            return Err(ConfigError::InvalidValue {
                source_hint: "orchestrator.program",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// The effective fee ceiling when the request does not supply one.
    pub fn default_max_fee_usd6(&self) -> u64 {
        self.quote.default_max_fee_usd6.unwrap_or(DEFAULT_MAX_FEE_USD6)
    }

    /// The contract addresses in orchestrator-request form.
    pub fn orchestrator_contracts(&self) -> OrchestratorContracts {
        OrchestratorContracts {
            entrypoint: self.contracts.entrypoint,
            factory: self.contracts.factory,
            router: self.contracts.router,
            paymaster: self.contracts.paymaster,
            vault: self.contracts.vault,
        }
    }

    /// Clamps a requested link lifetime to the configured bounds.
    pub fn link_expiry(&self, requested_secs: Option<u64>) -> Duration {
        match requested_secs {
            Some(secs) => Duration::from_secs(secs).min(self.acklink.max_expiry),
            None => self.acklink.default_expiry,
        }
    }

    /// Sets the port to serve on.
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Sets the address to serve on.
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.server.address = address;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    pub(crate) fn valid() -> RelayConfig {
        RelayConfig {
            server: ServerConfig::default(),
            chain: ChainConfig {
                chain_id: 8453,
                endpoints: vec![Url::parse("http://localhost:8545").unwrap()],
                bundler_endpoints: vec![Url::parse("http://localhost:4337").unwrap()],
            },
            contracts: ContractsConfig {
                entrypoint: address!("0000000071727de22e5e9d8baf0edac6f37da032"),
                factory: address!("1111111111111111111111111111111111111111"),
                router: address!("2222222222222222222222222222222222222222"),
                paymaster: address!("3333333333333333333333333333333333333333"),
                vault: address!("4444444444444444444444444444444444444444"),
                permit2: address!("000000000022d473030f116ddee9f6b43ac78ba3"),
                fee_token: address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
                bulk_token: address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            },
            quote: QuoteConfig::default(),
            orchestrator: OrchestratorConfig {
                program: "node".into(),
                args: vec!["orchestrate.mjs".into()],
                timeout: DEFAULT_ORCHESTRATOR_TIMEOUT,
                signer_key: None,
            },
            lanes: LaneLists::default(),
            limits: LimitsConfig::default(),
            acklink: LinkConfig::default(),
            collaborators: CollaboratorsConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn zero_address_is_rejected_with_source() {
        let mut config = valid();
        config.contracts.paymaster = Address::ZERO;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("contracts.paymaster"));
    }

    #[test]
    fn missing_endpoints_are_rejected() {
        let mut config = valid();
        config.chain.bundler_endpoints.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEndpoint("chain.bundler_endpoints"))
        ));
    }

    #[test]
    fn link_expiry_is_clamped() {
        let config = valid();
        assert_eq!(config.link_expiry(None), DEFAULT_LINK_EXPIRY);
        assert_eq!(config.link_expiry(Some(60)), Duration::from_secs(60));
        assert_eq!(config.link_expiry(Some(u64::MAX)), MAX_LINK_EXPIRY);
    }
}
