use thiserror::Error;

/// Errors in operator-supplied configuration.
///
/// These are kept strictly separate from request validation errors so a
/// misconfigured deployment is never mistaken for caller error.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A required endpoint is not configured.
    #[error("missing endpoint configuration: {0}")]
    MissingEndpoint(&'static str),
    /// A required contract address is not configured.
    #[error("missing contract address: {0}")]
    MissingAddress(&'static str),
    /// A configured value failed validation. Carries the configuration
    /// source (CLI flag, env var or config key) for operability.
    #[error("invalid configuration value for {source_hint}: {reason}")]
    InvalidValue {
        /// Where the value came from, e.g. `contracts.factory`.
        source_hint: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// None of the configured endpoint candidates reported the expected
    /// chain id.
    #[error("no configured endpoint reports chain id {expected}")]
    ChainMismatch {
        /// The chain id the relay is configured for.
        expected: u64,
    },
    /// No endpoint candidates were supplied at all.
    #[error("no rpc url candidates supplied for {0}")]
    MissingRpcUrl(&'static str),
}

impl ConfigError {
    /// The stable error code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingEndpoint(_) | Self::MissingAddress(_) | Self::InvalidValue { .. } => {
                "invalid_config"
            }
            Self::ChainMismatch { .. } => "RPC_CHAIN_MISMATCH",
            Self::MissingRpcUrl(_) => "RPC_URL_MISSING",
        }
    }

    /// The HTTP status the error surfaces as.
    pub fn status(&self) -> u16 {
        500
    }
}
