//! Relay error types.
//!
//! Every error that can cross the API boundary maps to a stable string
//! `code` and an HTTP status. Subprocess diagnostics (captured
//! stdout/stderr) stay in operator logs and are never serialized into a
//! response.

use alloy::transports::TransportErrorKind;
use serde_json::Value;
use thiserror::Error;

mod config;
pub use config::ConfigError;

mod quote;
pub use quote::QuoteError;

mod link;
pub use link::LinkError;

mod bulk;
pub use bulk::BulkError;

mod orchestrator;
pub use orchestrator::OrchestratorError;

mod storage;
pub use storage::StorageError;

/// A structured timeout produced by the bounded-call supervisor.
///
/// Carries the stable code and HTTP-style status of the operation class that
/// timed out (`RPC_TIMEOUT` for chain calls, `ORCHESTRATOR_TIMEOUT` for
/// subprocess runs).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TimeoutError {
    /// Stable error code, e.g. `RPC_TIMEOUT`.
    pub code: &'static str,
    /// HTTP-style status, 504 for all timeout classes.
    pub status: u16,
    /// Human readable message.
    pub message: String,
}

/// The overarching relay error type.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Errors in operator-supplied configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Errors related to quotes and request validation.
    #[error(transparent)]
    Quote(#[from] QuoteError),
    /// Errors related to the AckLink state machine.
    #[error(transparent)]
    Link(#[from] LinkError),
    /// Errors related to bulk settlement.
    #[error(transparent)]
    Bulk(#[from] BulkError),
    /// Errors related to the settlement orchestrator.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    /// Errors related to storage.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A bounded call exceeded its deadline.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    /// The subject exceeded its per-address action budget.
    #[error("rate limit exceeded for {subject}")]
    RateLimited {
        /// The throttled address.
        subject: alloy::primitives::Address,
    },
    /// An error occurred talking to RPC.
    #[error(transparent)]
    Rpc(#[from] alloy::transports::RpcError<TransportErrorKind>),
    /// An error occurred in a contract call.
    #[error(transparent)]
    Contract(#[from] alloy::contract::Error),
    /// An error occurred during ABI encoding/decoding.
    #[error(transparent)]
    Abi(#[from] alloy::sol_types::Error),
    /// An internal error occurred.
    #[error(transparent)]
    Internal(#[from] eyre::Error),
}

impl RelayError {
    /// The stable error code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(inner) => inner.code(),
            Self::Quote(inner) => inner.code(),
            Self::Link(inner) => inner.code(),
            Self::Bulk(inner) => inner.code(),
            Self::Orchestrator(inner) => inner.code(),
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Timeout(inner) => inner.code,
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Rpc(_) | Self::Contract(_) => "RPC_ERROR",
            Self::Abi(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The HTTP status the error surfaces as.
    pub fn status(&self) -> u16 {
        match self {
            Self::Config(inner) => inner.status(),
            Self::Quote(inner) => inner.status(),
            Self::Link(inner) => inner.status(),
            Self::Bulk(inner) => inner.status(),
            Self::Orchestrator(inner) => inner.status(),
            Self::Storage(_) => 500,
            Self::Timeout(inner) => inner.status,
            Self::RateLimited { .. } => 429,
            Self::Rpc(_) | Self::Contract(_) => 502,
            Self::Abi(_) | Self::Internal(_) => 500,
        }
    }

    /// Structured data attached to the error response, if any.
    ///
    /// Used by rejections that callers are expected to react to, e.g.
    /// `MAX_FEE_TOO_LOW` reporting the minimum acceptable cap.
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::Quote(inner) => inner.data(),
            _ => None,
        }
    }

    /// The message exposed to callers.
    ///
    /// Orchestrator failures collapse to a generic message; their captured
    /// subprocess output is for operator logs only.
    pub fn public_message(&self) -> String {
        match self {
            Self::Orchestrator(inner) => inner.public_message(),
            Self::Internal(_) => "internal error".into(),
            other => other.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type RelayResult<T> = Result<T, RelayError>;
