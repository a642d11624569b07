//! Settlement orchestrator protocol types.
//!
//! The orchestrator is a typed message-passing abstraction: callers hand it
//! an [`OrchestratorRequest`] and receive a [`SettlementOutcome`]. The
//! production transport is a supervised subprocess exchanging results over a
//! temporary JSON file, but the protocol types are transport-agnostic.

use crate::types::Lane;
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use url::Url;

/// The action the orchestrator is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorAction {
    /// Single-recipient sponsored send.
    Send,
    /// Escrow funds into a new AckLink.
    LinkCreate,
    /// Release escrowed funds to a claimer.
    LinkClaim,
    /// Return escrowed funds to the sender.
    LinkRefund,
    /// Multi-recipient bulk send.
    BulkSend,
}

impl fmt::Display for OrchestratorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Send => "SEND",
            Self::LinkCreate => "LINK_CREATE",
            Self::LinkClaim => "LINK_CLAIM",
            Self::LinkRefund => "LINK_REFUND",
            Self::BulkSend => "BULK_SEND",
        };
        f.write_str(s)
    }
}

/// Contract addresses the orchestrator needs to build an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorContracts {
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
}

/// Everything the orchestrator needs to build, estimate and submit one
/// account-abstraction operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorRequest {
    /// The requested action.
    pub action: OrchestratorAction,
    /// Chain id.
    pub chain_id: u64,
    /// Verified general RPC endpoint.
    pub rpc_url: Url,
    /// Verified bundler endpoint.
    pub bundler_url: Url,
    /// Contract addresses.
    pub contracts: OrchestratorContracts,
    /// The smart account sending the operation.
    pub sender: Address,
    /// The owner EOA behind the smart account.
    pub owner: Address,
    /// The token being moved.
    pub token: Address,
    /// Recipients. One entry for send/link actions, many for bulk.
    pub recipients: Vec<Address>,
    /// Gross amounts, parallel to `recipients`.
    pub amounts: Vec<U256>,
    /// Sponsor fee in token units.
    pub fee_amount: U256,
    /// Canonical numeric speed code.
    pub speed: u8,
    /// The settlement lane.
    pub lane: Lane,
    /// Lane-specific signed authorization payload (permit, transfer
    /// authorization or Permit2 signature), when the lane requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Value>,
    /// The link id, for AckLink actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<B256>,
    /// Second-phase continuation: the signature over the previously
    /// returned user operation hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_op_signature: Option<Bytes>,
    /// Second-phase continuation: the draft returned by the first phase,
    /// echoed back so construction can be skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_op_draft: Option<Value>,
}

/// The result the orchestrator process writes to its temporary result file.
///
/// A non-zero exit code combined with `needs_user_op_signature == true` is a
/// continuation signal, not a failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorResult {
    /// The operation was built but needs the end-user wallet's signature.
    #[serde(default)]
    pub needs_user_op_signature: bool,
    /// Canonical hash of the built operation.
    #[serde(default)]
    pub user_op_hash: Option<B256>,
    /// The unsigned operation draft, round-tripped through the caller.
    #[serde(default)]
    pub user_op_draft: Option<Value>,
    /// On-chain transaction hash, when the bundler reported inclusion.
    #[serde(default)]
    pub tx_hash: Option<B256>,
    /// Process-reported error message, if any.
    #[serde(default)]
    pub error: Option<String>,
}

/// The typed outcome of a settlement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum SettlementOutcome {
    /// The operation was signed and submitted.
    Submitted {
        /// Canonical user operation hash.
        user_op_hash: B256,
        /// On-chain transaction hash, once known.
        tx_hash: Option<B256>,
    },
    /// The operation was built and must be signed by the end-user wallet;
    /// the caller re-invokes with the signature and this draft attached.
    NeedsSignature {
        /// Hash for the wallet to sign.
        user_op_hash: B256,
        /// The unsigned draft to echo back.
        draft: Value,
    },
}
