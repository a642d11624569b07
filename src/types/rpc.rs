//! HTTP request and response types.
//!
//! Caller-supplied addresses and amounts arrive as strings and are parsed
//! explicitly, so malformed input surfaces as `invalid_request` instead of a
//! deserializer error.

use crate::types::{
    link::{LinkMeta, LinkStatusView},
    BulkFeeMode, Quote, SettlementMode, SpeedInput,
};
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters for `POST /quote`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteParameters {
    /// The owner EOA.
    pub owner: String,
    /// The token being paid.
    pub token: String,
    /// Payment amount as a decimal-string integer in token units.
    pub amount: String,
    /// Textual fee mode, `eco` or `instant`.
    #[serde(default)]
    pub fee_mode: Option<String>,
    /// Numeric or textual speed code.
    #[serde(default)]
    pub speed: Option<SpeedInput>,
    /// Settlement mode; defaults to sponsored.
    #[serde(default)]
    pub mode: SettlementMode,
    /// Caller-supplied fee ceiling in USD6.
    #[serde(default)]
    pub max_fee_usd6: Option<U256>,
}

/// Parameters for `POST /send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendParameters {
    /// The quote-relevant fields.
    #[serde(flatten)]
    pub quote: QuoteParameters,
    /// The recipient address.
    pub recipient: String,
    /// Lane-specific signed authorization payload.
    #[serde(default)]
    pub authorization: Option<Value>,
    /// Continuation: signature over a previously returned operation hash.
    #[serde(default)]
    pub user_op_signature: Option<Bytes>,
    /// Continuation: the previously returned draft, echoed back.
    #[serde(default)]
    pub user_op_draft: Option<Value>,
}

/// A signed EIP-3009 transfer authorization, supplied by the caller for
/// bulk settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAuthorization {
    /// The authorizing account.
    pub from: Address,
    /// The authorized spender; must equal the router.
    pub to: Address,
    /// The authorized value; must equal the total debited.
    pub value: U256,
    /// Validity window start.
    pub valid_after: U256,
    /// Validity window end.
    pub valid_before: U256,
    /// 32-byte authorization nonce.
    pub nonce: B256,
    /// EIP-712 signature.
    pub signature: Bytes,
}

/// Parameters for `POST /acklink/create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkParameters {
    /// The owner EOA of the sending smart account.
    pub owner: String,
    /// Escrow amount as a decimal-string integer in token units.
    pub amount: String,
    /// Textual fee mode.
    #[serde(default)]
    pub fee_mode: Option<String>,
    /// Numeric or textual speed code.
    #[serde(default)]
    pub speed: Option<SpeedInput>,
    /// Requested link lifetime in seconds; clamped to the configured bound.
    #[serde(default)]
    pub expiry_secs: Option<u64>,
    /// Continuation: the absolute expiry returned by the first phase,
    /// echoed back so the link id derivation stays stable across phases.
    #[serde(default)]
    pub expires_at: Option<u64>,
    /// Display metadata.
    #[serde(default)]
    pub meta: LinkMeta,
    /// Lane-specific signed authorization payload.
    #[serde(default)]
    pub authorization: Option<Value>,
    /// Optional encrypted note to attach to the receipt.
    #[serde(default)]
    pub note: Option<NoteInput>,
    /// Continuation: signature over a previously returned operation hash.
    #[serde(default)]
    pub user_op_signature: Option<Bytes>,
    /// Continuation: the previously returned draft, echoed back.
    #[serde(default)]
    pub user_op_draft: Option<Value>,
}

/// An encrypted note attached at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInput {
    /// Ciphertext.
    pub note: String,
    /// Owner signature over the note.
    pub signature: String,
}

/// Parameters for `POST /acklink/claim`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimLinkParameters {
    /// The link to claim.
    pub link_id: B256,
    /// The owner EOA of the claiming smart account.
    pub owner: String,
    /// Continuation: signature over a previously returned operation hash.
    #[serde(default)]
    pub user_op_signature: Option<Bytes>,
    /// Continuation: the previously returned draft, echoed back.
    #[serde(default)]
    pub user_op_draft: Option<Value>,
}

/// Parameters for `POST /acklink/refund`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundLinkParameters {
    /// The link to refund.
    pub link_id: B256,
    /// The owner EOA of the original sender.
    pub owner: String,
    /// Continuation: signature over a previously returned operation hash.
    #[serde(default)]
    pub user_op_signature: Option<Bytes>,
    /// Continuation: the previously returned draft, echoed back.
    #[serde(default)]
    pub user_op_draft: Option<Value>,
}

/// Parameters for `POST /bulk/send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendParameters {
    /// The owner EOA of the sending smart account.
    pub owner: String,
    /// The token to move; must be the bulk-supported token.
    pub token: String,
    /// Recipient addresses.
    pub recipients: Vec<String>,
    /// Gross amounts as decimal-string integers, parallel to `recipients`.
    pub amounts: Vec<String>,
    /// How the fee is accounted for.
    #[serde(default)]
    pub fee_split: BulkFeeMode,
    /// Textual fee mode.
    #[serde(default)]
    pub fee_mode: Option<String>,
    /// Numeric or textual speed code.
    #[serde(default)]
    pub speed: Option<SpeedInput>,
    /// Idempotency key; derived from the inputs when absent.
    #[serde(default)]
    pub reference_id: Option<B256>,
    /// The signed transfer authorization covering the total debit.
    pub authorization: TransferAuthorization,
    /// Continuation: signature over a previously returned operation hash.
    #[serde(default)]
    pub user_op_signature: Option<Bytes>,
    /// Continuation: the previously returned draft, echoed back.
    #[serde(default)]
    pub user_op_draft: Option<Value>,
}

/// Response for `POST /quote`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    /// The computed quote.
    #[serde(flatten)]
    pub quote: Quote,
    /// Echoed request id.
    pub request_id: String,
}

/// A settled mutating action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettledResponse {
    /// Always `"submitted"`.
    pub status: String,
    /// Canonical user operation hash.
    pub user_op_hash: B256,
    /// On-chain transaction hash, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    /// The link id, for AckLink actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_id: Option<B256>,
    /// The recorded receipt id, when a receipt was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    /// The bulk idempotency key, for bulk actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<B256>,
    /// Echoed request id.
    pub request_id: String,
}

/// The two-phase continuation payload. Not an error: the caller forwards
/// `userOpHash` to the wallet for signing and re-invokes the same route with
/// `userOpSignature` and this draft attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeedsSignatureResponse {
    /// Always true; discriminates the continuation payload.
    pub needs_user_op_signature: bool,
    /// Hash for the wallet to sign.
    pub user_op_hash: B256,
    /// The unsigned draft to echo back.
    pub user_op_draft: Value,
    /// The derived link id, for AckLink creation continuations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_id: Option<B256>,
    /// The absolute expiry bound into the link id, echoed back by the
    /// second phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Echoed request id.
    pub request_id: String,
}

/// Response for a mutating action: either settled or awaiting a signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResponse {
    /// The operation needs the end-user wallet's signature.
    NeedsSignature(NeedsSignatureResponse),
    /// The operation was submitted.
    Settled(SettledResponse),
}

/// Caller-facing view of an AckLink, `GET /acklink/:link_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkView {
    /// The link id.
    pub link_id: B256,
    /// The escrowing smart account.
    pub sender: Address,
    /// The escrowed token.
    pub token: Address,
    /// Escrowed amount in token units.
    pub amount_usdc6: U256,
    /// Sponsor fee collected at creation.
    pub fee_usdc6: U256,
    /// Fee mode at creation.
    pub speed: String,
    /// Derived status, with expiry folded in at read time.
    pub status: LinkStatusView,
    /// Unix expiry timestamp in seconds.
    pub expires_at: u64,
    /// Display metadata.
    pub meta: LinkMeta,
    /// Where the funds went on claim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_to: Option<Address>,
    /// Echoed request id.
    pub request_id: String,
}

/// Health endpoint payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    /// Service status; always `"ok"` when reachable.
    pub status: String,
    /// Crate version.
    pub version: String,
}
