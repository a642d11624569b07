//! Bulk settlement types.

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// How the sponsor fee is accounted for in a bulk settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkFeeMode {
    /// The fee is deducted from the last recipient's amount; the total
    /// debited equals the pre-fee sum.
    #[default]
    Net,
    /// Recipients receive their gross amounts; the fee is debited on top.
    PlusFee,
}

/// The computed split for one bulk settlement. Ephemeral, per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSettlement {
    /// Recipient addresses.
    pub recipients: Vec<Address>,
    /// Caller-supplied gross amounts.
    pub gross_amounts: Vec<U256>,
    /// The sponsor fee in token units.
    pub fee: U256,
    /// The fee accounting mode.
    pub mode: BulkFeeMode,
    /// Per-recipient amounts after fee accounting.
    pub adjusted_amounts: Vec<U256>,
    /// The total debited from the sender.
    pub total_debited: U256,
    /// Idempotency key; input-derived when the caller omits one.
    pub reference_id: B256,
}
