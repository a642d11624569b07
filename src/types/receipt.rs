//! Receipt collaborator payloads.

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A receipt record created after a settled action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReceipt {
    /// Chain id.
    pub chain_id: u64,
    /// Canonical user operation hash.
    pub user_op_hash: Option<B256>,
    /// On-chain transaction hash.
    pub tx_hash: Option<B256>,
    /// The funds source (smart account for sponsored flows).
    pub from: Address,
    /// The smart account.
    pub sender: Address,
    /// The owner EOA.
    pub owner_eoa: Address,
    /// The token moved.
    pub token: Address,
    /// Settlement mode label, e.g. `SPONSORED`.
    pub mode: String,
    /// Canonical fee mode, `eco` or `instant`.
    pub fee_mode: String,
    /// The amount the user entered.
    pub total_entered: U256,
    /// The sponsor fee in token units.
    pub fee_amount: U256,
    /// The total debited from the sender.
    pub total_debited: U256,
    /// Display name.
    pub name: Option<String>,
    /// Display message.
    pub message: Option<String>,
    /// Payment reason.
    pub reason: Option<String>,
    /// The recipient, for single-recipient actions.
    pub to: Option<Address>,
    /// The route that produced the receipt, e.g. `acklink/create`.
    pub route: String,
    /// Free-form extra metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// An encrypted private note attached to a receipt, authenticated against
/// the receipt's recorded owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateNote {
    /// The receipt the note attaches to.
    pub receipt_id: String,
    /// The note author (smart account).
    pub sender: Address,
    /// Ciphertext.
    pub note: String,
    /// Owner signature over the note.
    pub signature: String,
    /// Chain id.
    pub chain_id: u64,
}
