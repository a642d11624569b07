//! Quote types.

use crate::types::Lane;
use alloy::primitives::{Address, I256, U256};
use serde::{Deserialize, Serialize};

/// Advisory setup gaps discovered while quoting.
///
/// These are hints, never hard failures; the caller decides how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetupTag {
    /// The owner's ERC-20 allowance to the Permit2 contract does not cover
    /// the payment.
    MissingPermit2Allowance,
    /// The deployed smart account's allowance to the router does not cover
    /// the payment.
    MissingRouterAllowance,
}

/// A sponsor-fee quote for a single payment.
///
/// Ephemeral, computed per request, never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Whether gas is sponsored.
    pub sponsored: bool,
    /// The settlement lane the payment will take.
    pub lane: Lane,
    /// The sponsor fee in USD6.
    pub fee_usd6: U256,
    /// The baseline component of the fee in USD6.
    pub baseline_usd6: U256,
    /// The first-transaction surcharge component in USD6.
    pub surcharge_usd6: U256,
    /// The paymaster's fee cap in basis points.
    pub cap_bps: U256,
    /// Whether the first-transaction surcharge applies to this payer.
    pub first_tx_surcharge_applies: bool,
    /// The fee expressed in the paid token's smallest unit, rounded up.
    pub fee_token_amount: U256,
    /// The effective fee ceiling that was applied, in USD6.
    pub max_fee_usd6: U256,
    /// Amount minus fee, in token units. May be negative; that is a
    /// caller-facing concern, not enforced here.
    pub net_amount: I256,
    /// The counterfactual smart account, when resolved.
    pub smart_sender: Option<Address>,
    /// Whether the smart account is already deployed, when determinable.
    pub smart_deployed: Option<bool>,
    /// Advisory setup gaps.
    pub setup_needed: Vec<SetupTag>,
}

impl Quote {
    /// A zero-fee, non-sponsored quote for self-pay settlement.
    pub fn self_pay(amount: U256) -> Self {
        Self {
            sponsored: false,
            lane: Lane::SelfPay,
            fee_usd6: U256::ZERO,
            baseline_usd6: U256::ZERO,
            surcharge_usd6: U256::ZERO,
            cap_bps: U256::ZERO,
            first_tx_surcharge_applies: false,
            fee_token_amount: U256::ZERO,
            max_fee_usd6: U256::ZERO,
            net_amount: I256::try_from(amount).unwrap_or(I256::MAX),
            smart_sender: None,
            smart_deployed: None,
            setup_needed: Vec::new(),
        }
    }
}

/// Facts about a fee token needed to convert USD6 fees to token units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFacts {
    /// ERC-20 decimals.
    pub decimals: u8,
    /// USD6 per whole token.
    pub price_usd6: U256,
}

/// The resolved counterfactual smart account for an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartAccountFact {
    /// The deterministic smart account address.
    pub sender: Address,
    /// Whether code is present at the address.
    pub deployed: bool,
}
