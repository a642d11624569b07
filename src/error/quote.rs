use alloy::primitives::{Address, U256};
use serde_json::{json, Value};
use thiserror::Error;

/// Errors related to quotes and request validation.
#[derive(Debug, Clone, Error)]
pub enum QuoteError {
    /// The request is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A request field does not parse as an address.
    #[error("invalid address in field `{field}`: {value}")]
    InvalidAddress {
        /// The offending request field.
        field: &'static str,
        /// The raw value.
        value: String,
    },
    /// The amount is missing, not a decimal integer string, or zero.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    /// The supplied fee cap is below the computed fee.
    #[error("max fee too low: fee is {fee_usd6} usd6, cap is {max_fee_usd6} usd6")]
    MaxFeeTooLow {
        /// The computed sponsor fee.
        fee_usd6: U256,
        /// The effective cap that was applied.
        max_fee_usd6: U256,
    },
    /// The fee token price is unavailable or zero.
    #[error("fee token price not currently available: {0}")]
    UnavailablePrice(Address),
    /// Insufficient balance to cover the total debit.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// The required amount (principal plus fee).
        required: U256,
        /// The available token balance.
        available: U256,
    },
}

impl QuoteError {
    /// The stable error code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::InvalidAddress { .. } => "invalid_request",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::MaxFeeTooLow { .. } => "MAX_FEE_TOO_LOW",
            Self::UnavailablePrice(_) => "PRICE_UNAVAILABLE",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
        }
    }

    /// The HTTP status the error surfaces as.
    pub fn status(&self) -> u16 {
        match self {
            Self::UnavailablePrice(_) => 502,
            _ => 400,
        }
    }

    /// Structured rejection data, so callers can retry with adjusted inputs.
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::MaxFeeTooLow { fee_usd6, max_fee_usd6 } => Some(json!({
                "feeUsd6": fee_usd6.to_string(),
                "maxFeeUsd6": max_fee_usd6.to_string(),
                // The minimum cap a retry must carry is exactly the fee.
                "requiredMinMaxFeeUsd6": fee_usd6.to_string(),
            })),
            _ => None,
        }
    }
}
