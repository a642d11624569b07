use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Errors related to bulk settlement.
#[derive(Debug, Clone, Error)]
pub enum BulkError {
    /// The recipients and amounts arrays differ in length.
    #[error("recipients ({recipients}) and amounts ({amounts}) differ in length")]
    LengthMismatch {
        /// Number of recipients supplied.
        recipients: usize,
        /// Number of amounts supplied.
        amounts: usize,
    },
    /// The recipients array is empty.
    #[error("no recipients supplied")]
    Empty,
    /// Too many recipients for one settlement.
    #[error("too many recipients: {got}, maximum is {max}")]
    TooManyRecipients {
        /// Number of recipients supplied.
        got: usize,
        /// The configured maximum.
        max: usize,
    },
    /// The token is not the single bulk-supported token.
    #[error("token {got} is not supported for bulk settlement, expected {expected}")]
    UnsupportedToken {
        /// The token in the request.
        got: Address,
        /// The configured bulk token.
        expected: Address,
    },
    /// The aggregate quote did not resolve to the transfer-authorization lane.
    #[error("bulk settlement requires the EIP-3009 lane")]
    UnsupportedLane,
    /// In net mode the fee exceeds the last recipient's amount.
    #[error("fee {fee} does not leave a positive amount for the last recipient ({last})")]
    FeeExceedsLastAmount {
        /// The sponsor fee.
        fee: U256,
        /// The last recipient's gross amount.
        last: U256,
    },
    /// A field of the supplied transfer authorization does not match the
    /// computed settlement. Never adjusted silently.
    #[error("authorization mismatch on `{field}`: expected {expected}, got {got}")]
    AuthorizationMismatch {
        /// The mismatched field.
        field: &'static str,
        /// The value computed from the request.
        expected: String,
        /// The value inside the authorization.
        got: String,
    },
}

impl BulkError {
    /// The stable error code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthorizationMismatch { .. } => "AUTH_MISMATCH",
            Self::UnsupportedLane => "UNSUPPORTED_LANE",
            _ => "invalid_request",
        }
    }

    /// The HTTP status the error surfaces as.
    pub fn status(&self) -> u16 {
        400
    }
}
