use crate::types::LinkStatus;
use alloy::primitives::B256;
use thiserror::Error;

/// Errors related to the AckLink state machine.
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    /// No link with the given id exists.
    #[error("link not found: {0}")]
    NotFound(B256),
    /// The link is not in a state that permits the requested action.
    #[error("link {link_id} has status {status}, action not permitted")]
    InvalidStatus {
        /// The link id.
        link_id: B256,
        /// The stored status that blocked the transition.
        status: LinkStatus,
    },
    /// A claim was attempted on an expired link.
    #[error("link {0} has expired")]
    Expired(B256),
    /// A refund was attempted before the link expired.
    #[error("link {0} has not expired yet")]
    NotExpired(B256),
}

impl LinkError {
    /// The stable error code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidStatus { .. } => "INVALID_STATUS",
            Self::Expired(_) => "EXPIRED",
            Self::NotExpired(_) => "NOT_EXPIRED",
        }
    }

    /// The HTTP status the error surfaces as.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            _ => 400,
        }
    }
}
