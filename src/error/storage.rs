use alloy::primitives::B256;
use thiserror::Error;

/// Errors related to storage.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// A row with the same key already exists.
    ///
    /// For AckLinks this is the store-level uniqueness constraint that
    /// distinguishes two concurrent identical creates.
    #[error("link already exists: {0}")]
    LinkExists(B256),
    /// An update targeted a row that does not exist.
    #[error("row not found: {0}")]
    RowNotFound(B256),
    /// An update lost a compare-and-set race on the row's status.
    #[error("conflicting update on {0}")]
    Conflict(B256),
    /// The backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}
