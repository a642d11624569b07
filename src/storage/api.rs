//! Relay storage api.

use crate::{
    error::StorageError,
    types::{AckLink, LinkHashes},
};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::fmt::Debug;

/// Type alias for `Result<T, StorageError>`.
pub type Result<T> = core::result::Result<T, StorageError>;

/// Storage API.
///
/// The relational store behind this trait is an external collaborator; the
/// trait is its contract. Single-entity lookups return at most one row.
/// Uniqueness of `link_id` is enforced here, which is what distinguishes
/// two concurrent identical creates; this crate does not serialize
/// concurrent writers otherwise.
#[async_trait]
pub trait StorageApi: Debug + Send + Sync {
    /// Inserts a new [`AckLink`] row. Fails with [`StorageError::LinkExists`]
    /// when a row with the same id is already present.
    async fn write_link(&self, link: &AckLink) -> Result<()>;

    /// Reads an [`AckLink`] row.
    async fn read_link(&self, link_id: B256) -> Result<Option<AckLink>>;

    /// Transitions a link to `CLAIMED`, recording the destination and the
    /// claim hashes. Compare-and-set on the stored status being `CREATED`.
    async fn mark_link_claimed(
        &self,
        link_id: B256,
        claimed_to: Address,
        hashes: LinkHashes,
    ) -> Result<AckLink>;

    /// Transitions a link to `REFUNDED`, recording the refund hashes.
    /// Compare-and-set on the stored status being `CREATED`.
    async fn mark_link_refunded(&self, link_id: B256, hashes: LinkHashes) -> Result<AckLink>;

    /// Records one mutating action for rate limiting.
    async fn record_action(&self, subject: Address, action: &'static str, at: u64) -> Result<()>;

    /// Counts mutating actions by `subject` since `since`.
    async fn count_actions_since(
        &self,
        subject: Address,
        action: &'static str,
        since: u64,
    ) -> Result<u32>;
}
