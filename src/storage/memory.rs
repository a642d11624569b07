//! Relay storage implementation in-memory.

use super::{api::Result, StorageApi};
use crate::{
    error::StorageError,
    types::{AckLink, LinkHashes, LinkStatus},
};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use dashmap::DashMap;

/// [`StorageApi`] implementation in-memory.
///
/// Suitable for tests and single-instance deployments without a database.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    links: DashMap<B256, AckLink>,
    actions: DashMap<(Address, &'static str), Vec<u64>>,
}

#[async_trait]
impl StorageApi for InMemoryStorage {
    async fn write_link(&self, link: &AckLink) -> Result<()> {
        match self.links.entry(link.link_id) {
            dashmap::Entry::Occupied(_) => Err(StorageError::LinkExists(link.link_id)),
            dashmap::Entry::Vacant(slot) => {
                slot.insert(link.clone());
                Ok(())
            }
        }
    }

    async fn read_link(&self, link_id: B256) -> Result<Option<AckLink>> {
        Ok(self.links.get(&link_id).map(|row| (*row).clone()))
    }

    async fn mark_link_claimed(
        &self,
        link_id: B256,
        claimed_to: Address,
        hashes: LinkHashes,
    ) -> Result<AckLink> {
        let mut row = self.links.get_mut(&link_id).ok_or(StorageError::RowNotFound(link_id))?;
        if row.status != LinkStatus::Created {
            return Err(StorageError::Conflict(link_id));
        }
        row.status = LinkStatus::Claimed;
        row.claimed_to = Some(claimed_to);
        row.claim_hashes = hashes;
        Ok((*row).clone())
    }

    async fn mark_link_refunded(&self, link_id: B256, hashes: LinkHashes) -> Result<AckLink> {
        let mut row = self.links.get_mut(&link_id).ok_or(StorageError::RowNotFound(link_id))?;
        if row.status != LinkStatus::Created {
            return Err(StorageError::Conflict(link_id));
        }
        row.status = LinkStatus::Refunded;
        row.refund_hashes = hashes;
        Ok((*row).clone())
    }

    async fn record_action(&self, subject: Address, action: &'static str, at: u64) -> Result<()> {
        self.actions.entry((subject, action)).or_default().push(at);
        Ok(())
    }

    async fn count_actions_since(
        &self,
        subject: Address,
        action: &'static str,
        since: u64,
    ) -> Result<u32> {
        Ok(self
            .actions
            .get(&(subject, action))
            .map(|stamps| stamps.iter().filter(|at| **at >= since).count() as u32)
            .unwrap_or(0))
    }
}
