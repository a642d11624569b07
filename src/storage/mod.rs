//! Relay storage.

mod api;
pub use api::StorageApi;
mod memory;
pub use memory::InMemoryStorage;

use crate::types::{AckLink, LinkHashes};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::sync::Arc;

/// Relay storage interface.
#[derive(Debug, Clone)]
pub struct RelayStorage {
    inner: Arc<dyn StorageApi>,
}

impl RelayStorage {
    /// Creates [`RelayStorage`] with an in-memory backend.
    pub fn in_memory() -> Self {
        Self { inner: Arc::new(InMemoryStorage::default()) }
    }

    /// Creates [`RelayStorage`] over a custom backend.
    pub fn new(inner: Arc<dyn StorageApi>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageApi for RelayStorage {
    async fn write_link(&self, link: &AckLink) -> api::Result<()> {
        self.inner.write_link(link).await
    }

    async fn read_link(&self, link_id: B256) -> api::Result<Option<AckLink>> {
        self.inner.read_link(link_id).await
    }

    async fn mark_link_claimed(
        &self,
        link_id: B256,
        claimed_to: Address,
        hashes: LinkHashes,
    ) -> api::Result<AckLink> {
        self.inner.mark_link_claimed(link_id, claimed_to, hashes).await
    }

    async fn mark_link_refunded(&self, link_id: B256, hashes: LinkHashes) -> api::Result<AckLink> {
        self.inner.mark_link_refunded(link_id, hashes).await
    }

    async fn record_action(
        &self,
        subject: Address,
        action: &'static str,
        at: u64,
    ) -> api::Result<()> {
        self.inner.record_action(subject, action, at).await
    }

    async fn count_actions_since(
        &self,
        subject: Address,
        action: &'static str,
        since: u64,
    ) -> api::Result<u32> {
        self.inner.count_actions_since(subject, action, since).await
    }
}
