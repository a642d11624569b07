//! AckLink types.
//!
//! An AckLink escrows funds at creation and releases them to whoever
//! successfully claims before expiry, or back to the sender after.

use crate::{
    error::LinkError,
    types::lane::CanonicalSpeed,
};
use alloy::primitives::{keccak256, Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stored AckLink status.
///
/// `EXPIRED` is deliberately absent: expiry is a derived, read-time view
/// (see [`LinkStatusView`]), never written to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    /// Funds are escrowed and claimable.
    Created,
    /// Funds were released to a claimer.
    Claimed,
    /// Funds were returned to the sender after expiry.
    Refunded,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Claimed => "CLAIMED",
            Self::Refunded => "REFUNDED",
        };
        f.write_str(s)
    }
}

/// The status as presented to callers, with expiry folded in at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatusView {
    /// Claimable.
    Created,
    /// Claimed.
    Claimed,
    /// Refunded.
    Refunded,
    /// Still `CREATED` in storage, but past its expiry.
    Expired,
}

impl LinkStatusView {
    /// Derives the caller-facing status from the stored status, the link's
    /// expiry and the current time. Pure; never touches storage.
    pub fn derive(status: LinkStatus, expires_at: u64, now: u64) -> Self {
        match status {
            LinkStatus::Created if now >= expires_at => Self::Expired,
            LinkStatus::Created => Self::Created,
            LinkStatus::Claimed => Self::Claimed,
            LinkStatus::Refunded => Self::Refunded,
        }
    }
}

/// Caller-supplied display metadata attached to a link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMeta {
    /// Display name of the sender.
    #[serde(default)]
    pub name: Option<String>,
    /// Message shown to the claimer.
    #[serde(default)]
    pub message: Option<String>,
    /// Free-form payment reason.
    #[serde(default)]
    pub reason: Option<String>,
}

impl LinkMeta {
    /// Hash of the metadata as bound into the link id.
    pub fn digest(&self) -> B256 {
        let mut buf = Vec::new();
        for field in [&self.name, &self.message, &self.reason] {
            match field {
                Some(s) => {
                    buf.extend_from_slice(&(s.len() as u64).to_be_bytes());
                    buf.extend_from_slice(s.as_bytes());
                }
                None => buf.extend_from_slice(&u64::MAX.to_be_bytes()),
            }
        }
        keccak256(&buf)
    }
}

/// Transaction and user operation hashes recorded per link action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkHashes {
    /// Canonical user operation hash.
    pub user_op_hash: Option<B256>,
    /// On-chain transaction hash, once known.
    pub tx_hash: Option<B256>,
}

/// A persisted AckLink row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckLink {
    /// Deterministic link id; see [`derive_link_id`].
    pub link_id: B256,
    /// The escrowing smart account (not the owner EOA).
    pub sender: Address,
    /// The escrowed token.
    pub token: Address,
    /// Escrowed amount in token units (USDC6 for the supported token).
    pub amount_usdc6: U256,
    /// Sponsor fee collected at creation, in token units.
    pub fee_usdc6: U256,
    /// Canonical fee mode at creation.
    pub speed: String,
    /// Stored status.
    pub status: LinkStatus,
    /// Unix expiry timestamp in seconds.
    pub expires_at: u64,
    /// Display metadata.
    pub meta: LinkMeta,
    /// Where the funds went on claim.
    pub claimed_to: Option<Address>,
    /// Hashes for the create action.
    pub create_hashes: LinkHashes,
    /// Hashes for the claim action.
    pub claim_hashes: LinkHashes,
    /// Hashes for the refund action.
    pub refund_hashes: LinkHashes,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

impl AckLink {
    /// The caller-facing status at `now`.
    pub fn status_view(&self, now: u64) -> LinkStatusView {
        LinkStatusView::derive(self.status, self.expires_at, now)
    }

    /// Checks that a claim is permitted at `now`.
    pub fn ensure_claimable(&self, now: u64) -> Result<(), LinkError> {
        match self.status_view(now) {
            LinkStatusView::Created => Ok(()),
            LinkStatusView::Expired => Err(LinkError::Expired(self.link_id)),
            _ => Err(LinkError::InvalidStatus { link_id: self.link_id, status: self.status }),
        }
    }

    /// Checks that a refund is permitted at `now`. The inverse guard of
    /// [`Self::ensure_claimable`]: refunds require expiry.
    pub fn ensure_refundable(&self, now: u64) -> Result<(), LinkError> {
        match self.status_view(now) {
            LinkStatusView::Expired => Ok(()),
            LinkStatusView::Created => Err(LinkError::NotExpired(self.link_id)),
            _ => Err(LinkError::InvalidStatus { link_id: self.link_id, status: self.status }),
        }
    }
}

/// Derives a link id as a hash over the creation inputs.
///
/// The vault nonce advances on every successful create, so retried creates
/// with identical inputs cannot collide with a previously settled link.
pub fn derive_link_id(
    sender: Address,
    amount: U256,
    expires_at: u64,
    meta_hash: B256,
    nonce: U256,
    chain_id: u64,
    vault: Address,
) -> B256 {
    let mut buf = Vec::with_capacity(20 + 32 + 8 + 32 + 32 + 8 + 20);
    buf.extend_from_slice(sender.as_slice());
    buf.extend_from_slice(&amount.to_be_bytes::<32>());
    buf.extend_from_slice(&expires_at.to_be_bytes());
    buf.extend_from_slice(meta_hash.as_slice());
    buf.extend_from_slice(&nonce.to_be_bytes::<32>());
    buf.extend_from_slice(&chain_id.to_be_bytes());
    buf.extend_from_slice(vault.as_slice());
    keccak256(&buf)
}

/// Builds a fresh `CREATED` row from creation inputs.
#[allow(clippy::too_many_arguments)]
pub fn new_link(
    link_id: B256,
    sender: Address,
    token: Address,
    amount_usdc6: U256,
    fee_usdc6: U256,
    speed: &CanonicalSpeed,
    expires_at: u64,
    meta: LinkMeta,
    create_hashes: LinkHashes,
) -> AckLink {
    AckLink {
        link_id,
        sender,
        token,
        amount_usdc6,
        fee_usdc6,
        speed: speed.fee_mode.clone(),
        status: LinkStatus::Created,
        expires_at,
        meta,
        claimed_to: None,
        create_hashes,
        claim_hashes: LinkHashes::default(),
        refund_hashes: LinkHashes::default(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn sample(status: LinkStatus, expires_at: u64) -> AckLink {
        AckLink {
            link_id: B256::repeat_byte(1),
            sender: address!("2222222222222222222222222222222222222222"),
            token: address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            amount_usdc6: U256::from(5_000_000u64),
            fee_usdc6: U256::from(30_000u64),
            speed: "eco".into(),
            status,
            expires_at,
            meta: LinkMeta::default(),
            claimed_to: None,
            create_hashes: LinkHashes::default(),
            claim_hashes: LinkHashes::default(),
            refund_hashes: LinkHashes::default(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn expired_is_derived_not_stored() {
        let link = sample(LinkStatus::Created, 100);
        assert_eq!(link.status_view(99), LinkStatusView::Created);
        assert_eq!(link.status_view(100), LinkStatusView::Expired);
        // The stored status is untouched by the view.
        assert_eq!(link.status, LinkStatus::Created);
    }

    #[test]
    fn claim_rejected_after_expiry() {
        let link = sample(LinkStatus::Created, 100);
        assert!(link.ensure_claimable(50).is_ok());
        assert!(matches!(link.ensure_claimable(150), Err(LinkError::Expired(_))));
    }

    #[test]
    fn refund_rejected_before_expiry() {
        let link = sample(LinkStatus::Created, 100);
        assert!(matches!(link.ensure_refundable(50), Err(LinkError::NotExpired(_))));
        assert!(link.ensure_refundable(150).is_ok());
    }

    #[test]
    fn settled_links_reject_both_actions() {
        for status in [LinkStatus::Claimed, LinkStatus::Refunded] {
            let link = sample(status, 100);
            assert!(matches!(
                link.ensure_claimable(50),
                Err(LinkError::InvalidStatus { .. })
            ));
            assert!(matches!(
                link.ensure_refundable(150),
                Err(LinkError::InvalidStatus { .. })
            ));
        }
    }

    #[test]
    fn link_id_is_a_pure_function_of_inputs() {
        let sender = address!("2222222222222222222222222222222222222222");
        let vault = address!("3333333333333333333333333333333333333333");
        let meta_hash = LinkMeta::default().digest();
        let id = |nonce: u64| {
            derive_link_id(
                sender,
                U256::from(5_000_000u64),
                1_700_000_000,
                meta_hash,
                U256::from(nonce),
                8453,
                vault,
            )
        };
        assert_eq!(id(7), id(7));
        assert_ne!(id(7), id(8));
    }

    #[test]
    fn meta_digest_distinguishes_none_from_empty() {
        let none = LinkMeta::default();
        let empty = LinkMeta { name: Some(String::new()), ..Default::default() };
        assert_ne!(none.digest(), empty.digest());
    }
}
