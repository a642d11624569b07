//! External collaborators.
//!
//! The receipt service, private-note service, rate limiter and
//! sponsorship-cost recorder are collaborators of the settlement core.
//! Whether they live in-process or behind HTTP is a deployment decision, so
//! each is a trait with an HTTP production implementation and an in-process
//! implementation for tests and single-binary deployments.

use crate::{
    error::{RelayError, RelayResult},
    storage::{RelayStorage, StorageApi},
    supervisor::{with_timeout, TimeoutMeta},
    types::{NewReceipt, PrivateNote},
};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::{fmt::Debug, sync::Mutex, time::Duration};
use tracing::{debug, warn};
use url::Url;

/// Receipt and private-note sink.
#[async_trait]
pub trait ReceiptSink: Debug + Send + Sync {
    /// Creates a receipt record, returning its id.
    async fn create_receipt(&self, receipt: &NewReceipt) -> RelayResult<String>;

    /// Attaches an encrypted private note to a receipt.
    async fn attach_note(&self, note: &PrivateNote) -> RelayResult<()>;
}

/// Per-address rate limiting for mutating actions, applied before any
/// on-chain interaction.
#[async_trait]
pub trait RateLimit: Debug + Send + Sync {
    /// Checks and consumes one action for `subject`.
    async fn check(&self, subject: Address, action: &'static str) -> RelayResult<()>;
}

/// A recorded sponsorship cost entry.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipCost {
    /// The route that produced the cost, e.g. `acklink/create`.
    pub route: String,
    /// On-chain transaction hash.
    pub tx_hash: Option<B256>,
    /// Canonical user operation hash.
    pub user_op_hash: Option<B256>,
    /// Chain id.
    pub chain_id: u64,
    /// Free-form metadata.
    pub meta: Option<Value>,
}

/// Sponsorship cost recorder, invoked after a successful on-chain action.
///
/// Best-effort: failures are logged, never propagated into the settlement
/// path.
#[async_trait]
pub trait CostRecorder: Debug + Send + Sync {
    /// Records one cost entry.
    async fn record(&self, entry: &SponsorshipCost);
}

/// HTTP implementation of [`ReceiptSink`].
#[derive(Debug, Clone)]
pub struct HttpReceiptSink {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptCreated {
    receipt_id: String,
}

impl HttpReceiptSink {
    /// Creates a sink posting to `base_url`.
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self { client: reqwest::Client::new(), base_url, timeout }
    }

    fn endpoint(&self, path: &str) -> RelayResult<Url> {
        self.base_url.join(path).map_err(|err| {
            RelayError::Internal(eyre::eyre!("bad receipt endpoint {path}: {err}"))
        })
    }
}

#[async_trait]
impl ReceiptSink for HttpReceiptSink {
    async fn create_receipt(&self, receipt: &NewReceipt) -> RelayResult<String> {
        let url = self.endpoint("receipts")?;
        let response = with_timeout(
            async {
                self.client
                    .post(url)
                    .json(receipt)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<ReceiptCreated>()
                    .await
            },
            self.timeout,
            TimeoutMeta::edge("receipt creation"),
        )
        .await?;
        debug!(receipt_id = %response.receipt_id, route = %receipt.route, "receipt recorded");
        Ok(response.receipt_id)
    }

    async fn attach_note(&self, note: &PrivateNote) -> RelayResult<()> {
        let url = self.endpoint("notes")?;
        with_timeout(
            async {
                self.client.post(url).json(note).send().await?.error_for_status()?;
                Ok::<_, reqwest::Error>(())
            },
            self.timeout,
            TimeoutMeta::edge("note attachment"),
        )
        .await
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Internal(eyre::eyre!("collaborator call failed: {err}"))
    }
}

/// In-process [`ReceiptSink`] retaining everything it is given.
#[derive(Debug, Default)]
pub struct MemoryReceiptSink {
    /// Recorded receipts.
    pub receipts: Mutex<Vec<NewReceipt>>,
    /// Recorded notes.
    pub notes: Mutex<Vec<PrivateNote>>,
}

#[async_trait]
impl ReceiptSink for MemoryReceiptSink {
    async fn create_receipt(&self, receipt: &NewReceipt) -> RelayResult<String> {
        let mut receipts = self.receipts.lock().expect("receipt lock poisoned");
        receipts.push(receipt.clone());
        Ok(format!("rcpt-{}", receipts.len()))
    }

    async fn attach_note(&self, note: &PrivateNote) -> RelayResult<()> {
        self.notes.lock().expect("note lock poisoned").push(note.clone());
        Ok(())
    }
}

/// [`RateLimit`] backed by storage counters in a sliding window.
#[derive(Debug, Clone)]
pub struct StorageRateLimit {
    storage: RelayStorage,
    max_actions: u32,
    window: Duration,
}

impl StorageRateLimit {
    /// Creates a limiter allowing `max_actions` per `window` per address.
    pub fn new(storage: RelayStorage, max_actions: u32, window: Duration) -> Self {
        Self { storage, max_actions, window }
    }
}

#[async_trait]
impl RateLimit for StorageRateLimit {
    async fn check(&self, subject: Address, action: &'static str) -> RelayResult<()> {
        let now = crate::constants::unix_now();
        let since = now.saturating_sub(self.window.as_secs());
        let count = self.storage.count_actions_since(subject, action, since).await?;
        if count >= self.max_actions {
            warn!(%subject, action, count, "rate limit exceeded");
            return Err(RelayError::RateLimited { subject });
        }
        self.storage.record_action(subject, action, now).await?;
        Ok(())
    }
}

/// A [`RateLimit`] that never limits. For tests.
#[derive(Debug, Default, Clone)]
pub struct NoRateLimit;

#[async_trait]
impl RateLimit for NoRateLimit {
    async fn check(&self, _subject: Address, _action: &'static str) -> RelayResult<()> {
        Ok(())
    }
}

/// HTTP implementation of [`CostRecorder`].
#[derive(Debug, Clone)]
pub struct HttpCostRecorder {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpCostRecorder {
    /// Creates a recorder posting to `endpoint`.
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        Self { client: reqwest::Client::new(), endpoint, timeout }
    }
}

#[async_trait]
impl CostRecorder for HttpCostRecorder {
    async fn record(&self, entry: &SponsorshipCost) {
        let result = with_timeout(
            async {
                self.client
                    .post(self.endpoint.clone())
                    .json(entry)
                    .send()
                    .await?
                    .error_for_status()?;
                Ok::<_, reqwest::Error>(())
            },
            self.timeout,
            TimeoutMeta::edge("cost recording"),
        )
        .await;
        if let Err(err) = result {
            warn!(route = %entry.route, %err, "failed to record sponsorship cost");
        }
    }
}

/// A [`CostRecorder`] that drops everything. For tests and deployments
/// without cost tracking.
#[derive(Debug, Default, Clone)]
pub struct NullCostRecorder;

#[async_trait]
impl CostRecorder for NullCostRecorder {
    async fn record(&self, _entry: &SponsorshipCost) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::unix_now;

    #[tokio::test]
    async fn rate_limit_rejects_after_budget() {
        let storage = RelayStorage::in_memory();
        let limit = StorageRateLimit::new(storage, 2, Duration::from_secs(60));
        let subject = Address::repeat_byte(9);

        limit.check(subject, "acklink/create").await.unwrap();
        limit.check(subject, "acklink/create").await.unwrap();
        let err = limit.check(subject, "acklink/create").await.unwrap_err();
        assert_eq!(err.code(), "RATE_LIMITED");
        assert_eq!(err.status(), 429);
    }

    #[tokio::test]
    async fn rate_limit_is_per_action_and_subject() {
        let storage = RelayStorage::in_memory();
        let limit = StorageRateLimit::new(storage, 1, Duration::from_secs(60));

        limit.check(Address::repeat_byte(1), "acklink/create").await.unwrap();
        // Different action and different subject both have their own budget.
        limit.check(Address::repeat_byte(1), "acklink/claim").await.unwrap();
        limit.check(Address::repeat_byte(2), "acklink/create").await.unwrap();
    }

    #[tokio::test]
    async fn stale_actions_fall_out_of_the_window() {
        let storage = RelayStorage::in_memory();
        let subject = Address::repeat_byte(3);
        // Seed one action far outside the window.
        storage.record_action(subject, "send", unix_now() - 3600).await.unwrap();

        let limit = StorageRateLimit::new(storage, 1, Duration::from_secs(60));
        limit.check(subject, "send").await.unwrap();
    }
}
