//! Shared dependencies for the settlement flows.

use crate::{
    account::AccountResolver,
    cache::RelayCaches,
    config::RelayConfig,
    endpoints::VerifiedEndpoints,
    orchestrator::SettlementBackend,
    quote::QuoteEngine,
    services::{CostRecorder, RateLimit, ReceiptSink},
    storage::RelayStorage,
};
use std::sync::Arc;

/// Everything a settlement flow needs, constructed once at process start
/// and injected explicitly; no module-level globals.
#[derive(Debug, Clone)]
pub struct RelayContext {
    /// Relay configuration.
    pub config: Arc<RelayConfig>,
    /// Chain-id verified endpoints.
    pub endpoints: VerifiedEndpoints,
    /// The relational store.
    pub storage: RelayStorage,
    /// Shared TTL caches.
    pub caches: Arc<RelayCaches>,
    /// The settlement backend.
    pub backend: Arc<dyn SettlementBackend>,
    /// Receipt and note sink.
    pub receipts: Arc<dyn ReceiptSink>,
    /// Per-address rate limiter.
    pub rate_limit: Arc<dyn RateLimit>,
    /// Sponsorship cost recorder.
    pub costs: Arc<dyn CostRecorder>,
    /// The quote engine.
    pub engine: QuoteEngine,
    /// The smart account resolver.
    pub accounts: AccountResolver,
}

impl RelayContext {
    /// Wires a context from its parts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<RelayConfig>,
        endpoints: VerifiedEndpoints,
        storage: RelayStorage,
        caches: Arc<RelayCaches>,
        backend: Arc<dyn SettlementBackend>,
        receipts: Arc<dyn ReceiptSink>,
        rate_limit: Arc<dyn RateLimit>,
        costs: Arc<dyn CostRecorder>,
    ) -> Self {
        let engine = QuoteEngine::new(config.clone(), caches.clone());
        let accounts = AccountResolver::new(caches.clone());
        Self {
            config,
            endpoints,
            storage,
            caches,
            backend,
            receipts,
            rate_limit,
            costs,
            engine,
            accounts,
        }
    }
}
