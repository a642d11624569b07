//! Relay spawn utilities.

use crate::{
    cache::RelayCaches,
    config::RelayConfig,
    context::RelayContext,
    endpoints::{resolve_endpoint, VerifiedEndpoints},
    orchestrator::SubprocessBackend,
    rpc::Relay,
    services::{
        CostRecorder, HttpCostRecorder, HttpReceiptSink, MemoryReceiptSink, NullCostRecorder,
        RateLimit, ReceiptSink, StorageRateLimit,
    },
    storage::RelayStorage,
};
use axum::http::header;
use std::{net::SocketAddr, sync::Arc};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{AllowMethods, AllowOrigin, CorsLayer};
use tracing::info;

/// Context returned once the relay is launched.
#[derive(Debug)]
pub struct RelayHandle {
    /// The socket address the server is bound to.
    pub local_addr: SocketAddr,
    /// The serving task.
    pub server: JoinHandle<std::io::Result<()>>,
}

impl RelayHandle {
    /// Returns the url of the http server.
    pub fn http_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }
}

/// Spawns the relay service using the provided [`RelayConfig`].
pub async fn try_spawn(config: RelayConfig) -> eyre::Result<RelayHandle> {
    config.validate()?;
    let config = Arc::new(config);

    // Verify configured endpoints against the configured chain before
    // serving anything.
    let chain_id = config.chain.chain_id;
    let timeout = config.quote.rpc_timeout;
    let rpc = resolve_endpoint("rpc", &config.chain.endpoints, chain_id, timeout).await?;
    let bundler =
        resolve_endpoint("bundler", &config.chain.bundler_endpoints, chain_id, timeout).await?;
    let endpoints = VerifiedEndpoints { rpc, bundler };
    info!(%endpoints.rpc, %endpoints.bundler, chain_id, "endpoints verified");

    let storage = RelayStorage::in_memory();
    let caches = Arc::new(RelayCaches::new());
    let backend = Arc::new(SubprocessBackend::new(config.orchestrator.clone()));

    let receipts: Arc<dyn ReceiptSink> = match &config.collaborators.receipts_url {
        Some(url) => {
            Arc::new(HttpReceiptSink::new(url.clone(), config.collaborators.timeout))
        }
        None => {
            info!("no receipt service configured, recording receipts in-process");
            Arc::new(MemoryReceiptSink::default())
        }
    };
    let costs: Arc<dyn CostRecorder> = match &config.collaborators.costs_url {
        Some(url) => Arc::new(HttpCostRecorder::new(url.clone(), config.collaborators.timeout)),
        None => Arc::new(NullCostRecorder),
    };
    let rate_limit: Arc<dyn RateLimit> = Arc::new(StorageRateLimit::new(
        storage.clone(),
        config.limits.rate_limit_max_actions,
        config.limits.rate_limit_window,
    ));

    let ctx = RelayContext::new(
        config.clone(),
        endpoints,
        storage,
        caches,
        backend,
        receipts,
        rate_limit,
        costs,
    );
    let relay = Relay::new(ctx);

    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_origin(AllowOrigin::any())
        .allow_headers([header::CONTENT_TYPE]);
    let router = relay.into_router().layer(ServiceBuilder::new().layer(cors));

    let listener =
        tokio::net::TcpListener::bind((config.server.address, config.server.port)).await?;
    let local_addr = listener.local_addr()?;
    let server = tokio::spawn(async move { axum::serve(listener, router).await });
    info!(addr = %local_addr, "started relay service");

    Ok(RelayHandle { local_addr, server })
}
