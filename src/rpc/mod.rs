//! The relay HTTP surface.
//!
//! JSON over REST. Every error response carries a stable `code` and echoes
//! the request id; the two-phase continuation is a 200 payload, not an
//! error.

use crate::{
    acklink::{LinkFlowOutput, LinkService},
    bulk::{BulkFlowOutput, BulkService},
    constants::unix_now,
    context::RelayContext,
    error::RelayError,
    quote::QuoteEngine,
    send::{SendFlowOutput, SendService},
    types::rpc::{
        ActionResponse, BulkSendParameters, ClaimLinkParameters, CreateLinkParameters, Health,
        LinkView, NeedsSignatureResponse, QuoteParameters, QuoteResponse, RefundLinkParameters,
        SendParameters, SettledResponse,
    },
    version::RELAY_SHORT_VERSION,
};
use alloy::primitives::B256;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

/// The relay HTTP service.
#[derive(Debug, Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

#[derive(Debug)]
struct RelayInner {
    ctx: RelayContext,
    links: LinkService,
    send: SendService,
    bulk: BulkService,
}

impl Relay {
    /// Wires the services over a shared context.
    pub fn new(ctx: RelayContext) -> Self {
        let links = LinkService::new(ctx.clone());
        let send = SendService::new(ctx.clone());
        let bulk = BulkService::new(ctx.clone());
        Self { inner: Arc::new(RelayInner { ctx, links, send, bulk }) }
    }

    /// Builds the router.
    pub fn into_router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/quote", post(quote))
            .route("/send", post(send))
            .route("/acklink/create", post(link_create))
            .route("/acklink/{link_id}", get(link_get))
            .route("/acklink/claim", post(link_claim))
            .route("/acklink/refund", post(link_refund))
            .route("/bulk/send", post(bulk_send))
            .with_state(self)
    }
}

/// An API error: a status, a stable code and an echoed request id.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    fn new(err: RelayError, request_id: &str) -> Self {
        let status =
            StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut body = json!({
            "code": err.code(),
            "message": err.public_message(),
            "requestId": request_id,
        });
        if let Some(data) = err.data() {
            body["data"] = data;
        }
        Self { status, body }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// The inbound request id, echoed in every response. Generated when the
/// caller did not supply one.
fn request_id(headers: &HeaderMap) -> String {
    static SEQUENCE: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| {
            let seq = SEQUENCE.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            format!("req-{:x}-{seq:x}", crate::constants::unix_now())
        })
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok".into(), version: RELAY_SHORT_VERSION.into() })
}

#[instrument(skip_all)]
async fn quote(
    State(relay): State<Relay>,
    headers: HeaderMap,
    Json(params): Json<QuoteParameters>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let request_id = request_id(&headers);
    let result = async {
        let inputs = QuoteEngine::parse(&params)?;
        relay.inner.ctx.engine.quote(&relay.inner.ctx.endpoints.rpc, &inputs).await
    }
    .await;
    match result {
        Ok(quote) => Ok(Json(QuoteResponse { quote, request_id })),
        Err(err) => Err(ApiError::new(err, &request_id)),
    }
}

#[instrument(skip_all)]
async fn send(
    State(relay): State<Relay>,
    headers: HeaderMap,
    Json(params): Json<SendParameters>,
) -> Result<Json<ActionResponse>, ApiError> {
    let request_id = request_id(&headers);
    match relay.inner.send.send(&params).await {
        Ok(SendFlowOutput::Settled { user_op_hash, tx_hash, receipt_id }) => {
            Ok(Json(ActionResponse::Settled(SettledResponse {
                status: "submitted".into(),
                user_op_hash,
                tx_hash,
                link_id: None,
                receipt_id,
                reference_id: None,
                request_id,
            })))
        }
        Ok(SendFlowOutput::NeedsSignature { user_op_hash, draft }) => {
            Ok(Json(ActionResponse::NeedsSignature(NeedsSignatureResponse {
                needs_user_op_signature: true,
                user_op_hash,
                user_op_draft: draft,
                link_id: None,
                expires_at: None,
                request_id,
            })))
        }
        Err(err) => Err(ApiError::new(err, &request_id)),
    }
}

#[instrument(skip_all)]
async fn link_create(
    State(relay): State<Relay>,
    headers: HeaderMap,
    Json(params): Json<CreateLinkParameters>,
) -> Result<Json<ActionResponse>, ApiError> {
    let request_id = request_id(&headers);
    match relay.inner.links.create(&params).await {
        Ok(output) => Ok(Json(link_response(output, request_id))),
        Err(err) => Err(ApiError::new(err, &request_id)),
    }
}

#[instrument(skip_all, fields(%link_id))]
async fn link_get(
    State(relay): State<Relay>,
    headers: HeaderMap,
    Path(link_id): Path<B256>,
) -> Result<Json<LinkView>, ApiError> {
    let request_id = request_id(&headers);
    match relay.inner.links.get(link_id).await {
        Ok(link) => {
            let status = link.status_view(unix_now());
            Ok(Json(LinkView {
                link_id: link.link_id,
                sender: link.sender,
                token: link.token,
                amount_usdc6: link.amount_usdc6,
                fee_usdc6: link.fee_usdc6,
                speed: link.speed,
                status,
                expires_at: link.expires_at,
                meta: link.meta,
                claimed_to: link.claimed_to,
                request_id,
            }))
        }
        Err(err) => Err(ApiError::new(err, &request_id)),
    }
}

#[instrument(skip_all)]
async fn link_claim(
    State(relay): State<Relay>,
    headers: HeaderMap,
    Json(params): Json<ClaimLinkParameters>,
) -> Result<Json<ActionResponse>, ApiError> {
    let request_id = request_id(&headers);
    match relay.inner.links.claim(&params).await {
        Ok(output) => Ok(Json(link_response(output, request_id))),
        Err(err) => Err(ApiError::new(err, &request_id)),
    }
}

#[instrument(skip_all)]
async fn link_refund(
    State(relay): State<Relay>,
    headers: HeaderMap,
    Json(params): Json<RefundLinkParameters>,
) -> Result<Json<ActionResponse>, ApiError> {
    let request_id = request_id(&headers);
    match relay.inner.links.refund(&params).await {
        Ok(output) => Ok(Json(link_response(output, request_id))),
        Err(err) => Err(ApiError::new(err, &request_id)),
    }
}

#[instrument(skip_all)]
async fn bulk_send(
    State(relay): State<Relay>,
    headers: HeaderMap,
    Json(params): Json<BulkSendParameters>,
) -> Result<Json<ActionResponse>, ApiError> {
    let request_id = request_id(&headers);
    match relay.inner.bulk.send(&params).await {
        Ok(BulkFlowOutput::Settled { user_op_hash, tx_hash, receipt_id, settlement }) => {
            Ok(Json(ActionResponse::Settled(SettledResponse {
                status: "submitted".into(),
                user_op_hash,
                tx_hash,
                link_id: None,
                receipt_id,
                reference_id: Some(settlement.reference_id),
                request_id,
            })))
        }
        Ok(BulkFlowOutput::NeedsSignature { user_op_hash, draft }) => {
            Ok(Json(ActionResponse::NeedsSignature(NeedsSignatureResponse {
                needs_user_op_signature: true,
                user_op_hash,
                user_op_draft: draft,
                link_id: None,
                expires_at: None,
                request_id,
            })))
        }
        Err(err) => Err(ApiError::new(err, &request_id)),
    }
}

fn link_response(output: LinkFlowOutput, request_id: String) -> ActionResponse {
    match output {
        LinkFlowOutput::Settled { link, receipt_id, user_op_hash, tx_hash } => {
            ActionResponse::Settled(SettledResponse {
                status: "submitted".into(),
                user_op_hash,
                tx_hash,
                link_id: Some(link.link_id),
                receipt_id,
                reference_id: None,
                request_id,
            })
        }
        LinkFlowOutput::NeedsSignature { user_op_hash, draft, link_id, expires_at } => {
            ActionResponse::NeedsSignature(NeedsSignatureResponse {
                needs_user_op_signature: true,
                user_op_hash,
                user_op_draft: draft,
                link_id,
                expires_at,
                request_id,
            })
        }
    }
}
