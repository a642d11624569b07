//! The AckLink state machine.
//!
//! Funds are escrowed at creation and released to whoever successfully
//! claims before expiry, or returned to the sender after. The stored status
//! only ever moves `CREATED → CLAIMED` or `CREATED → REFUNDED`; expiry is a
//! read-time view. Idempotency rides on the deterministic link id, with the
//! store's uniqueness constraint as the final arbiter between concurrent
//! identical creates.

use crate::{
    constants::unix_now,
    context::RelayContext,
    error::{QuoteError, RelayResult},
    quote::{parse_address, parse_amount, QuoteInputs},
    services::SponsorshipCost,
    storage::StorageApi,
    supervisor::{with_timeout, TimeoutMeta},
    types::{
        contracts::{IERC20, ILinkVault},
        derive_link_id, normalize_speed,
        link::new_link,
        rpc::{ClaimLinkParameters, CreateLinkParameters, RefundLinkParameters},
        AckLink, LinkHashes, NewReceipt, OrchestratorAction, OrchestratorRequest, PrivateNote,
        SettlementMode, SettlementOutcome,
    },
};
use alloy::{
    primitives::{Address, B256, U256},
    providers::ProviderBuilder,
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// The outcome of a mutating link action.
#[derive(Debug, Clone)]
pub enum LinkFlowOutput {
    /// The action settled on-chain and the row reflects it.
    Settled {
        /// The link row after the action.
        link: AckLink,
        /// The recorded receipt id, when receipt creation succeeded.
        receipt_id: Option<String>,
        /// Canonical user operation hash of the settling operation.
        user_op_hash: B256,
        /// On-chain transaction hash, once known.
        tx_hash: Option<B256>,
    },
    /// The operation awaits the end-user wallet's signature.
    NeedsSignature {
        /// Hash for the wallet to sign.
        user_op_hash: B256,
        /// The unsigned draft to echo back.
        draft: Value,
        /// The derived link id, for creations.
        link_id: Option<B256>,
        /// The expiry bound into the link id, for creations.
        expires_at: Option<u64>,
    },
}

/// The AckLink service.
#[derive(Debug, Clone)]
pub struct LinkService {
    ctx: RelayContext,
}

impl LinkService {
    /// Creates the service over the shared context.
    pub fn new(ctx: RelayContext) -> Self {
        Self { ctx }
    }

    /// Creates a new link: validates, quotes the sponsor fee, checks the
    /// escrowing account's balance, derives the link id from the vault
    /// nonce and invokes the orchestrator. The row is persisted only after
    /// a successful submission.
    #[instrument(skip_all)]
    pub async fn create(&self, params: &CreateLinkParameters) -> RelayResult<LinkFlowOutput> {
        let owner = parse_address("owner", &params.owner)?;
        let amount = parse_amount(&params.amount)?;
        self.ctx.rate_limit.check(owner, "acklink/create").await?;

        let config = &self.ctx.config;
        let token = config.contracts.fee_token;
        let speed = normalize_speed(params.fee_mode.as_deref(), params.speed.as_ref());
        let inputs = QuoteInputs {
            owner,
            token,
            amount,
            speed: speed.clone(),
            mode: SettlementMode::Sponsored,
            max_fee_usd6: None,
        };
        let rpc_url = self.ctx.endpoints.rpc.clone();
        let quote = self.ctx.engine.quote(&rpc_url, &inputs).await?;
        let fee = quote.fee_token_amount;
        let sender = quote
            .smart_sender
            .ok_or_else(|| eyre::eyre!("sponsored quote without a smart sender"))?;

        // The escrow debits amount + fee at creation.
        let required = amount + fee;
        let balance = self.token_balance(token, sender).await?;
        if balance < required {
            return Err(QuoteError::InsufficientBalance { required, available: balance }.into());
        }

        let nonce = self.vault_nonce(sender).await?;
        // In the second phase the expiry is echoed back so the link id
        // derivation matches the draft built in the first phase.
        let expires_at = params
            .expires_at
            .unwrap_or_else(|| unix_now() + config.link_expiry(params.expiry_secs).as_secs());
        let meta_hash = params.meta.digest();
        let link_id = derive_link_id(
            sender,
            amount,
            expires_at,
            meta_hash,
            nonce,
            config.chain.chain_id,
            config.contracts.vault,
        );

        let request = OrchestratorRequest {
            action: OrchestratorAction::LinkCreate,
            chain_id: config.chain.chain_id,
            rpc_url,
            bundler_url: self.ctx.endpoints.bundler.clone(),
            contracts: config.orchestrator_contracts(),
            sender,
            owner,
            token,
            recipients: Vec::new(),
            amounts: vec![amount],
            fee_amount: fee,
            speed: speed.speed,
            lane: quote.lane,
            authorization: params.authorization.clone(),
            link_id: Some(link_id),
            user_op_signature: params.user_op_signature.clone(),
            user_op_draft: params.user_op_draft.clone(),
        };

        match self.ctx.backend.execute(&request).await? {
            SettlementOutcome::NeedsSignature { user_op_hash, draft } => {
                Ok(LinkFlowOutput::NeedsSignature {
                    user_op_hash,
                    draft,
                    link_id: Some(link_id),
                    expires_at: Some(expires_at),
                })
            }
            SettlementOutcome::Submitted { user_op_hash, tx_hash } => {
                let hashes = LinkHashes { user_op_hash: Some(user_op_hash), tx_hash };
                let link = new_link(
                    link_id,
                    sender,
                    token,
                    amount,
                    fee,
                    &speed,
                    expires_at,
                    params.meta.clone(),
                    hashes,
                );
                self.ctx.storage.write_link(&link).await?;
                debug!(%link_id, %sender, "link created");

                let receipt_id = self
                    .record_receipt(NewReceipt {
                        chain_id: config.chain.chain_id,
                        user_op_hash: Some(user_op_hash),
                        tx_hash,
                        from: sender,
                        sender,
                        owner_eoa: owner,
                        token,
                        mode: "SPONSORED".into(),
                        fee_mode: speed.fee_mode.clone(),
                        total_entered: amount,
                        fee_amount: fee,
                        total_debited: required,
                        name: params.meta.name.clone(),
                        message: params.meta.message.clone(),
                        reason: params.meta.reason.clone(),
                        to: None,
                        route: "acklink/create".into(),
                        meta: None,
                    })
                    .await;

                if let (Some(receipt_id), Some(note)) = (&receipt_id, &params.note) {
                    let note = PrivateNote {
                        receipt_id: receipt_id.clone(),
                        sender,
                        note: note.note.clone(),
                        signature: note.signature.clone(),
                        chain_id: config.chain.chain_id,
                    };
                    if let Err(err) = self.ctx.receipts.attach_note(&note).await {
                        warn!(%link_id, %err, "failed to attach private note");
                    }
                }

                self.record_cost("acklink/create", user_op_hash, tx_hash).await;
                Ok(LinkFlowOutput::Settled { link, receipt_id, user_op_hash, tx_hash })
            }
        }
    }

    /// Reads a link. Never mutates; the `EXPIRED` view is computed by the
    /// caller from the returned row.
    pub async fn get(&self, link_id: B256) -> RelayResult<AckLink> {
        self.ctx
            .storage
            .read_link(link_id)
            .await?
            .ok_or_else(|| crate::error::LinkError::NotFound(link_id).into())
    }

    /// Claims a link into the claimer's smart account. Only valid while the
    /// stored status is `CREATED` and the link has not expired.
    #[instrument(skip_all, fields(link_id = %params.link_id))]
    pub async fn claim(&self, params: &ClaimLinkParameters) -> RelayResult<LinkFlowOutput> {
        let claimer_owner = parse_address("owner", &params.owner)?;
        self.ctx.rate_limit.check(claimer_owner, "acklink/claim").await?;

        let link = self.get(params.link_id).await?;
        link.ensure_claimable(unix_now())?;

        let config = &self.ctx.config;
        let claimer = self
            .ctx
            .accounts
            .resolve(
                &self.ctx.endpoints.rpc,
                config.contracts.factory,
                claimer_owner,
                config.quote.rpc_timeout,
            )
            .await?;

        let request = OrchestratorRequest {
            action: OrchestratorAction::LinkClaim,
            chain_id: config.chain.chain_id,
            rpc_url: self.ctx.endpoints.rpc.clone(),
            bundler_url: self.ctx.endpoints.bundler.clone(),
            contracts: config.orchestrator_contracts(),
            sender: claimer.sender,
            owner: claimer_owner,
            token: link.token,
            recipients: vec![claimer.sender],
            amounts: vec![link.amount_usdc6],
            // The fee was collected at creation; claims are fee-free.
            fee_amount: U256::ZERO,
            speed: 0,
            lane: self.ctx.engine.lane_for(SettlementMode::Sponsored, link.token),
            authorization: None,
            link_id: Some(link.link_id),
            user_op_signature: params.user_op_signature.clone(),
            user_op_draft: params.user_op_draft.clone(),
        };

        match self.ctx.backend.execute(&request).await? {
            SettlementOutcome::NeedsSignature { user_op_hash, draft } => {
                Ok(LinkFlowOutput::NeedsSignature {
                    user_op_hash,
                    draft,
                    link_id: None,
                    expires_at: None,
                })
            }
            SettlementOutcome::Submitted { user_op_hash, tx_hash } => {
                let hashes = LinkHashes { user_op_hash: Some(user_op_hash), tx_hash };
                let link = self
                    .ctx
                    .storage
                    .mark_link_claimed(link.link_id, claimer.sender, hashes)
                    .await?;
                debug!(link_id = %link.link_id, claimed_to = %claimer.sender, "link claimed");

                let receipt_id = self
                    .record_receipt(NewReceipt {
                        chain_id: config.chain.chain_id,
                        user_op_hash: Some(user_op_hash),
                        tx_hash,
                        from: link.sender,
                        sender: claimer.sender,
                        owner_eoa: claimer_owner,
                        token: link.token,
                        mode: "SPONSORED".into(),
                        fee_mode: link.speed.clone(),
                        total_entered: link.amount_usdc6,
                        fee_amount: U256::ZERO,
                        total_debited: link.amount_usdc6,
                        name: link.meta.name.clone(),
                        message: link.meta.message.clone(),
                        reason: link.meta.reason.clone(),
                        to: Some(claimer.sender),
                        route: "acklink/claim".into(),
                        meta: None,
                    })
                    .await;

                self.record_cost("acklink/claim", user_op_hash, tx_hash).await;
                Ok(LinkFlowOutput::Settled { link, receipt_id, user_op_hash, tx_hash })
            }
        }
    }

    /// Refunds an expired link back to its sender. The inverse guard of
    /// claim: only valid once the link **has** expired.
    #[instrument(skip_all, fields(link_id = %params.link_id))]
    pub async fn refund(&self, params: &RefundLinkParameters) -> RelayResult<LinkFlowOutput> {
        let owner = parse_address("owner", &params.owner)?;
        self.ctx.rate_limit.check(owner, "acklink/refund").await?;

        let link = self.get(params.link_id).await?;
        link.ensure_refundable(unix_now())?;

        let config = &self.ctx.config;
        let account = self
            .ctx
            .accounts
            .resolve(
                &self.ctx.endpoints.rpc,
                config.contracts.factory,
                owner,
                config.quote.rpc_timeout,
            )
            .await?;
        if account.sender != link.sender {
            return Err(QuoteError::InvalidRequest(
                "only the link sender can refund".into(),
            )
            .into());
        }

        let request = OrchestratorRequest {
            action: OrchestratorAction::LinkRefund,
            chain_id: config.chain.chain_id,
            rpc_url: self.ctx.endpoints.rpc.clone(),
            bundler_url: self.ctx.endpoints.bundler.clone(),
            contracts: config.orchestrator_contracts(),
            sender: link.sender,
            owner,
            token: link.token,
            recipients: vec![link.sender],
            amounts: vec![link.amount_usdc6],
            fee_amount: U256::ZERO,
            speed: 0,
            lane: self.ctx.engine.lane_for(SettlementMode::Sponsored, link.token),
            authorization: None,
            link_id: Some(link.link_id),
            user_op_signature: params.user_op_signature.clone(),
            user_op_draft: params.user_op_draft.clone(),
        };

        match self.ctx.backend.execute(&request).await? {
            SettlementOutcome::NeedsSignature { user_op_hash, draft } => {
                Ok(LinkFlowOutput::NeedsSignature {
                    user_op_hash,
                    draft,
                    link_id: None,
                    expires_at: None,
                })
            }
            SettlementOutcome::Submitted { user_op_hash, tx_hash } => {
                let hashes = LinkHashes { user_op_hash: Some(user_op_hash), tx_hash };
                let link = self.ctx.storage.mark_link_refunded(link.link_id, hashes).await?;
                debug!(link_id = %link.link_id, "link refunded");

                let receipt_id = self
                    .record_receipt(NewReceipt {
                        chain_id: config.chain.chain_id,
                        user_op_hash: Some(user_op_hash),
                        tx_hash,
                        from: link.sender,
                        sender: link.sender,
                        owner_eoa: owner,
                        token: link.token,
                        mode: "SPONSORED".into(),
                        fee_mode: link.speed.clone(),
                        total_entered: link.amount_usdc6,
                        fee_amount: U256::ZERO,
                        total_debited: U256::ZERO,
                        name: link.meta.name.clone(),
                        message: link.meta.message.clone(),
                        reason: link.meta.reason.clone(),
                        to: Some(link.sender),
                        route: "acklink/refund".into(),
                        meta: None,
                    })
                    .await;

                self.record_cost("acklink/refund", user_op_hash, tx_hash).await;
                Ok(LinkFlowOutput::Settled { link, receipt_id, user_op_hash, tx_hash })
            }
        }
    }

    async fn token_balance(&self, token: Address, holder: Address) -> RelayResult<U256> {
        let provider = ProviderBuilder::new().connect_http(self.ctx.endpoints.rpc.clone());
        with_timeout(
            IERC20::new(token, &provider).balanceOf(holder).call(),
            self.ctx.config.quote.rpc_timeout,
            TimeoutMeta::rpc("erc20 balanceOf"),
        )
        .await
    }

    async fn vault_nonce(&self, sender: Address) -> RelayResult<U256> {
        let provider = ProviderBuilder::new().connect_http(self.ctx.endpoints.rpc.clone());
        with_timeout(
            ILinkVault::new(self.ctx.config.contracts.vault, &provider).nonces(sender).call(),
            self.ctx.config.quote.rpc_timeout,
            TimeoutMeta::rpc("vault nonces"),
        )
        .await
    }

    /// Best-effort receipt creation. The settlement already happened; a
    /// receipt failure is logged, not propagated.
    async fn record_receipt(&self, receipt: NewReceipt) -> Option<String> {
        match self.ctx.receipts.create_receipt(&receipt).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(route = %receipt.route, %err, "failed to record receipt");
                None
            }
        }
    }

    async fn record_cost(&self, route: &str, user_op_hash: B256, tx_hash: Option<B256>) {
        self.ctx
            .costs
            .record(&SponsorshipCost {
                route: route.into(),
                tx_hash,
                user_op_hash: Some(user_op_hash),
                chain_id: self.ctx.config.chain.chain_id,
                meta: None,
            })
            .await;
    }
}
