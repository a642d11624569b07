//! Single-recipient sponsored send.

use crate::{
    context::RelayContext,
    error::RelayResult,
    quote::{parse_address, QuoteEngine},
    services::SponsorshipCost,
    types::{
        rpc::SendParameters, NewReceipt, OrchestratorAction, OrchestratorRequest, Quote,
        SettlementOutcome,
    },
};
use alloy::primitives::B256;
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// The outcome of a send.
#[derive(Debug, Clone)]
pub enum SendFlowOutput {
    /// The operation was submitted.
    Settled {
        /// Canonical user operation hash.
        user_op_hash: B256,
        /// On-chain transaction hash, once known.
        tx_hash: Option<B256>,
        /// The recorded receipt id, when receipt creation succeeded.
        receipt_id: Option<String>,
    },
    /// The operation awaits the end-user wallet's signature.
    NeedsSignature {
        /// Hash for the wallet to sign.
        user_op_hash: B256,
        /// The unsigned draft to echo back.
        draft: Value,
    },
}

/// The single-send service.
#[derive(Debug, Clone)]
pub struct SendService {
    ctx: RelayContext,
}

impl SendService {
    /// Creates the service over the shared context.
    pub fn new(ctx: RelayContext) -> Self {
        Self { ctx }
    }

    /// Quotes and settles a single-recipient payment.
    #[instrument(skip_all)]
    pub async fn send(&self, params: &SendParameters) -> RelayResult<SendFlowOutput> {
        let inputs = QuoteEngine::parse(&params.quote)?;
        let recipient = parse_address("recipient", &params.recipient)?;
        self.ctx.rate_limit.check(inputs.owner, "send").await?;

        let config = &self.ctx.config;
        let rpc_url = self.ctx.endpoints.rpc.clone();
        let quote = self.ctx.engine.quote(&rpc_url, &inputs).await?;

        // Self-pay quotes carry no smart sender; the operation sender is
        // resolved either way.
        let sender = match quote.smart_sender {
            Some(sender) => sender,
            None => {
                self.ctx
                    .accounts
                    .resolve(
                        &rpc_url,
                        config.contracts.factory,
                        inputs.owner,
                        config.quote.rpc_timeout,
                    )
                    .await?
                    .sender
            }
        };

        let request = OrchestratorRequest {
            action: OrchestratorAction::Send,
            chain_id: config.chain.chain_id,
            rpc_url,
            bundler_url: self.ctx.endpoints.bundler.clone(),
            contracts: config.orchestrator_contracts(),
            sender,
            owner: inputs.owner,
            token: inputs.token,
            recipients: vec![recipient],
            amounts: vec![inputs.amount],
            fee_amount: quote.fee_token_amount,
            speed: inputs.speed.speed,
            lane: quote.lane,
            authorization: params.authorization.clone(),
            link_id: None,
            user_op_signature: params.user_op_signature.clone(),
            user_op_draft: params.user_op_draft.clone(),
        };

        match self.ctx.backend.execute(&request).await? {
            SettlementOutcome::NeedsSignature { user_op_hash, draft } => {
                Ok(SendFlowOutput::NeedsSignature { user_op_hash, draft })
            }
            SettlementOutcome::Submitted { user_op_hash, tx_hash } => {
                debug!(%user_op_hash, %sender, %recipient, "send submitted");
                let receipt_id =
                    self.record_receipt(&quote, &request, recipient, user_op_hash).await;
                self.ctx
                    .costs
                    .record(&SponsorshipCost {
                        route: "send".into(),
                        tx_hash,
                        user_op_hash: Some(user_op_hash),
                        chain_id: config.chain.chain_id,
                        meta: None,
                    })
                    .await;
                Ok(SendFlowOutput::Settled { user_op_hash, tx_hash, receipt_id })
            }
        }
    }

    async fn record_receipt(
        &self,
        quote: &Quote,
        request: &OrchestratorRequest,
        recipient: alloy::primitives::Address,
        user_op_hash: B256,
    ) -> Option<String> {
        let mode = match quote.sponsored {
            true => "SPONSORED",
            false => "SELF_PAY",
        };
        let receipt = NewReceipt {
            chain_id: request.chain_id,
            user_op_hash: Some(user_op_hash),
            tx_hash: None,
            from: request.sender,
            sender: request.sender,
            owner_eoa: request.owner,
            token: request.token,
            mode: mode.into(),
            fee_mode: if request.speed == 1 { "instant".into() } else { "eco".into() },
            total_entered: request.amounts[0],
            fee_amount: request.fee_amount,
            total_debited: request.amounts[0] + request.fee_amount,
            name: None,
            message: None,
            reason: None,
            to: Some(recipient),
            route: "send".into(),
            meta: None,
        };
        match self.ctx.receipts.create_receipt(&receipt).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(%err, "failed to record send receipt");
                None
            }
        }
    }
}
