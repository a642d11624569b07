//! Bulk multi-recipient settlement.
//!
//! Bulk settlement moves one token to many recipients in a single
//! operation, authorized by one EIP-3009 transfer-authorization covering
//! the total debit. The sponsor fee is split either out of the last
//! recipient's amount (net) or on top of the gross sum (plus-fee).

use crate::{
    context::RelayContext,
    error::{BulkError, RelayResult},
    quote::{parse_address, parse_amount, QuoteInputs},
    services::SponsorshipCost,
    supervisor::{with_timeout, TimeoutMeta},
    types::{
        contracts::IERC20,
        normalize_speed,
        rpc::{BulkSendParameters, TransferAuthorization},
        BulkFeeMode, BulkSettlement, Lane, NewReceipt, OrchestratorAction, OrchestratorRequest,
        SettlementMode, SettlementOutcome,
    },
};
use alloy::{
    primitives::{keccak256, Address, B256, U256},
    providers::ProviderBuilder,
};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

/// Splits gross amounts per the fee mode, returning the adjusted amounts
/// and the total debited from the sender.
///
/// Net mode deducts the fee from the last recipient, which must retain a
/// strictly positive amount; the total debited equals the pre-fee sum.
/// Plus-fee mode leaves the amounts unchanged and debits the fee on top.
pub fn split_amounts(
    gross: &[U256],
    fee: U256,
    mode: BulkFeeMode,
) -> Result<(Vec<U256>, U256), BulkError> {
    let sum: U256 = gross.iter().copied().fold(U256::ZERO, |acc, a| acc + a);
    match mode {
        BulkFeeMode::Net => {
            let last = *gross.last().ok_or(BulkError::Empty)?;
            if last <= fee {
                return Err(BulkError::FeeExceedsLastAmount { fee, last });
            }
            let mut adjusted = gross.to_vec();
            *adjusted.last_mut().expect("non-empty") = last - fee;
            Ok((adjusted, sum))
        }
        BulkFeeMode::PlusFee => Ok((gross.to_vec(), sum + fee)),
    }
}

/// Derives the idempotency key from the settlement inputs.
///
/// Input-derived rather than random so retried submissions of the same
/// settlement carry the same key.
pub fn derive_reference_id(
    sender: Address,
    token: Address,
    mode: BulkFeeMode,
    chain_id: u64,
    recipients: &[Address],
    amounts: &[U256],
) -> B256 {
    let mut buf = Vec::new();
    buf.extend_from_slice(sender.as_slice());
    buf.extend_from_slice(token.as_slice());
    buf.push(match mode {
        BulkFeeMode::Net => 0,
        BulkFeeMode::PlusFee => 1,
    });
    buf.extend_from_slice(&chain_id.to_be_bytes());
    for (recipient, amount) in recipients.iter().zip(amounts) {
        buf.extend_from_slice(recipient.as_slice());
        buf.extend_from_slice(&amount.to_be_bytes::<32>());
    }
    keccak256(&buf)
}

/// The outcome of a bulk send.
#[derive(Debug, Clone)]
pub enum BulkFlowOutput {
    /// The operation was submitted.
    Settled {
        /// Canonical user operation hash.
        user_op_hash: B256,
        /// On-chain transaction hash, once known.
        tx_hash: Option<B256>,
        /// The recorded receipt id, when receipt creation succeeded.
        receipt_id: Option<String>,
        /// The computed settlement split.
        settlement: BulkSettlement,
    },
    /// The operation awaits the end-user wallet's signature.
    NeedsSignature {
        /// Hash for the wallet to sign.
        user_op_hash: B256,
        /// The unsigned draft to echo back.
        draft: Value,
    },
}

/// The bulk settlement service.
#[derive(Debug, Clone)]
pub struct BulkService {
    ctx: RelayContext,
}

impl BulkService {
    /// Creates the service over the shared context.
    pub fn new(ctx: RelayContext) -> Self {
        Self { ctx }
    }

    /// Validates, quotes and settles a bulk payment.
    #[instrument(skip_all, fields(recipients = params.recipients.len()))]
    pub async fn send(&self, params: &BulkSendParameters) -> RelayResult<BulkFlowOutput> {
        let owner = parse_address("owner", &params.owner)?;
        let token = parse_address("token", &params.token)?;
        self.ctx.rate_limit.check(owner, "bulk/send").await?;

        let config = &self.ctx.config;
        if params.recipients.is_empty() {
            return Err(BulkError::Empty.into());
        }
        if params.recipients.len() != params.amounts.len() {
            return Err(BulkError::LengthMismatch {
                recipients: params.recipients.len(),
                amounts: params.amounts.len(),
            }
            .into());
        }
        let max = config.limits.bulk_max_recipients;
        if params.recipients.len() > max {
            return Err(BulkError::TooManyRecipients { got: params.recipients.len(), max }.into());
        }
        if token != config.contracts.bulk_token {
            return Err(BulkError::UnsupportedToken {
                got: token,
                expected: config.contracts.bulk_token,
            }
            .into());
        }

        let mut recipients = Vec::with_capacity(params.recipients.len());
        for raw in &params.recipients {
            recipients.push(parse_address("recipients", raw)?);
        }
        let mut gross = Vec::with_capacity(params.amounts.len());
        for raw in &params.amounts {
            gross.push(parse_amount(raw)?);
        }
        let gross_total: U256 = gross.iter().copied().fold(U256::ZERO, |acc, a| acc + a);

        // One aggregate quote covers the whole settlement.
        let speed = normalize_speed(params.fee_mode.as_deref(), params.speed.as_ref());
        let inputs = QuoteInputs {
            owner,
            token,
            amount: gross_total,
            speed: speed.clone(),
            mode: SettlementMode::Sponsored,
            max_fee_usd6: None,
        };
        let rpc_url = self.ctx.endpoints.rpc.clone();
        let quote = self.ctx.engine.quote(&rpc_url, &inputs).await?;
        if quote.lane != Lane::Eip3009 {
            return Err(BulkError::UnsupportedLane.into());
        }
        let sender = quote
            .smart_sender
            .ok_or_else(|| eyre::eyre!("sponsored quote without a smart sender"))?;

        let fee = quote.fee_token_amount;
        let (adjusted, total_debited) = split_amounts(&gross, fee, params.fee_split)?;
        let reference_id = params.reference_id.unwrap_or_else(|| {
            derive_reference_id(
                sender,
                token,
                params.fee_split,
                config.chain.chain_id,
                &recipients,
                &gross,
            )
        });

        validate_authorization(&params.authorization, sender, config.contracts.router, total_debited)?;
        self.advisory_balance_check(token, sender, total_debited).await;

        let settlement = BulkSettlement {
            recipients: recipients.clone(),
            gross_amounts: gross,
            fee,
            mode: params.fee_split,
            adjusted_amounts: adjusted.clone(),
            total_debited,
            reference_id,
        };

        let request = OrchestratorRequest {
            action: OrchestratorAction::BulkSend,
            chain_id: config.chain.chain_id,
            rpc_url,
            bundler_url: self.ctx.endpoints.bundler.clone(),
            contracts: config.orchestrator_contracts(),
            sender,
            owner,
            token,
            recipients,
            amounts: adjusted,
            fee_amount: fee,
            speed: speed.speed,
            lane: Lane::Eip3009,
            authorization: Some(
                serde_json::to_value(&params.authorization)
                    .map_err(|err| eyre::eyre!("failed to encode authorization: {err}"))?,
            ),
            link_id: None,
            user_op_signature: params.user_op_signature.clone(),
            user_op_draft: params.user_op_draft.clone(),
        };

        match self.ctx.backend.execute(&request).await? {
            SettlementOutcome::NeedsSignature { user_op_hash, draft } => {
                Ok(BulkFlowOutput::NeedsSignature { user_op_hash, draft })
            }
            SettlementOutcome::Submitted { user_op_hash, tx_hash } => {
                debug!(%user_op_hash, %reference_id, "bulk send submitted");
                let receipt_id = self
                    .record_receipt(&request, &settlement, owner, user_op_hash, tx_hash)
                    .await;
                self.ctx
                    .costs
                    .record(&SponsorshipCost {
                        route: "bulk/send".into(),
                        tx_hash,
                        user_op_hash: Some(user_op_hash),
                        chain_id: config.chain.chain_id,
                        meta: Some(json!({ "referenceId": reference_id })),
                    })
                    .await;
                Ok(BulkFlowOutput::Settled { user_op_hash, tx_hash, receipt_id, settlement })
            }
        }
    }

    /// Advisory pre-check only: final enforcement happens on-chain, so a
    /// shortfall (or a failed read) is logged and never blocks.
    async fn advisory_balance_check(&self, token: Address, holder: Address, required: U256) {
        let provider = ProviderBuilder::new().connect_http(self.ctx.endpoints.rpc.clone());
        let balance = with_timeout(
            IERC20::new(token, &provider).balanceOf(holder).call(),
            self.ctx.config.quote.rpc_timeout,
            TimeoutMeta::rpc("bulk balance pre-check"),
        )
        .await;
        match balance {
            Ok(balance) if balance < required => {
                warn!(%holder, %balance, %required, "bulk sender balance below total debit");
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "bulk balance pre-check failed"),
        }
    }

    async fn record_receipt(
        &self,
        request: &OrchestratorRequest,
        settlement: &BulkSettlement,
        owner: Address,
        user_op_hash: B256,
        tx_hash: Option<B256>,
    ) -> Option<String> {
        let receipt = NewReceipt {
            chain_id: request.chain_id,
            user_op_hash: Some(user_op_hash),
            tx_hash,
            from: request.sender,
            sender: request.sender,
            owner_eoa: owner,
            token: request.token,
            mode: "SPONSORED".into(),
            fee_mode: if request.speed == 1 { "instant".into() } else { "eco".into() },
            total_entered: settlement
                .gross_amounts
                .iter()
                .copied()
                .fold(U256::ZERO, |acc, a| acc + a),
            fee_amount: settlement.fee,
            total_debited: settlement.total_debited,
            name: None,
            message: None,
            reason: None,
            to: None,
            route: "bulk/send".into(),
            meta: Some(json!({
                "referenceId": settlement.reference_id,
                "recipients": settlement.recipients.len(),
            })),
        };
        match self.ctx.receipts.create_receipt(&receipt).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(%err, "failed to record bulk receipt");
                None
            }
        }
    }
}

/// Checks the supplied transfer authorization against the computed
/// settlement. A mismatch is a hard validation failure, never adjusted
/// silently.
fn validate_authorization(
    auth: &TransferAuthorization,
    sender: Address,
    router: Address,
    total_debited: U256,
) -> Result<(), BulkError> {
    if auth.from != sender {
        return Err(BulkError::AuthorizationMismatch {
            field: "from",
            expected: sender.to_string(),
            got: auth.from.to_string(),
        });
    }
    if auth.to != router {
        return Err(BulkError::AuthorizationMismatch {
            field: "to",
            expected: router.to_string(),
            got: auth.to.to_string(),
        });
    }
    if auth.value != total_debited {
        return Err(BulkError::AuthorizationMismatch {
            field: "value",
            expected: total_debited.to_string(),
            got: auth.value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Bytes};

    #[test]
    fn net_mode_deducts_fee_from_last_recipient() {
        let gross = [U256::from(10u64), U256::from(5u64)];
        let (adjusted, total) = split_amounts(&gross, U256::from(3u64), BulkFeeMode::Net).unwrap();
        assert_eq!(adjusted, vec![U256::from(10u64), U256::from(2u64)]);
        assert_eq!(total, U256::from(15u64));
        let net: U256 = adjusted.iter().copied().fold(U256::ZERO, |acc, a| acc + a);
        assert_eq!(net, U256::from(12u64));
    }

    #[test]
    fn plus_fee_mode_debits_on_top() {
        let gross = [U256::from(10u64), U256::from(5u64)];
        let (adjusted, total) =
            split_amounts(&gross, U256::from(3u64), BulkFeeMode::PlusFee).unwrap();
        assert_eq!(adjusted, gross.to_vec());
        assert_eq!(total, U256::from(18u64));
    }

    #[test]
    fn net_mode_requires_positive_last_amount() {
        // fee == last amount would zero the last recipient out.
        let gross = [U256::from(10u64), U256::from(3u64)];
        assert!(matches!(
            split_amounts(&gross, U256::from(3u64), BulkFeeMode::Net),
            Err(BulkError::FeeExceedsLastAmount { .. })
        ));
    }

    #[test]
    fn reference_id_is_input_derived() {
        let sender = address!("1111111111111111111111111111111111111111");
        let token = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let recipients =
            [address!("2222222222222222222222222222222222222222")];
        let amounts = [U256::from(10u64)];
        let a = derive_reference_id(sender, token, BulkFeeMode::Net, 8453, &recipients, &amounts);
        let b = derive_reference_id(sender, token, BulkFeeMode::Net, 8453, &recipients, &amounts);
        let c =
            derive_reference_id(sender, token, BulkFeeMode::PlusFee, 8453, &recipients, &amounts);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn authorization_mismatches_are_hard_failures() {
        let sender = address!("1111111111111111111111111111111111111111");
        let router = address!("2222222222222222222222222222222222222222");
        let good = TransferAuthorization {
            from: sender,
            to: router,
            value: U256::from(15u64),
            valid_after: U256::ZERO,
            valid_before: U256::from(u64::MAX),
            nonce: B256::repeat_byte(5),
            signature: Bytes::from_static(&[1, 2, 3]),
        };
        assert!(validate_authorization(&good, sender, router, U256::from(15u64)).is_ok());

        let wrong_to = TransferAuthorization { to: sender, ..good.clone() };
        assert!(matches!(
            validate_authorization(&wrong_to, sender, router, U256::from(15u64)),
            Err(BulkError::AuthorizationMismatch { field: "to", .. })
        ));

        let wrong_value = TransferAuthorization { value: U256::from(14u64), ..good };
        assert!(matches!(
            validate_authorization(&wrong_value, sender, router, U256::from(15u64)),
            Err(BulkError::AuthorizationMismatch { field: "value", .. })
        ));
    }
}
