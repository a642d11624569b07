//! Sponsor-fee quoting.
//!
//! Computes the sponsor fee for a payment, enforces the fee invariants and
//! returns a structured quote or a structured rejection. All chain reads go
//! through the bounded-call supervisor and the injected caches.

use crate::{
    account::AccountResolver,
    cache::RelayCaches,
    config::RelayConfig,
    error::{QuoteError, RelayResult},
    supervisor::{with_timeout, TimeoutMeta},
    types::{
        contracts::{IERC20, ISponsorPaymaster},
        normalize_speed, select_lane,
        rpc::QuoteParameters,
        CanonicalSpeed, Lane, Quote, SettlementMode, SetupTag, SmartAccountFact, TokenFacts,
    },
};
use alloy::{
    primitives::{Address, I256, U256},
    providers::ProviderBuilder,
};
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

/// A parsed, validated quote request.
#[derive(Debug, Clone)]
pub struct QuoteInputs {
    /// The owner EOA.
    pub owner: Address,
    /// The token being paid.
    pub token: Address,
    /// Payment amount in token units.
    pub amount: U256,
    /// Canonical speed and fee mode.
    pub speed: CanonicalSpeed,
    /// Settlement mode.
    pub mode: SettlementMode,
    /// Caller-supplied fee ceiling in USD6, if any.
    pub max_fee_usd6: Option<U256>,
}

/// Parses a caller-supplied address, mapping failures to `invalid_request`.
pub fn parse_address(field: &'static str, value: &str) -> Result<Address, QuoteError> {
    value
        .trim()
        .parse()
        .map_err(|_| QuoteError::InvalidAddress { field, value: value.to_string() })
}

/// Parses a decimal-string integer amount. Zero and non-digit inputs are
/// rejected with `INVALID_AMOUNT`.
pub fn parse_amount(value: &str) -> Result<U256, QuoteError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(QuoteError::InvalidAmount(format!(
            "expected a decimal integer string, got {value:?}"
        )));
    }
    let amount: U256 = trimmed
        .parse()
        .map_err(|_| QuoteError::InvalidAmount(format!("amount out of range: {value:?}")))?;
    if amount.is_zero() {
        return Err(QuoteError::InvalidAmount("amount must be positive".into()));
    }
    Ok(amount)
}

/// Converts a USD6 fee into token units, rounding **up**.
///
/// Rounding down would undercharge the sponsor, so the remainder always
/// costs the payer one smallest unit.
pub fn fee_token_amount(
    fee_usd6: U256,
    decimals: u8,
    price_usd6: U256,
    token: Address,
) -> Result<U256, QuoteError> {
    if price_usd6.is_zero() {
        return Err(QuoteError::UnavailablePrice(token));
    }
    let scale = U256::from(10u64).pow(U256::from(decimals));
    Ok((fee_usd6 * scale + (price_usd6 - U256::from(1u64))) / price_usd6)
}

/// The quote engine.
#[derive(Debug, Clone)]
pub struct QuoteEngine {
    config: Arc<RelayConfig>,
    caches: Arc<RelayCaches>,
    accounts: AccountResolver,
}

impl QuoteEngine {
    /// Creates an engine over the shared configuration and caches.
    pub fn new(config: Arc<RelayConfig>, caches: Arc<RelayCaches>) -> Self {
        let accounts = AccountResolver::new(caches.clone());
        Self { config, caches, accounts }
    }

    /// Parses and validates the request shape. Request problems surface as
    /// `invalid_request`/`INVALID_AMOUNT`, never as configuration errors.
    pub fn parse(params: &QuoteParameters) -> Result<QuoteInputs, QuoteError> {
        let owner = parse_address("owner", &params.owner)?;
        let token = parse_address("token", &params.token)?;
        let amount = parse_amount(&params.amount)?;
        let speed = normalize_speed(params.fee_mode.as_deref(), params.speed.as_ref());
        Ok(QuoteInputs {
            owner,
            token,
            amount,
            speed,
            mode: params.mode,
            max_fee_usd6: params.max_fee_usd6,
        })
    }

    /// Computes a quote against the verified `rpc_url`.
    #[instrument(skip(self, rpc_url), fields(owner = %inputs.owner, token = %inputs.token))]
    pub async fn quote(&self, rpc_url: &Url, inputs: &QuoteInputs) -> RelayResult<Quote> {
        // Operator problems and caller problems are separate categories;
        // this re-check keeps the engine safe under partial reconfiguration.
        self.config.validate()?;

        // Self-pay short-circuits: zero fee, no RPC.
        if inputs.mode == SettlementMode::SelfPay {
            return Ok(Quote::self_pay(inputs.amount));
        }

        let timeout = self.config.quote.rpc_timeout;
        let account = self
            .accounts
            .resolve(rpc_url, self.config.contracts.factory, inputs.owner, timeout)
            .await?;

        let setup_needed = self.probe_setup(rpc_url, inputs, &account).await?;

        let (baseline, surcharge, applies, cap_bps) =
            self.paymaster_fee(rpc_url, account.sender, inputs.speed.speed).await?;
        let fee_usd6 = baseline + if applies { surcharge } else { U256::ZERO };

        let max_fee_usd6 = inputs
            .max_fee_usd6
            .unwrap_or_else(|| U256::from(self.config.default_max_fee_usd6()));
        if max_fee_usd6 < fee_usd6 {
            return Err(QuoteError::MaxFeeTooLow { fee_usd6, max_fee_usd6 }.into());
        }

        let facts = self.token_facts(rpc_url, inputs.token).await?;
        let fee_tokens = fee_token_amount(fee_usd6, facts.decimals, facts.price_usd6, inputs.token)?;
        let net_amount = I256::try_from(inputs.amount).unwrap_or(I256::MAX)
            - I256::try_from(fee_tokens).unwrap_or(I256::ZERO);

        let lane = select_lane(inputs.mode, inputs.token, &self.config.lanes);
        debug!(%fee_usd6, %fee_tokens, %lane, "quote computed");

        Ok(Quote {
            sponsored: true,
            lane,
            fee_usd6,
            baseline_usd6: baseline,
            surcharge_usd6: surcharge,
            cap_bps,
            first_tx_surcharge_applies: applies,
            fee_token_amount: fee_tokens,
            max_fee_usd6,
            net_amount,
            smart_sender: Some(account.sender),
            smart_deployed: Some(account.deployed),
            setup_needed,
        })
    }

    /// Probes for missing setup. The gaps are advisory tags, never hard
    /// failures; the caller decides how to react.
    async fn probe_setup(
        &self,
        rpc_url: &Url,
        inputs: &QuoteInputs,
        account: &SmartAccountFact,
    ) -> RelayResult<Vec<SetupTag>> {
        let mut tags = Vec::new();

        let permit2 = self.config.contracts.permit2;
        let owner_allowance =
            self.allowance(rpc_url, inputs.token, inputs.owner, permit2).await?;
        if owner_allowance < inputs.amount {
            tags.push(SetupTag::MissingPermit2Allowance);
        }

        // The router allowance only exists once the account is deployed.
        if account.deployed {
            let router = self.config.contracts.router;
            let router_allowance =
                self.allowance(rpc_url, inputs.token, account.sender, router).await?;
            if router_allowance < inputs.amount {
                tags.push(SetupTag::MissingRouterAllowance);
            }
        }

        Ok(tags)
    }

    /// Cached ERC-20 allowance read.
    async fn allowance(
        &self,
        rpc_url: &Url,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> RelayResult<U256> {
        let key = (token, owner, spender);
        if let Some(value) = self.caches.allowances.get(&key) {
            return Ok(value);
        }
        let provider = ProviderBuilder::new().connect_http(rpc_url.clone());
        let value = with_timeout(
            IERC20::new(token, &provider).allowance(owner, spender).call(),
            self.config.quote.rpc_timeout,
            TimeoutMeta::rpc("erc20 allowance"),
        )
        .await?;
        self.caches.allowances.insert(key, value);
        Ok(value)
    }

    /// Calls the paymaster's fee-quote view with `(payer, mode=0, speed,
    /// now)`.
    async fn paymaster_fee(
        &self,
        rpc_url: &Url,
        payer: Address,
        speed: u8,
    ) -> RelayResult<(U256, U256, bool, U256)> {
        let provider = ProviderBuilder::new().connect_http(rpc_url.clone());
        let paymaster = ISponsorPaymaster::new(self.config.contracts.paymaster, &provider);
        let now = U256::from(crate::constants::unix_now());
        let fees = with_timeout(
            paymaster.quoteFee(payer, 0, speed, now).call(),
            self.config.quote.rpc_timeout,
            TimeoutMeta::rpc("paymaster quoteFee"),
        )
        .await?;
        Ok((fees.baselineUsd6, fees.surchargeUsd6, fees.surchargeApplies, fees.capBps))
    }

    /// Cached token decimals and USD price.
    pub(crate) async fn token_facts(&self, rpc_url: &Url, token: Address) -> RelayResult<TokenFacts> {
        let key = (self.config.chain.chain_id, token);
        if let Some(facts) = self.caches.token_facts.get(&key) {
            return Ok(facts);
        }

        let provider = ProviderBuilder::new().connect_http(rpc_url.clone());
        let timeout = self.config.quote.rpc_timeout;
        let decimals = with_timeout(
            IERC20::new(token, &provider).decimals().call(),
            timeout,
            TimeoutMeta::rpc("erc20 decimals"),
        )
        .await?;
        let price_usd6 = with_timeout(
            ISponsorPaymaster::new(self.config.contracts.paymaster, &provider)
                .tokenPriceUsd6(token)
                .call(),
            timeout,
            TimeoutMeta::rpc("paymaster tokenPriceUsd6"),
        )
        .await?;

        let facts = TokenFacts { decimals, price_usd6 };
        self.caches.token_facts.insert(key, facts);
        Ok(facts)
    }

    /// The configured lane for a token under a settlement mode.
    pub fn lane_for(&self, mode: SettlementMode, token: Address) -> Lane {
        select_lane(mode, token, &self.config.lanes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

    #[test]
    fn amount_parsing_rejects_garbage() {
        assert!(parse_amount("5000000").is_ok());
        assert!(parse_amount("  42 ").is_ok());
        for bad in ["", "0", "-5", "1.5", "0x10", "10e3", "ten"] {
            assert!(parse_amount(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn address_parsing_names_the_field() {
        let err = parse_address("owner", "not-an-address").unwrap_err();
        assert_eq!(err.code(), "invalid_request");
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn fee_conversion_rounds_up() {
        // 30_000 usd6 at 1 USD per token with 6 decimals: exact.
        let exact =
            fee_token_amount(U256::from(30_000u64), 6, U256::from(1_000_000u64), USDC).unwrap();
        assert_eq!(exact, U256::from(30_000u64));

        // A price of 0.999999 USD per token forces rounding up.
        let up = fee_token_amount(U256::from(30_000u64), 6, U256::from(999_999u64), USDC).unwrap();
        assert_eq!(up, U256::from(30_001u64));
    }

    #[test]
    fn fee_conversion_never_undercharges() {
        // feeTokenAmount * price >= feeUsd6 * 10^decimals for a spread of
        // awkward prices.
        let fee = U256::from(123_457u64);
        for price in [1u64, 3, 7, 999_999, 1_000_001, 37_000_000] {
            let price = U256::from(price);
            let tokens = fee_token_amount(fee, 6, price, USDC).unwrap();
            assert!(tokens * price >= fee * U256::from(1_000_000u64), "price {price}");
        }
    }

    #[test]
    fn zero_price_is_rejected() {
        let err = fee_token_amount(U256::from(1u64), 6, U256::ZERO, USDC).unwrap_err();
        assert_eq!(err.code(), "PRICE_UNAVAILABLE");
    }
}
