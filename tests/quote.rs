//! Quote engine integration tests against the mock chain.

mod common;

use alloy::primitives::{I256, U256};
use common::*;
use relay::{
    quote::QuoteEngine,
    types::{rpc::QuoteParameters, Lane, SettlementMode, SetupTag},
};
use url::Url;

fn params(amount: &str) -> QuoteParameters {
    QuoteParameters {
        owner: addr(OWNER).to_string(),
        token: addr(TOKEN).to_string(),
        amount: amount.into(),
        fee_mode: Some("instant".into()),
        speed: None,
        mode: SettlementMode::Sponsored,
        max_fee_usd6: None,
    }
}

#[tokio::test]
async fn fee_equals_baseline_plus_surcharge_when_applicable() {
    let env = test_env().await;
    seed_happy_chain(&env.chain.state, U256::from(5_000_000u64));

    let inputs = QuoteEngine::parse(&params("5000000")).unwrap();
    let quote = env.ctx.engine.quote(&env.ctx.endpoints.rpc, &inputs).await.unwrap();

    assert!(quote.sponsored);
    assert_eq!(quote.baseline_usd6, U256::from(20_000u64));
    assert_eq!(quote.surcharge_usd6, U256::from(10_000u64));
    assert!(quote.first_tx_surcharge_applies);
    assert_eq!(quote.fee_usd6, quote.baseline_usd6 + quote.surcharge_usd6);
    assert!(quote.fee_usd6 >= quote.baseline_usd6);

    // 1 USD per token, 6 decimals: usd6 maps 1:1 onto token units.
    assert_eq!(quote.fee_token_amount, U256::from(30_000u64));
    assert_eq!(quote.net_amount, I256::try_from(U256::from(4_970_000u64)).unwrap());
    assert_eq!(quote.smart_sender, Some(addr(SMART_SENDER)));
    assert_eq!(quote.smart_deployed, Some(false));
}

#[tokio::test]
async fn fee_excludes_surcharge_when_not_applicable() {
    let env = test_env().await;
    seed_happy_chain(&env.chain.state, U256::from(5_000_000u64));
    env.chain.state.fee.lock().unwrap().surcharge_applies = false;

    let inputs = QuoteEngine::parse(&params("5000000")).unwrap();
    let quote = env.ctx.engine.quote(&env.ctx.endpoints.rpc, &inputs).await.unwrap();

    assert!(!quote.first_tx_surcharge_applies);
    assert_eq!(quote.fee_usd6, quote.baseline_usd6);
}

#[tokio::test]
async fn cap_below_fee_rejects_with_required_minimum() {
    let env = test_env().await;
    seed_happy_chain(&env.chain.state, U256::from(5_000_000u64));

    let mut request = params("5000000");
    request.max_fee_usd6 = Some(U256::from(25_000u64));
    let inputs = QuoteEngine::parse(&request).unwrap();
    let err = env.ctx.engine.quote(&env.ctx.endpoints.rpc, &inputs).await.unwrap_err();

    assert_eq!(err.code(), "MAX_FEE_TOO_LOW");
    assert_eq!(err.status(), 400);
    let data = err.data().unwrap();
    // The minimum acceptable cap is exactly the computed fee.
    assert_eq!(data["requiredMinMaxFeeUsd6"], "30000");
    assert_eq!(data["feeUsd6"], "30000");
}

#[tokio::test]
async fn operator_default_cap_applies_when_request_has_none() {
    let env = test_env_with(|config| {
        config.quote.default_max_fee_usd6 = Some(25_000);
    })
    .await;
    seed_happy_chain(&env.chain.state, U256::from(5_000_000u64));

    let inputs = QuoteEngine::parse(&params("5000000")).unwrap();
    let err = env.ctx.engine.quote(&env.ctx.endpoints.rpc, &inputs).await.unwrap_err();
    assert_eq!(err.code(), "MAX_FEE_TOO_LOW");
}

#[tokio::test]
async fn token_conversion_rounds_up() {
    let env = test_env().await;
    seed_happy_chain(&env.chain.state, U256::from(5_000_000u64));
    // Just under 1 USD per token: the division no longer lands exactly.
    *env.chain.state.price_usd6.lock().unwrap() = U256::from(999_999u64);

    let inputs = QuoteEngine::parse(&params("5000000")).unwrap();
    let quote = env.ctx.engine.quote(&env.ctx.endpoints.rpc, &inputs).await.unwrap();

    assert_eq!(quote.fee_token_amount, U256::from(30_001u64));
    // Rounding never undercharges the sponsor.
    assert!(
        quote.fee_token_amount * U256::from(999_999u64)
            >= quote.fee_usd6 * U256::from(1_000_000u64)
    );
}

#[tokio::test]
async fn self_pay_short_circuits_without_rpc() {
    let env = test_env().await;
    let mut request = params("5000000");
    request.mode = SettlementMode::SelfPay;
    let inputs = QuoteEngine::parse(&request).unwrap();

    // Nothing listens on this endpoint; the quote must not touch it.
    let dead = Url::parse("http://127.0.0.1:1/").unwrap();
    let quote = env.ctx.engine.quote(&dead, &inputs).await.unwrap();

    assert!(!quote.sponsored);
    assert_eq!(quote.lane, Lane::SelfPay);
    assert_eq!(quote.fee_usd6, U256::ZERO);
    assert_eq!(quote.fee_token_amount, U256::ZERO);
    assert_eq!(quote.smart_sender, None);
}

#[tokio::test]
async fn missing_allowances_surface_as_advisory_tags() {
    let env = test_env().await;
    let amount = U256::from(5_000_000u64);
    env.chain.state.set_balance(addr(SMART_SENDER), amount * U256::from(10u64));
    // Permit2 allowance short, router allowance short on a deployed account.
    env.chain.state.set_allowance(addr(OWNER), addr(PERMIT2), U256::from(1u64));
    env.chain.state.set_allowance(addr(SMART_SENDER), addr(ROUTER), U256::from(1u64));
    env.chain.state.deploy(addr(SMART_SENDER));

    let inputs = QuoteEngine::parse(&params("5000000")).unwrap();
    let quote = env.ctx.engine.quote(&env.ctx.endpoints.rpc, &inputs).await.unwrap();

    assert_eq!(quote.smart_deployed, Some(true));
    assert_eq!(
        quote.setup_needed,
        vec![SetupTag::MissingPermit2Allowance, SetupTag::MissingRouterAllowance]
    );
}

#[tokio::test]
async fn undeployed_account_skips_router_probe() {
    let env = test_env().await;
    env.chain.state.set_allowance(addr(OWNER), addr(PERMIT2), U256::from(1u64));

    let inputs = QuoteEngine::parse(&params("5000000")).unwrap();
    let quote = env.ctx.engine.quote(&env.ctx.endpoints.rpc, &inputs).await.unwrap();

    assert_eq!(quote.setup_needed, vec![SetupTag::MissingPermit2Allowance]);
}

#[tokio::test]
async fn lane_selection_follows_allow_lists() {
    let env = test_env().await;
    seed_happy_chain(&env.chain.state, U256::from(5_000_000u64));

    let inputs = QuoteEngine::parse(&params("5000000")).unwrap();
    let quote = env.ctx.engine.quote(&env.ctx.endpoints.rpc, &inputs).await.unwrap();
    // The test config lists the token under EIP-3009.
    assert_eq!(quote.lane, Lane::Eip3009);
}
