//! Shared test environment: a scriptable mock chain speaking just enough
//! JSON-RPC for the quote and link flows, a scripted settlement backend,
//! and a context builder wiring everything in-process.

#![allow(dead_code)]

use alloy::{
    primitives::{Address, B256, U256},
    sol_types::{SolCall, SolValue},
};
use axum::{extract::State, routing::post, Json, Router};
use relay::{
    cache::RelayCaches,
    config::{
        ChainConfig, CollaboratorsConfig, ContractsConfig, LimitsConfig, LinkConfig,
        OrchestratorConfig, QuoteConfig, RelayConfig, ServerConfig,
    },
    context::RelayContext,
    endpoints::VerifiedEndpoints,
    error::RelayResult,
    orchestrator::SettlementBackend,
    services::{MemoryReceiptSink, NoRateLimit, NullCostRecorder},
    storage::RelayStorage,
    types::{
        contracts::{IAccountFactory, IERC20, ILinkVault, ISponsorPaymaster},
        LaneLists, OrchestratorRequest, SettlementOutcome,
    },
};
use serde_json::{json, Value};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use url::Url;

pub const CHAIN_ID: u64 = 8453;

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub const OWNER: u8 = 0x0a;
pub const SMART_SENDER: u8 = 0x0b;
pub const FACTORY: u8 = 0x11;
pub const ROUTER: u8 = 0x12;
pub const PAYMASTER: u8 = 0x13;
pub const VAULT: u8 = 0x14;
pub const PERMIT2: u8 = 0x15;
pub const ENTRYPOINT: u8 = 0x16;
pub const TOKEN: u8 = 0x20;

/// The paymaster fee schedule served by the mock chain.
#[derive(Debug, Clone, Copy)]
pub struct FeeSchedule {
    pub baseline_usd6: u64,
    pub surcharge_usd6: u64,
    pub surcharge_applies: bool,
    pub cap_bps: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self { baseline_usd6: 20_000, surcharge_usd6: 10_000, surcharge_applies: true, cap_bps: 100 }
    }
}

/// Mutable chain state the mock serves from.
#[derive(Debug)]
pub struct ChainState {
    pub fee: Mutex<FeeSchedule>,
    pub decimals: u8,
    pub price_usd6: Mutex<U256>,
    pub balances: Mutex<HashMap<Address, U256>>,
    pub allowances: Mutex<HashMap<(Address, Address), U256>>,
    pub deployed: Mutex<HashSet<Address>>,
    pub vault_nonce: Mutex<U256>,
    pub smart_sender: Address,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            fee: Mutex::new(FeeSchedule::default()),
            decimals: 6,
            price_usd6: Mutex::new(U256::from(1_000_000u64)),
            balances: Mutex::new(HashMap::new()),
            allowances: Mutex::new(HashMap::new()),
            deployed: Mutex::new(HashSet::new()),
            vault_nonce: Mutex::new(U256::from(7u64)),
            smart_sender: addr(SMART_SENDER),
        }
    }
}

impl ChainState {
    pub fn set_balance(&self, holder: Address, amount: U256) {
        self.balances.lock().unwrap().insert(holder, amount);
    }

    pub fn set_allowance(&self, owner: Address, spender: Address, amount: U256) {
        self.allowances.lock().unwrap().insert((owner, spender), amount);
    }

    pub fn deploy(&self, address: Address) {
        self.deployed.lock().unwrap().insert(address);
    }
}

/// A JSON-RPC stub serving `eth_chainId`, `eth_getCode` and the `eth_call`
/// surface the relay reads.
pub struct MockChain {
    pub state: Arc<ChainState>,
    pub addr: SocketAddr,
}

impl MockChain {
    pub async fn spawn() -> Self {
        Self::spawn_with(Arc::new(ChainState::default())).await
    }

    pub async fn spawn_with(state: Arc<ChainState>) -> Self {
        let router =
            Router::new().route("/", post(handle_rpc)).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });
        Self { state, addr }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }
}

async fn handle_rpc(State(state): State<Arc<ChainState>>, Json(req): Json<Value>) -> Json<Value> {
    let id = req["id"].clone();
    let method = req["method"].as_str().unwrap_or_default();
    let result = match method {
        "eth_chainId" => json!(format!("0x{CHAIN_ID:x}")),
        "eth_getCode" => {
            let target: Address = req["params"][0].as_str().unwrap().parse().unwrap();
            if state.deployed.lock().unwrap().contains(&target) {
                json!("0x60806040")
            } else {
                json!("0x")
            }
        }
        "eth_call" => {
            let call = &req["params"][0];
            let data = call["input"].as_str().or(call["data"].as_str()).unwrap_or("0x");
            let bytes = alloy::hex::decode(data).unwrap_or_default();
            json!(format!("0x{}", alloy::hex::encode(eth_call(&state, &bytes))))
        }
        _ => json!(null),
    };
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

fn eth_call(state: &ChainState, data: &[u8]) -> Vec<u8> {
    if data.len() < 4 {
        return Vec::new();
    }
    let selector: [u8; 4] = data[..4].try_into().unwrap();
    match selector {
        s if s == IERC20::decimalsCall::SELECTOR => U256::from(state.decimals).abi_encode(),
        s if s == IERC20::balanceOfCall::SELECTOR => {
            let call = IERC20::balanceOfCall::abi_decode(data).unwrap();
            let balances = state.balances.lock().unwrap();
            balances.get(&call.owner).copied().unwrap_or(U256::ZERO).abi_encode()
        }
        s if s == IERC20::allowanceCall::SELECTOR => {
            let call = IERC20::allowanceCall::abi_decode(data).unwrap();
            let allowances = state.allowances.lock().unwrap();
            allowances
                .get(&(call.owner, call.spender))
                .copied()
                .unwrap_or(U256::ZERO)
                .abi_encode()
        }
        s if s == IAccountFactory::getAddressCall::SELECTOR => state.smart_sender.abi_encode(),
        s if s == ILinkVault::noncesCall::SELECTOR => {
            state.vault_nonce.lock().unwrap().abi_encode()
        }
        s if s == ISponsorPaymaster::tokenPriceUsd6Call::SELECTOR => {
            state.price_usd6.lock().unwrap().abi_encode()
        }
        s if s == ISponsorPaymaster::quoteFeeCall::SELECTOR => {
            let fee = *state.fee.lock().unwrap();
            let baseline = U256::from(fee.baseline_usd6);
            let surcharge = U256::from(fee.surcharge_usd6);
            let final_fee =
                baseline + if fee.surcharge_applies { surcharge } else { U256::ZERO };
            (
                baseline,
                surcharge,
                final_fee,
                U256::from(fee.cap_bps),
                final_fee,
                fee.surcharge_applies,
            )
                .abi_encode()
        }
        _ => Vec::new(),
    }
}

/// A settlement backend driven by a queue of scripted outcomes.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    outcomes: Mutex<VecDeque<SettlementOutcome>>,
    pub requests: Mutex<Vec<OrchestratorRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, outcome: SettlementOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn submitted(&self) {
        self.push(SettlementOutcome::Submitted {
            user_op_hash: B256::repeat_byte(0xaa),
            tx_hash: Some(B256::repeat_byte(0xbb)),
        });
    }

    pub fn last_request(&self) -> OrchestratorRequest {
        self.requests.lock().unwrap().last().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SettlementBackend for ScriptedBackend {
    async fn execute(&self, request: &OrchestratorRequest) -> RelayResult<SettlementOutcome> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SettlementOutcome::Submitted {
                user_op_hash: B256::repeat_byte(0xaa),
                tx_hash: None,
            }))
    }
}

/// Builds a config pointing at the mock chain, with the bulk token on the
/// EIP-3009 lane.
pub fn test_config(rpc: Url) -> RelayConfig {
    RelayConfig {
        server: ServerConfig::default(),
        chain: ChainConfig {
            chain_id: CHAIN_ID,
            endpoints: vec![rpc.clone()],
            bundler_endpoints: vec![rpc],
        },
        contracts: ContractsConfig {
            entrypoint: addr(ENTRYPOINT),
            factory: addr(FACTORY),
            router: addr(ROUTER),
            paymaster: addr(PAYMASTER),
            vault: addr(VAULT),
            permit2: addr(PERMIT2),
            fee_token: addr(TOKEN),
            bulk_token: addr(TOKEN),
        },
        quote: QuoteConfig { rpc_timeout: Duration::from_secs(5), default_max_fee_usd6: None },
        orchestrator: OrchestratorConfig {
            program: "true".into(),
            args: vec![],
            timeout: Duration::from_secs(5),
            signer_key: None,
        },
        lanes: LaneLists {
            eip3009: [addr(TOKEN)].into_iter().collect(),
            eip2612: HashSet::new(),
        },
        limits: LimitsConfig::default(),
        acklink: LinkConfig::default(),
        collaborators: CollaboratorsConfig::default(),
    }
}

/// The assembled test environment.
pub struct TestEnv {
    pub ctx: RelayContext,
    pub chain: MockChain,
    pub backend: Arc<ScriptedBackend>,
    pub receipts: Arc<MemoryReceiptSink>,
}

pub async fn test_env() -> TestEnv {
    test_env_with(|_| {}).await
}

pub async fn test_env_with(tweak: impl FnOnce(&mut RelayConfig)) -> TestEnv {
    let chain = MockChain::spawn().await;
    let mut config = test_config(chain.url());
    tweak(&mut config);

    let backend = ScriptedBackend::new();
    let receipts = Arc::new(MemoryReceiptSink::default());
    let ctx = RelayContext::new(
        Arc::new(config),
        VerifiedEndpoints { rpc: chain.url(), bundler: chain.url() },
        RelayStorage::in_memory(),
        Arc::new(RelayCaches::new()),
        backend.clone(),
        receipts.clone(),
        Arc::new(NoRateLimit),
        Arc::new(NullCostRecorder),
    );
    TestEnv { ctx, chain, backend, receipts }
}

/// Seeds the chain so a sponsored flow for `amount` succeeds outright:
/// ample balance and allowances for the standard owner and smart sender.
pub fn seed_happy_chain(state: &ChainState, amount: U256) {
    let headroom = amount * U256::from(10u64);
    state.set_balance(addr(SMART_SENDER), headroom);
    state.set_allowance(addr(OWNER), addr(PERMIT2), headroom);
    state.set_allowance(addr(SMART_SENDER), addr(ROUTER), headroom);
}
