//! Shared fixtures for the integration tests: a scripted upstream transport, an
//! in-memory chain node and a state builder.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::{encode, Token};
use ethers::signers::LocalWallet;
use ethers::types::{transaction::eip2718::TypedTransaction, Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use serde_json::json;

use lifi_mcp_server::{
    blockchain::{
        client::{ChainRpc, RpcConnector, RpcError},
        wallet_manager::WalletManager,
    },
    config::Config,
    lifi::{
        transport::{OutboundRequest, RawResponse, Transport, TransportError},
        ChainCache, ChainRecord, HttpClient, RateLimiter, RetryPolicy,
    },
    AppState,
};

/// Well-known development key; never holds funds.
pub const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<(u16, String)>>,
    pub requests: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    pub fn push(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back((status, body.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some((status, body)) => Ok(RawResponse {
                status,
                retry_after: None,
                body: body.into_bytes(),
            }),
            None => Err(TransportError("no scripted response".into())),
        }
    }
}

/// A single-chain node holding one ERC-20 token.
pub struct MockNode {
    pub chain_id: u64,
    pub native_balance: U256,
    pub token_balance: U256,
    pub allowance: U256,
    pub broadcasts: AtomicUsize,
}

impl MockNode {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            native_balance: U256::exp10(18),
            token_balance: U256::zero(),
            allowance: U256::zero(),
            broadcasts: AtomicUsize::new(0),
        }
    }

    pub fn broadcasts(&self) -> usize {
        self.broadcasts.load(Ordering::SeqCst)
    }
}

fn word(value: U256) -> Bytes {
    Bytes::from(encode(&[Token::Uint(value)]))
}

#[async_trait]
impl ChainRpc for MockNode {
    async fn chain_id(&self) -> Result<U256, RpcError> {
        Ok(U256::from(self.chain_id))
    }

    async fn latest_base_fee(&self) -> Result<Option<U256>, RpcError> {
        Ok(Some(U256::from(100u64)))
    }

    async fn gas_price(&self) -> Result<U256, RpcError> {
        Ok(U256::from(50u64))
    }

    async fn max_priority_fee(&self) -> Result<U256, RpcError> {
        Ok(U256::from(3u64))
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256, RpcError> {
        Ok(U256::from(50_000u64))
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, RpcError> {
        let data = tx.data().map(|d| d.to_vec()).unwrap_or_default();
        let selector = data.get(..4).map(|s| [s[0], s[1], s[2], s[3]]);
        Ok(match selector {
            // balanceOf(address)
            Some([0x70, 0xa0, 0x82, 0x31]) => word(self.token_balance),
            // allowance(address,address)
            Some([0xdd, 0x62, 0xed, 0x3e]) => word(self.allowance),
            // symbol()
            Some([0x95, 0xd8, 0x9b, 0x41]) => Bytes::from(encode(&[Token::String("USDC".into())])),
            // decimals()
            Some([0x31, 0x3c, 0xe5, 0x67]) => word(U256::from(6u64)),
            _ => Bytes::default(),
        })
    }

    async fn balance(&self, _address: Address) -> Result<U256, RpcError> {
        Ok(self.native_balance)
    }

    async fn pending_nonce(&self, _address: Address) -> Result<U256, RpcError> {
        Ok(U256::from(7u64))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, RpcError> {
        self.broadcasts.fetch_add(1, Ordering::SeqCst);
        Ok(H256::from(keccak256(&raw)))
    }
}

/// Hands out the same node for every URL and remembers which URLs were asked for.
pub struct FixedConnector {
    pub node: Arc<MockNode>,
    pub urls: Mutex<Vec<String>>,
}

impl FixedConnector {
    pub fn new(node: Arc<MockNode>) -> Self {
        Self {
            node,
            urls: Mutex::new(Vec::new()),
        }
    }
}

impl RpcConnector for FixedConnector {
    fn connect(&self, rpc_url: &str) -> Result<Arc<dyn ChainRpc>, RpcError> {
        self.urls.lock().unwrap().push(rpc_url.to_string());
        let node: Arc<dyn ChainRpc> = self.node.clone();
        Ok(node)
    }
}

pub fn ethereum() -> ChainRecord {
    serde_json::from_value(json!({
        "id": 1,
        "key": "eth",
        "name": "Ethereum",
        "chainType": "EVM",
        "nativeToken": {
            "address": "0x0000000000000000000000000000000000000000",
            "symbol": "ETH",
            "decimals": 18
        },
        "metamask": {
            "chainId": "0x1",
            "chainName": "Ethereum Mainnet",
            "rpcUrls": ["https://ethereum-rpc.publicnode.com"],
            "blockExplorerUrls": ["https://etherscan.io/"]
        }
    }))
    .unwrap()
}

pub fn test_wallet() -> WalletManager {
    let wallet: LocalWallet = TEST_KEY.parse().unwrap();
    WalletManager::with_signer(Arc::new(wallet))
}

pub fn http_client(transport: Arc<ScriptedTransport>) -> Arc<HttpClient> {
    Arc::new(HttpClient::new(
        "https://li.quest",
        transport,
        Arc::new(RateLimiter::new(1000, Duration::from_secs(1))),
        RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        },
    ))
}

/// State with a seeded chain directory and `node` behind every RPC URL.
pub fn state_with(
    transport: Arc<ScriptedTransport>,
    connector: Arc<FixedConnector>,
    wallet: WalletManager,
) -> AppState {
    let http = http_client(transport);
    let chains = Arc::new(ChainCache::seeded(http.clone(), vec![ethereum()]));
    AppState::with_chains(Config::default(), http, chains, connector, wallet)
}

/// Like [`state_with`], but the chain directory starts empty and loads from
/// upstream on first use.
pub fn state_cold(
    transport: Arc<ScriptedTransport>,
    connector: Arc<FixedConnector>,
    wallet: WalletManager,
) -> AppState {
    let http = http_client(transport);
    let chains = Arc::new(ChainCache::new(http.clone()));
    AppState::with_chains(Config::default(), http, chains, connector, wallet)
}
