// src/lib.rs

use std::sync::Arc;

use secrecy::ExposeSecret;

pub use ethers::types::{Address, H256, U256};

pub mod api;
pub mod blockchain;
pub mod config;
pub mod lifi;
pub mod mcp;
pub mod utils;

use blockchain::{nonce_manager::NonceManager, wallet_manager::WalletManager, RpcConnector};
use lifi::{ChainCache, HttpClient};
use mcp::context::ApiKey;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    /// The single chokepoint for upstream REST calls.
    pub http: Arc<HttpClient>,
    pub chains: Arc<ChainCache>,
    /// Hands out JSON-RPC clients per endpoint URL.
    pub rpc: Arc<dyn RpcConnector>,
    pub wallet: WalletManager,
    pub nonces: NonceManager,
    /// Credential applied when a call carries none of its own.
    pub default_credential: Option<ApiKey>,
}

impl AppState {
    pub fn new(
        config: config::Config,
        http: Arc<HttpClient>,
        rpc: Arc<dyn RpcConnector>,
        wallet: WalletManager,
    ) -> Self {
        let chains = Arc::new(ChainCache::new(http.clone()));
        Self::with_chains(config, http, chains, rpc, wallet)
    }

    pub fn with_chains(
        config: config::Config,
        http: Arc<HttpClient>,
        chains: Arc<ChainCache>,
        rpc: Arc<dyn RpcConnector>,
        wallet: WalletManager,
    ) -> Self {
        let default_credential = config
            .api_key
            .as_ref()
            .and_then(|key| ApiKey::new(key.expose_secret().as_str()));
        Self {
            config: Arc::new(config),
            http,
            chains,
            rpc,
            wallet,
            nonces: NonceManager::new(),
            default_credential,
        }
    }
}
