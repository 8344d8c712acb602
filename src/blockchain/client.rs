//! JSON-RPC access to EVM nodes.
//!
//! [`ChainRpc`] is the narrow set of node calls the transaction engine and the
//! balance queries need. [`EthersRpc`] implements it over an ethers
//! `Provider<Http>`; [`RpcPool`] hands out one provider per endpoint URL.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::{transaction::eip2718::TypedTransaction, Address, BlockNumber, Bytes, H256, U256},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to connect to the Ethereum client: {0}")]
    Connect(String),
    #[error("{0}")]
    Call(String),
}

impl RpcError {
    fn call(err: impl std::fmt::Display) -> Self {
        RpcError::Call(err.to_string())
    }
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<U256, RpcError>;
    /// Base fee of the latest block, `None` on pre-London chains.
    async fn latest_base_fee(&self) -> Result<Option<U256>, RpcError>;
    async fn gas_price(&self) -> Result<U256, RpcError>;
    async fn max_priority_fee(&self) -> Result<U256, RpcError>;
    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, RpcError>;
    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, RpcError>;
    async fn balance(&self, address: Address) -> Result<U256, RpcError>;
    async fn pending_nonce(&self, address: Address) -> Result<U256, RpcError>;
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, RpcError>;
}

pub struct EthersRpc {
    provider: Provider<Http>,
}

impl EthersRpc {
    pub fn connect(rpc_url: &str) -> Result<Self, RpcError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| RpcError::Connect(e.to_string()))?;
        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainRpc for EthersRpc {
    async fn chain_id(&self) -> Result<U256, RpcError> {
        self.provider.get_chainid().await.map_err(RpcError::call)
    }

    async fn latest_base_fee(&self) -> Result<Option<U256>, RpcError> {
        let block = self
            .provider
            .get_block(BlockNumber::Latest)
            .await
            .map_err(RpcError::call)?;
        Ok(block.and_then(|b| b.base_fee_per_gas))
    }

    async fn gas_price(&self) -> Result<U256, RpcError> {
        self.provider.get_gas_price().await.map_err(RpcError::call)
    }

    async fn max_priority_fee(&self) -> Result<U256, RpcError> {
        self.provider
            .request::<_, U256>("eth_maxPriorityFeePerGas", ())
            .await
            .map_err(RpcError::call)
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, RpcError> {
        self.provider.estimate_gas(tx, None).await.map_err(RpcError::call)
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, RpcError> {
        self.provider.call(tx, None).await.map_err(RpcError::call)
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(RpcError::call)
    }

    async fn pending_nonce(&self, address: Address) -> Result<U256, RpcError> {
        self.provider
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(RpcError::call)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, RpcError> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(RpcError::call)?;
        Ok(pending.tx_hash())
    }
}

/// Produces a [`ChainRpc`] for an endpoint URL.
pub trait RpcConnector: Send + Sync {
    fn connect(&self, rpc_url: &str) -> Result<Arc<dyn ChainRpc>, RpcError>;
}

/// Caches one ethers provider per endpoint URL.
#[derive(Default)]
pub struct RpcPool {
    providers: DashMap<String, Arc<EthersRpc>>,
}

impl RpcPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl RpcConnector for RpcPool {
    fn connect(&self, rpc_url: &str) -> Result<Arc<dyn ChainRpc>, RpcError> {
        if let Some(existing) = self.providers.get(rpc_url) {
            let rpc: Arc<dyn ChainRpc> = existing.value().clone();
            return Ok(rpc);
        }
        let rpc = Arc::new(EthersRpc::connect(rpc_url)?);
        debug!(pool_size = self.providers.len() + 1, "created RPC provider");
        let entry: Arc<dyn ChainRpc> = self
            .providers
            .entry(rpc_url.to_string())
            .or_insert(rpc)
            .value()
            .clone();
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_reuses_providers_per_url() {
        let pool = RpcPool::new();
        let a = pool.connect("http://localhost:8545").unwrap();
        let b = pool.connect("http://localhost:8545").unwrap();
        pool.connect("http://localhost:9545").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn pool_rejects_malformed_url() {
        let pool = RpcPool::new();
        let err = pool.connect("not a url").err().unwrap();
        assert!(matches!(err, RpcError::Connect(_)));
        assert!(pool.is_empty());
    }
}
