//! Read-through cache of the upstream chain directory (`GET /v1/chains`).
//!
//! Readers share an `RwLock`; a refresh downloads and parses the directory
//! without holding the lock, then swaps the whole snapshot in one write. A
//! failed refresh leaves the previous snapshot untouched.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::client::{HttpClient, HttpError};
use crate::mcp::context::CallContext;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub decimals: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetamaskInfo {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub block_explorer_urls: Vec<String>,
    #[serde(default)]
    pub chain_name: String,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
}

/// One entry of the chain directory. Fields this crate does not interpret are
/// kept in `extra` and serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRecord {
    pub id: u64,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_token: Option<TokenDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_currency: Option<TokenDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metamask: Option<MetamaskInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChainRecord {
    pub fn rpc_urls(&self) -> &[String] {
        self.metamask.as_ref().map(|m| m.rpc_urls.as_slice()).unwrap_or(&[])
    }

    pub fn block_explorer_urls(&self) -> &[String] {
        self.metamask
            .as_ref()
            .map(|m| m.block_explorer_urls.as_slice())
            .unwrap_or(&[])
    }

    /// Native coin symbol and decimals. Prefers `nativeToken`, then
    /// `nativeCurrency`, then the first word of the wallet chain name.
    pub fn native_token_info(&self) -> Option<(String, u32)> {
        for token in [&self.native_token, &self.native_currency].into_iter().flatten() {
            if !token.symbol.is_empty() {
                let decimals = if token.decimals == 0 { 18 } else { token.decimals };
                return Some((token.symbol.clone(), decimals));
            }
        }
        self.metamask
            .as_ref()
            .and_then(|m| m.chain_name.split_whitespace().next())
            .map(|word| (word.to_string(), 18))
    }

    fn matches(&self, identifier: &str) -> bool {
        if let Ok(id) = identifier.parse::<u64>() {
            return self.id == id;
        }
        self.name.eq_ignore_ascii_case(identifier)
            || self.key.eq_ignore_ascii_case(identifier)
            || self
                .metamask
                .as_ref()
                .is_some_and(|m| m.chain_name.eq_ignore_ascii_case(identifier))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainDirectory {
    #[serde(default)]
    pub chains: Vec<ChainRecord>,
}

#[derive(Debug, Error)]
pub enum ChainCacheError {
    #[error("failed to fetch chain data: {0}")]
    Fetch(#[from] HttpError),
    #[error("failed to parse chain data: {0}")]
    Decode(String),
    #[error("chain directory returned no chains")]
    Empty,
    #[error("chain not found: {0}")]
    NotFound(String),
    #[error("chain {0} has no RPC URLs configured")]
    NoRpcUrl(u64),
}

#[derive(Debug, Default)]
struct Snapshot {
    chains: Arc<Vec<ChainRecord>>,
    initialized: bool,
}

pub struct ChainCache {
    http: Arc<HttpClient>,
    inner: RwLock<Snapshot>,
}

impl ChainCache {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self {
            http,
            inner: RwLock::new(Snapshot::default()),
        }
    }

    /// A cache that starts initialized with `chains`.
    pub fn seeded(http: Arc<HttpClient>, chains: Vec<ChainRecord>) -> Self {
        Self {
            http,
            inner: RwLock::new(Snapshot {
                chains: Arc::new(dedupe(chains)),
                initialized: true,
            }),
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.read().await.initialized
    }

    /// The current snapshot; empty before the first successful refresh.
    pub async fn snapshot(&self) -> Arc<Vec<ChainRecord>> {
        self.inner.read().await.chains.clone()
    }

    /// Downloads the directory and replaces the cache on success.
    pub async fn refresh(&self, ctx: &CallContext) -> Result<usize, ChainCacheError> {
        let url = self.http.endpoint("/v1/chains", &[]);
        let body = self.http.get(ctx, &url).await?;
        let directory: ChainDirectory =
            serde_json::from_slice(&body).map_err(|e| ChainCacheError::Decode(e.to_string()))?;
        if directory.chains.is_empty() {
            return Err(ChainCacheError::Empty);
        }
        let chains = Arc::new(dedupe(directory.chains));
        let count = chains.len();

        {
            let mut inner = self.inner.write().await;
            inner.chains = chains;
            inner.initialized = true;
        }
        info!(chains = count, "chain cache refreshed");
        Ok(count)
    }

    /// Loads the directory if it has never been loaded.
    pub async fn ensure_loaded(&self, ctx: &CallContext) -> Result<Arc<Vec<ChainRecord>>, ChainCacheError> {
        if !self.is_initialized().await {
            self.refresh(ctx).await?;
        }
        Ok(self.snapshot().await)
    }

    async fn search(&self, identifier: &str) -> Option<ChainRecord> {
        let inner = self.inner.read().await;
        inner.chains.iter().find(|c| c.matches(identifier)).cloned()
    }

    /// Finds a chain by numeric id or case-insensitive name, key or wallet
    /// chain name. A miss on an already-loaded cache forces one refresh.
    pub async fn find(&self, ctx: &CallContext, identifier: &str) -> Result<ChainRecord, ChainCacheError> {
        let identifier = identifier.trim();
        let was_initialized = self.is_initialized().await;
        if !was_initialized {
            self.refresh(ctx).await?;
        }
        if let Some(chain) = self.search(identifier).await {
            return Ok(chain);
        }
        if was_initialized {
            warn!(chain = identifier, "chain not in cache, forcing refresh");
            self.refresh(ctx).await?;
            if let Some(chain) = self.search(identifier).await {
                return Ok(chain);
            }
        }
        Err(ChainCacheError::NotFound(identifier.to_string()))
    }

    pub async fn find_by_id(&self, ctx: &CallContext, id: u64) -> Result<ChainRecord, ChainCacheError> {
        self.find(ctx, &id.to_string()).await
    }

    /// Resolves a chain identifier to its first RPC endpoint.
    pub async fn resolve(&self, ctx: &CallContext, identifier: &str) -> Result<String, ChainCacheError> {
        let chain = self.find(ctx, identifier).await?;
        chain
            .rpc_urls()
            .first()
            .cloned()
            .ok_or(ChainCacheError::NoRpcUrl(chain.id))
    }

    pub async fn native_token_info(&self, ctx: &CallContext, chain_id: u64) -> Result<(String, u32), ChainCacheError> {
        let chain = self.find_by_id(ctx, chain_id).await?;
        chain
            .native_token_info()
            .ok_or_else(|| ChainCacheError::NotFound(format!("native token for chain {}", chain_id)))
    }
}

fn dedupe(chains: Vec<ChainRecord>) -> Vec<ChainRecord> {
    let mut seen = HashSet::new();
    chains
        .into_iter()
        .filter(|c| {
            let fresh = seen.insert(c.id);
            if !fresh {
                warn!(chain_id = c.id, "duplicate chain id in directory, keeping first");
            }
            fresh
        })
        .collect()
}
