// src/blockchain/services/balance.rs
//
// Read-only balance and allowance queries. No key, no simulation, no broadcast.

use ethers::types::Address;
use ethers::utils::to_checksum;
use serde::Serialize;
use tracing::debug;

use super::token;
use crate::blockchain::client::{ChainRpc, RpcError};
use crate::blockchain::models::TokenMeta;
use crate::lifi::ChainCache;
use crate::mcp::context::CallContext;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeBalance {
    pub address: String,
    pub balance: String,
    pub token_symbol: String,
    pub chain_id: String,
    pub decimals: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub wallet_address: String,
    pub token_address: String,
    pub balance: String,
    pub token_symbol: String,
    pub decimals: u32,
    pub chain_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allowance {
    pub token_address: String,
    pub token_symbol: String,
    pub owner_address: String,
    pub spender_address: String,
    pub allowance: String,
    pub decimals: u32,
    pub chain_id: String,
}

/// Native coin balance; symbol and decimals come from the chain directory.
pub async fn native_balance(
    rpc: &dyn ChainRpc,
    chains: &ChainCache,
    ctx: &CallContext,
    address: Address,
) -> Result<NativeBalance, RpcError> {
    let chain_id = rpc.chain_id().await?;
    let balance = rpc.balance(address).await?;

    let meta = match chains.native_token_info(ctx, chain_id.low_u64()).await {
        Ok((symbol, decimals)) => TokenMeta { symbol, decimals },
        Err(e) => {
            debug!(chain_id = %chain_id, error = %e, "native token lookup failed");
            TokenMeta::native_fallback()
        }
    };

    Ok(NativeBalance {
        address: to_checksum(&address, None),
        balance: balance.to_string(),
        token_symbol: meta.symbol,
        chain_id: chain_id.to_string(),
        decimals: meta.decimals,
    })
}

pub async fn token_balance(
    rpc: &dyn ChainRpc,
    token_address: Address,
    wallet: Address,
) -> Result<TokenBalance, RpcError> {
    let chain_id = rpc.chain_id().await?;
    let balance = token::balance_of(rpc, token_address, wallet).await?;
    let meta = token::token_meta_or_unknown(rpc, token_address).await;

    Ok(TokenBalance {
        wallet_address: to_checksum(&wallet, None),
        token_address: to_checksum(&token_address, None),
        balance: balance.to_string(),
        token_symbol: meta.symbol,
        decimals: meta.decimals,
        chain_id: chain_id.to_string(),
    })
}

pub async fn allowance(
    rpc: &dyn ChainRpc,
    token_address: Address,
    owner: Address,
    spender: Address,
) -> Result<Allowance, RpcError> {
    let chain_id = rpc.chain_id().await?;
    let amount = token::allowance(rpc, token_address, owner, spender).await?;
    let meta = token::token_meta_or_unknown(rpc, token_address).await;

    Ok(Allowance {
        token_address: to_checksum(&token_address, None),
        token_symbol: meta.symbol,
        owner_address: to_checksum(&owner, None),
        spender_address: to_checksum(&spender, None),
        allowance: amount.to_string(),
        decimals: meta.decimals,
        chain_id: chain_id.to_string(),
    })
}
