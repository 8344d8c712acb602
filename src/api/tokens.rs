// src/api/tokens.rs
//
// Token and connectivity discovery. All four tools are GET passthroughs.

use serde_json::Value;

use super::{get_passthrough, ToolOutcome};
use crate::blockchain::validation::{validate_chain_ref, validate_token_ref, ValidationError};
use crate::mcp::context::CallContext;
use crate::utils::{get_required_string, get_string, get_string_array};
use crate::AppState;

/// Validates each entry of a comma-separated chain list.
fn validate_chain_list(field: &str, raw: &str) -> Result<(), ValidationError> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .try_for_each(|c| validate_chain_ref(field, c))
}

pub async fn get_tokens(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let chains = get_string(args, "chains");
    validate_chain_list("chains", &chains)?;
    let query = [
        ("chains", chains),
        ("chainTypes", get_string(args, "chainTypes")),
        ("minPriceUSD", get_string(args, "minPriceUSD")),
    ];
    get_passthrough(state, ctx, "get tokens", "/v1/tokens", &query).await
}

pub async fn get_token(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let chain = get_required_string(args, "chain")?;
    validate_chain_ref("chain", &chain)?;
    let token = get_required_string(args, "token")?;
    validate_token_ref("token", &token)?;
    let query = [("chain", chain), ("token", token)];
    get_passthrough(state, ctx, "get token", "/v1/token", &query).await
}

pub async fn get_connections(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let from_chain = get_string(args, "fromChain");
    let to_chain = get_string(args, "toChain");
    if !from_chain.is_empty() {
        validate_chain_ref("fromChain", &from_chain)?;
    }
    if !to_chain.is_empty() {
        validate_chain_ref("toChain", &to_chain)?;
    }
    let from_token = get_string(args, "fromToken");
    let to_token = get_string(args, "toToken");
    if !from_token.is_empty() {
        validate_token_ref("fromToken", &from_token)?;
    }
    if !to_token.is_empty() {
        validate_token_ref("toToken", &to_token)?;
    }

    let query = [
        ("fromChain", from_chain),
        ("toChain", to_chain),
        ("fromToken", from_token),
        ("toToken", to_token),
        ("chainTypes", get_string(args, "chainTypes")),
        ("allowBridges", get_string_array(args, "allowBridges").join(",")),
    ];
    get_passthrough(state, ctx, "get connections", "/v1/connections", &query).await
}

pub async fn get_tools(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let chains = get_string_array(args, "chains");
    for chain in &chains {
        validate_chain_ref("chains", chain)?;
    }
    let query = [("chains", chains.join(","))];
    get_passthrough(state, ctx, "get tools", "/v1/tools", &query).await
}
