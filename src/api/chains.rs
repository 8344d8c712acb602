// src/api/chains.rs

use serde::Serialize;
use serde_json::Value;

use super::{get_passthrough, to_json, ToolOutcome};
use crate::blockchain::validation::validate_chain_id;
use crate::lifi::ChainRecord;
use crate::mcp::context::CallContext;
use crate::utils::{get_required_string, get_string};
use crate::AppState;

#[derive(Serialize)]
struct Directory<'a> {
    chains: &'a [ChainRecord],
}

/// Without a filter the cached directory is served; a `chainTypes` filter is
/// forwarded upstream.
pub async fn get_chains(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let chain_types = get_string(args, "chainTypes");
    if !chain_types.trim().is_empty() {
        let query = [("chainTypes", chain_types)];
        return get_passthrough(state, ctx, "get chains", "/v1/chains", &query).await;
    }
    let chains = state.chains.ensure_loaded(ctx).await?;
    to_json(&Directory { chains: &chains })
}

pub async fn get_chain_by_id(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let id = validate_chain_id("id", &get_string(args, "id"))?;
    let chain = state.chains.find_by_id(ctx, id).await?;
    to_json(&chain)
}

pub async fn get_chain_by_name(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let name = get_required_string(args, "name")?;
    let chain = state.chains.find(ctx, &name).await?;
    to_json(&chain)
}
