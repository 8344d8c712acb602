// src/api/gas.rs

use serde_json::Value;

use super::{get_passthrough, ToolError, ToolOutcome};
use crate::blockchain::validation::validate_chain_id;
use crate::mcp::context::CallContext;
use crate::utils::get_string;
use crate::AppState;

pub async fn get_gas_prices(state: &AppState, ctx: &CallContext, _args: &Value) -> ToolOutcome {
    get_passthrough(state, ctx, "get gas prices", "/v1/gas/prices", &[]).await
}

pub async fn get_gas_suggestion(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let chain_id = validate_chain_id("chainId", &get_string(args, "chainId"))?;
    let path = format!("/v1/gas/suggestion/{}", chain_id);
    get_passthrough(state, ctx, "get gas suggestion", &path, &[]).await
}

/// Checks the caller's key against the upstream API. Only meaningful with a
/// credential, so a call without one fails locally.
pub async fn test_api_key(state: &AppState, ctx: &CallContext, _args: &Value) -> ToolOutcome {
    if ctx.credential().is_none() {
        return Err(ToolError::Message(
            "no API key provided; pass it via the Authorization: Bearer or X-LiFi-Api-Key header"
                .to_string(),
        ));
    }
    get_passthrough(state, ctx, "test API key", "/v1/keys/test", &[]).await
}
