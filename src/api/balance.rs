use serde_json::Value;

use super::{connect, to_json, ToolOutcome};
use crate::blockchain::services::balance;
use crate::blockchain::validation::{validate_address, validate_token_address};
use crate::mcp::context::CallContext;
use crate::utils::get_string;
use crate::AppState;

pub async fn get_native_token_balance(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let address = validate_address("address", &get_string(args, "address"))?;
    let rpc = connect(state, ctx, args).await?;
    let result = balance::native_balance(rpc.as_ref(), &state.chains, ctx, address).await?;
    to_json(&result)
}

pub async fn get_token_balance(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let token = validate_token_address("tokenAddress", &get_string(args, "tokenAddress"))?;
    let wallet = validate_address("walletAddress", &get_string(args, "walletAddress"))?;
    let rpc = connect(state, ctx, args).await?;
    let result = balance::token_balance(rpc.as_ref(), token, wallet).await?;
    to_json(&result)
}

pub async fn get_allowance(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let token = validate_token_address("tokenAddress", &get_string(args, "tokenAddress"))?;
    let owner = validate_address("ownerAddress", &get_string(args, "ownerAddress"))?;
    let spender = validate_address("spenderAddress", &get_string(args, "spenderAddress"))?;
    let rpc = connect(state, ctx, args).await?;
    let result = balance::allowance(rpc.as_ref(), token, owner, spender).await?;
    to_json(&result)
}
