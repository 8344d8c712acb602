// src/api/transfer.rs
//
// Tools that sign with the process key. Each one checks for the key before
// touching the network.

use ethers::utils::to_checksum;
use serde_json::{json, Value};

use super::{connect, to_json, ToolError, ToolOutcome};
use crate::blockchain::models::{TokenMeta, TransactionDescriptor, TransactionReport};
use crate::blockchain::services::transactions::{EngineError, TransactionEngine};
use crate::blockchain::validation::{
    validate_address, validate_amount, validate_amount_allow_zero, validate_recipient_address,
    validate_token_address, ValidationError,
};
use crate::mcp::context::CallContext;
use crate::utils::{get_object, get_string};
use crate::AppState;

fn engine(state: &AppState) -> Result<TransactionEngine, ToolError> {
    Ok(TransactionEngine::from_optional(
        state.wallet.signer(),
        state.nonces.clone(),
    )?)
}

/// Serializes the report with tool-specific fields layered on top.
fn report_with(report: &TransactionReport, extra: Value) -> ToolOutcome {
    let mut value = serde_json::to_value(report)
        .map_err(|e| ToolError::Message(format!("error serializing result: {}", e)))?;
    if let (Value::Object(map), Value::Object(extra)) = (&mut value, extra) {
        map.extend(extra);
    }
    to_json(&value)
}

pub async fn get_wallet_address(state: &AppState, _ctx: &CallContext, _args: &Value) -> ToolOutcome {
    let address = state.wallet.address().ok_or(EngineError::NoKey)?;
    to_json(&json!({ "address": to_checksum(&address, None) }))
}

/// Executes the `transactionRequest` of a quote. Without `chain` or `rpcUrl`
/// the endpoint is looked up from the request's own `chainId`.
pub async fn execute_quote(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let engine = engine(state)?;
    let request = get_object(args, "transactionRequest").ok_or_else(|| {
        ValidationError::new("transactionRequest", "transactionRequest object is required")
    })?;
    let descriptor = TransactionDescriptor::from_json(&request)?;
    engine.check_sender(descriptor.from)?;

    let explicit = !get_string(args, "rpcUrl").trim().is_empty()
        || !get_string(args, "chain").trim().is_empty();
    let rpc = match descriptor.chain_id {
        Some(chain_id) if !explicit => {
            let url = state.chains.resolve(ctx, &chain_id.to_string()).await?;
            state.rpc.connect(&url)?
        }
        _ => connect(state, ctx, args).await?,
    };

    let report = engine.execute(rpc.as_ref(), descriptor).await?;
    to_json(&report)
}

pub async fn approve_token(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let engine = engine(state)?;
    let token = validate_token_address("tokenAddress", &get_string(args, "tokenAddress"))?;
    let spender = validate_address("spenderAddress", &get_string(args, "spenderAddress"))?;
    let amount = validate_amount_allow_zero("amount", &get_string(args, "amount"))?;
    let rpc = connect(state, ctx, args).await?;

    let receipt = engine.approve(rpc.as_ref(), token, spender, amount).await?;
    report_with(
        &receipt.report,
        json!({
            "tokenAddress": to_checksum(&token, None),
            "tokenSymbol": receipt.token.symbol,
            "spender": to_checksum(&spender, None),
            "amount": amount.to_string(),
            "decimals": receipt.token.decimals,
        }),
    )
}

pub async fn transfer_token(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let engine = engine(state)?;
    let token = validate_token_address("tokenAddress", &get_string(args, "tokenAddress"))?;
    let to = validate_recipient_address("to", &get_string(args, "to"))?;
    let amount = validate_amount("amount", &get_string(args, "amount"))?;
    let rpc = connect(state, ctx, args).await?;

    let receipt = engine.transfer_token(rpc.as_ref(), token, to, amount).await?;
    report_with(
        &receipt.report,
        json!({
            "to": to_checksum(&to, None),
            "tokenAddress": to_checksum(&token, None),
            "tokenSymbol": receipt.token.symbol,
            "amount": amount.to_string(),
            "decimals": receipt.token.decimals,
        }),
    )
}

pub async fn transfer_native(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let engine = engine(state)?;
    let to = validate_recipient_address("to", &get_string(args, "to"))?;
    let amount = validate_amount("amount", &get_string(args, "amount"))?;
    let rpc = connect(state, ctx, args).await?;

    let report = engine.transfer_native(rpc.as_ref(), to, amount).await?;
    let meta = match report.chain_id.parse::<u64>() {
        Ok(chain_id) => state
            .chains
            .native_token_info(ctx, chain_id)
            .await
            .map(|(symbol, decimals)| TokenMeta { symbol, decimals })
            .unwrap_or_else(|_| TokenMeta::native_fallback()),
        Err(_) => TokenMeta::native_fallback(),
    };
    report_with(
        &report,
        json!({
            "amount": amount.to_string(),
            "tokenSymbol": meta.symbol,
            "decimals": meta.decimals,
        }),
    )
}
