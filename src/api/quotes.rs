// src/api/quotes.rs
//
// Quote, route and status tools. Wallet-address fields are treated as
// recipients of value, so the zero address is refused before anything is
// sent upstream.

use serde_json::{json, Map, Value};

use super::{get_passthrough, post_passthrough, ToolError, ToolOutcome};
use crate::blockchain::validation::{
    validate_amount, validate_chain_id, validate_chain_ref, validate_recipient_address,
    validate_slippage, validate_token_address, validate_token_ref, ValidationError,
};
use crate::mcp::context::CallContext;
use crate::utils::{get_array, get_object, get_required_string, get_string, get_string_array};
use crate::AppState;

pub async fn get_quote(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let from_chain = get_required_string(args, "fromChain")?;
    validate_chain_ref("fromChain", &from_chain)?;
    let to_chain = get_required_string(args, "toChain")?;
    validate_chain_ref("toChain", &to_chain)?;
    let from_token = get_required_string(args, "fromToken")?;
    validate_token_ref("fromToken", &from_token)?;
    let to_token = get_required_string(args, "toToken")?;
    validate_token_ref("toToken", &to_token)?;
    let from_address = get_required_string(args, "fromAddress")?;
    validate_recipient_address("fromAddress", &from_address)?;
    let from_amount = get_required_string(args, "fromAmount")?;
    validate_amount("fromAmount", &from_amount)?;

    let to_address = get_string(args, "toAddress");
    if !to_address.is_empty() {
        validate_recipient_address("toAddress", &to_address)?;
    }
    let slippage = get_string(args, "slippage");
    validate_slippage(&slippage)?;

    let query = [
        ("fromChain", from_chain),
        ("toChain", to_chain),
        ("fromToken", from_token),
        ("toToken", to_token),
        ("fromAddress", from_address),
        ("fromAmount", from_amount),
        ("toAddress", to_address),
        ("slippage", slippage),
        ("integrator", get_string(args, "integrator")),
        ("order", get_string(args, "order")),
        ("allowBridges", get_string_array(args, "allowBridges").join(",")),
        ("allowExchanges", get_string_array(args, "allowExchanges").join(",")),
    ];
    get_passthrough(state, ctx, "get quote", "/v1/quote", &query).await
}

pub async fn get_status(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let tx_hash = get_required_string(args, "txHash")?;
    let from_chain = get_string(args, "fromChain");
    let to_chain = get_string(args, "toChain");
    if !from_chain.is_empty() {
        validate_chain_ref("fromChain", &from_chain)?;
    }
    if !to_chain.is_empty() {
        validate_chain_ref("toChain", &to_chain)?;
    }
    let query = [
        ("txHash", tx_hash),
        ("bridge", get_string(args, "bridge")),
        ("fromChain", from_chain),
        ("toChain", to_chain),
    ];
    get_passthrough(state, ctx, "get status", "/v1/status", &query).await
}

pub async fn get_routes(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let from_chain_id = validate_chain_id("fromChainId", &get_string(args, "fromChainId"))?;
    let to_chain_id = validate_chain_id("toChainId", &get_string(args, "toChainId"))?;
    let from_token = get_required_string(args, "fromTokenAddress")?;
    validate_token_address("fromTokenAddress", &from_token)?;
    let to_token = get_required_string(args, "toTokenAddress")?;
    validate_token_address("toTokenAddress", &to_token)?;
    let from_address = get_required_string(args, "fromAddress")?;
    validate_recipient_address("fromAddress", &from_address)?;
    let from_amount = get_required_string(args, "fromAmount")?;
    validate_amount("fromAmount", &from_amount)?;

    let mut body = json!({
        "fromChainId": from_chain_id,
        "toChainId": to_chain_id,
        "fromTokenAddress": from_token,
        "toTokenAddress": to_token,
        "fromAddress": from_address,
        "fromAmount": from_amount,
    });

    let to_address = get_string(args, "toAddress");
    if !to_address.is_empty() {
        validate_recipient_address("toAddress", &to_address)?;
        body["toAddress"] = json!(to_address);
    }

    let mut options = Map::new();
    if let Some(slippage) = validate_slippage(&get_string(args, "slippage"))? {
        options.insert("slippage".into(), json!(slippage));
    }
    let order = get_string(args, "order");
    if !order.is_empty() {
        options.insert("order".into(), json!(order));
    }
    if !options.is_empty() {
        body["options"] = Value::Object(options);
    }

    post_passthrough(state, ctx, "get routes", "/v1/advanced/routes", &body).await
}

pub async fn get_quote_with_calls(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let from_chain = get_required_string(args, "fromChain")?;
    validate_chain_ref("fromChain", &from_chain)?;
    let to_chain = get_required_string(args, "toChain")?;
    validate_chain_ref("toChain", &to_chain)?;
    let from_token = get_required_string(args, "fromToken")?;
    validate_token_ref("fromToken", &from_token)?;
    let to_token = get_required_string(args, "toToken")?;
    validate_token_ref("toToken", &to_token)?;
    let from_address = get_required_string(args, "fromAddress")?;
    validate_recipient_address("fromAddress", &from_address)?;
    let from_amount = get_required_string(args, "fromAmount")?;
    validate_amount("fromAmount", &from_amount)?;

    let contract_calls = get_array(args, "contractCalls");
    if contract_calls.is_empty() {
        return Err(ValidationError::new("contractCalls", "at least one contract call is required").into());
    }
    for (i, call) in contract_calls.iter().enumerate() {
        if !call.is_object() {
            return Err(ValidationError::new(
                &format!("contractCalls[{}]", i),
                "must be an object",
            )
            .into());
        }
    }

    let mut body = json!({
        "fromChain": from_chain,
        "toChain": to_chain,
        "fromToken": from_token,
        "toToken": to_token,
        "fromAddress": from_address,
        "fromAmount": from_amount,
        "contractCalls": contract_calls,
    });
    if let Some(slippage) = validate_slippage(&get_string(args, "slippage"))? {
        body["slippage"] = json!(slippage);
    }

    post_passthrough(state, ctx, "get quote with calls", "/v1/quote/contractCalls", &body).await
}

pub async fn get_step_transaction(state: &AppState, ctx: &CallContext, args: &Value) -> ToolOutcome {
    let step = get_object(args, "step")
        .ok_or_else(|| ToolError::from(ValidationError::new("step", "step object is required")))?;
    post_passthrough(
        state,
        ctx,
        "get step transaction",
        "/v1/advanced/stepTransaction",
        &Value::Object(step),
    )
    .await
}
