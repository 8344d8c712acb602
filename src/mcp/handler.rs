//! # MCP Handler Module
//!
//! Dispatches JSON-RPC requests (`initialize`, `ping`, `tools/list`,
//! `tools/call`) and routes tool calls to the handlers in [`crate::api`].
//!
//! Every tool call runs behind one recovery boundary: a panic inside a
//! handler becomes an `isError` tool result, and cancelling the call's
//! context abandons the handler at its next suspension point.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Once;
use std::time::Instant;

use futures::FutureExt;
use serde_json::{json, Value};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::api::{self, ToolOutcome};
use crate::mcp::context::CallContext;
use crate::mcp::protocol::{error_codes, Request, Response, ToolResult, PROTOCOL_VERSION};
use crate::mcp::{tools, SERVER_NAME, SERVER_VERSION};
use crate::AppState;

/// This is the main dispatcher for all incoming MCP requests.
pub async fn handle_mcp_request(req: Request, state: AppState, ctx: CallContext) -> Option<Response> {
    if req.is_notification() {
        debug!(method = %req.method, "notification received");
        return None;
    }
    debug!(method = %req.method, "handling MCP request");

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(&req),
        "ping" => Response::success(req.id.clone(), json!({})),
        "tools/list" => handle_tools_list(&req, &state),
        "tools/call" => handle_tool_call(req, &state, &ctx).await,
        _ => Response::error(
            req.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Some(response)
}

fn handle_initialize(req: &Request) -> Response {
    let instructions = "LI.FI cross-chain swap gateway: quotes, routes, transfer status, chain and token \
                        discovery, balances, and (with a loaded key) transaction execution.";
    Response::success(
        req.id.clone(),
        json!({
            "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "instructions": instructions
        }),
    )
}

fn handle_tools_list(req: &Request, state: &AppState) -> Response {
    let tools = tools::list(state.wallet.has_key());
    Response::success(req.id.clone(), json!({ "tools": tools }))
}

async fn handle_tool_call(req: Request, state: &AppState, ctx: &CallContext) -> Response {
    let params = match req.params.as_ref() {
        Some(p) => p,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'params' object".into(),
            )
        }
    };

    let tool_name = match params.get("name").and_then(|n| n.as_str()) {
        Some(name) => name,
        None => {
            return Response::error(
                req.id,
                error_codes::INVALID_PARAMS,
                "Missing 'name' field in params".into(),
            )
        }
    };
    if !tools::is_known(tool_name) {
        return Response::error(
            req.id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Unknown tool: {}", tool_name),
        );
    }

    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let result = call_tool(state, ctx, tool_name, &args).await;
    match serde_json::to_value(&result) {
        Ok(value) => Response::success(req.id, value),
        Err(e) => Response::error(req.id, error_codes::INTERNAL_ERROR, e.to_string()),
    }
}

/// Runs one tool and converts its outcome into a tool result.
pub async fn call_tool(state: &AppState, ctx: &CallContext, name: &str, args: &Value) -> ToolResult {
    let call_id = Uuid::new_v4();
    let span = info_span!("tool_call", tool = name, %call_id);
    async move {
        let started = Instant::now();
        let outcome = guarded(ctx, dispatch(state, ctx, name, args)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(text) => {
                info!(elapsed_ms, "tool call succeeded");
                ToolResult::text(text)
            }
            Err(message) => {
                warn!(elapsed_ms, error = %message, "tool call failed");
                ToolResult::error(message)
            }
        }
    }
    .instrument(span)
    .await
}

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Installs the process-wide panic hook. The hook logs every panic and keeps
/// the panicking thread's backtrace so [`guarded`] can attach it to the
/// recovered error. Calling it again is a no-op.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let backtrace = Backtrace::force_capture().to_string();
            error!(panic = %info, "panic in task");
            debug!("{}", backtrace);
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
        }));
    });
}

fn take_panic_backtrace() -> Option<String> {
    PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

/// Recovery boundary around a handler future.
///
/// The handler is polled on the caller's thread, so a backtrace recorded by
/// [`install_panic_hook`] belongs to the panic caught here. Without the hook
/// only the panic message is logged.
pub async fn guarded<F>(ctx: &CallContext, handler: F) -> Result<String, String>
where
    F: Future<Output = ToolOutcome>,
{
    let protected = AssertUnwindSafe(handler).catch_unwind();
    tokio::select! {
        biased;
        _ = ctx.cancellation().cancelled() => Err("request cancelled".to_string()),
        outcome = protected => match outcome {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                match take_panic_backtrace() {
                    Some(backtrace) => {
                        error!(panic = %message, "handler panic recovered\n{}", backtrace)
                    }
                    None => error!(panic = %message, "handler panic recovered"),
                }
                Err(format!("internal error: handler panic: {}", message))
            }
        },
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn dispatch(state: &AppState, ctx: &CallContext, name: &str, args: &Value) -> ToolOutcome {
    match name {
        "health-check" => api::health::health_check(state, ctx, args).await,
        "get-tokens" => api::tokens::get_tokens(state, ctx, args).await,
        "get-token" => api::tokens::get_token(state, ctx, args).await,
        "get-connections" => api::tokens::get_connections(state, ctx, args).await,
        "get-tools" => api::tokens::get_tools(state, ctx, args).await,
        "get-quote" => api::quotes::get_quote(state, ctx, args).await,
        "get-status" => api::quotes::get_status(state, ctx, args).await,
        "get-routes" => api::quotes::get_routes(state, ctx, args).await,
        "get-quote-with-calls" => api::quotes::get_quote_with_calls(state, ctx, args).await,
        "get-step-transaction" => api::quotes::get_step_transaction(state, ctx, args).await,
        "get-chains" => api::chains::get_chains(state, ctx, args).await,
        "get-chain-by-id" => api::chains::get_chain_by_id(state, ctx, args).await,
        "get-chain-by-name" => api::chains::get_chain_by_name(state, ctx, args).await,
        "get-gas-prices" => api::gas::get_gas_prices(state, ctx, args).await,
        "get-gas-suggestion" => api::gas::get_gas_suggestion(state, ctx, args).await,
        "test-api-key" => api::gas::test_api_key(state, ctx, args).await,
        "get-native-token-balance" => api::balance::get_native_token_balance(state, ctx, args).await,
        "get-token-balance" => api::balance::get_token_balance(state, ctx, args).await,
        "get-allowance" => api::balance::get_allowance(state, ctx, args).await,
        "get-wallet-address" => api::transfer::get_wallet_address(state, ctx, args).await,
        "execute-quote" => api::transfer::execute_quote(state, ctx, args).await,
        "approve-token" => api::transfer::approve_token(state, ctx, args).await,
        "transfer-token" => api::transfer::transfer_token(state, ctx, args).await,
        "transfer-native" => api::transfer::transfer_native(state, ctx, args).await,
        other => Err(api::ToolError::Message(format!("unknown tool: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::blockchain::{client::RpcPool, wallet_manager::WalletManager};
    use crate::config::Config;
    use crate::lifi::client::test_support::{client_with, ScriptedTransport};

    fn state(transport: Arc<ScriptedTransport>) -> AppState {
        AppState::new(
            Config::default(),
            Arc::new(client_with(transport)),
            Arc::new(RpcPool::new()),
            WalletManager::empty(),
        )
    }

    fn request(method: &str, params: Value) -> Request {
        serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}))
            .unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let resp = handle_mcp_request(
            request("initialize", json!({})),
            state(Arc::default()),
            CallContext::default(),
        )
        .await
        .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "lifi-mcp");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let req: Request =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
                .unwrap();
        assert!(handle_mcp_request(req, state(Arc::default()), CallContext::default())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn unknown_method_and_tool() {
        let resp = handle_mcp_request(
            request("resources/list", json!({})),
            state(Arc::default()),
            CallContext::default(),
        )
        .await
        .unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);

        let resp = handle_mcp_request(
            request("tools/call", json!({"name": "make-coffee"})),
            state(Arc::default()),
            CallContext::default(),
        )
        .await
        .unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_PARAMS);

        let resp = handle_mcp_request(
            request("tools/call", json!({"arguments": {}})),
            state(Arc::default()),
            CallContext::default(),
        )
        .await
        .unwrap();
        assert_eq!(resp.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn tools_list_without_key_has_only_read_tools() {
        let resp = handle_mcp_request(
            request("tools/list", json!({})),
            state(Arc::default()),
            CallContext::default(),
        )
        .await
        .unwrap();
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 19);
    }

    #[tokio::test]
    async fn panics_become_error_results() {
        let ctx = CallContext::default();
        let outcome = guarded(&ctx, async {
            let v: Vec<u8> = Vec::new();
            if v.is_empty() {
                panic!("boom");
            }
            Ok("unreachable".to_string())
        })
        .await;
        assert_eq!(outcome.unwrap_err(), "internal error: handler panic: boom");
    }

    #[tokio::test]
    async fn recovered_panic_consumes_hook_backtrace() {
        install_panic_hook();
        install_panic_hook();

        let caught = std::panic::catch_unwind(|| panic!("outside a handler"));
        assert!(caught.is_err());
        assert!(take_panic_backtrace().is_some());

        let outcome = guarded(&CallContext::default(), async {
            let v: Vec<u8> = Vec::new();
            if v.is_empty() {
                panic!("inside a handler");
            }
            Ok("unreachable".to_string())
        })
        .await;
        assert_eq!(outcome.unwrap_err(), "internal error: handler panic: inside a handler");
        assert!(take_panic_backtrace().is_none());
    }

    #[tokio::test]
    async fn cancelled_context_abandons_handler() {
        let ctx = CallContext::default();
        ctx.cancel();
        let outcome = guarded(&ctx, std::future::pending::<ToolOutcome>()).await;
        assert_eq!(outcome.unwrap_err(), "request cancelled");
    }

    #[tokio::test]
    async fn write_tool_without_key_reports_missing_key() {
        let transport = Arc::new(ScriptedTransport::default());
        let result = call_tool(
            &state(transport.clone()),
            &CallContext::default(),
            "transfer-native",
            &json!({"to": "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23", "amount": "1", "rpcUrl": "http://localhost:8545"}),
        )
        .await;
        assert!(result.is_error);
        assert_eq!(
            result.first_text(),
            "no private key loaded. Please start the server with a keystore"
        );
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn validation_errors_are_tool_errors() {
        let transport = Arc::new(ScriptedTransport::default());
        let result = call_tool(
            &state(transport.clone()),
            &CallContext::default(),
            "get-gas-suggestion",
            &json!({"chainId": "-5"}),
        )
        .await;
        assert!(result.is_error);
        assert!(result.first_text().starts_with("chainId:"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn upstream_body_is_passed_through() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(200, r#"{"standard":"30"}"#);
        let result = call_tool(
            &state(transport.clone()),
            &CallContext::default(),
            "get-gas-suggestion",
            &json!({"chainId": "137"}),
        )
        .await;
        assert!(!result.is_error);
        assert_eq!(result.first_text(), r#"{"standard":"30"}"#);
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://li.quest/v1/gas/suggestion/137");
    }
}
