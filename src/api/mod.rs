//! # API Module
//!
//! Tool handlers behind the MCP `tools/call` method, plus the axum router that
//! exposes the MCP endpoint over HTTP.
//!
//! ## Tool groups
//!
//! - `tokens` - token lists, single token lookup, connections, bridge/DEX tools
//! - `quotes` - quotes, routes, contract-call quotes, step transactions, status
//! - `chains` - chain directory and chain lookups (served from the chain cache)
//! - `gas` - gas prices, gas suggestion, API key check
//! - `balance` - native/token balances and allowances over JSON-RPC
//! - `transfer` - signing tools: quote execution, approve, transfers
//! - `health` - `health-check` tool and `GET /health`
//!
//! Every handler returns the text payload of a tool result or a [`ToolError`].

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::blockchain::client::{ChainRpc, RpcError};
use crate::blockchain::services::transactions::EngineError;
use crate::blockchain::validation::{validate_chain_ref, ValidationError};
use crate::lifi::{ChainCacheError, HttpError};
use crate::mcp::context::{extract_api_key, CallContext};
use crate::mcp::handler::handle_mcp_request;
use crate::mcp::protocol::{error_codes, Request, Response};
use crate::{utils, AppState};

pub mod balance;
pub mod chains;
pub mod gas;
pub mod health;
pub mod quotes;
pub mod tokens;
pub mod transfer;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to {action}: {source}")]
    Upstream {
        action: &'static str,
        source: HttpError,
    },
    #[error(transparent)]
    Chains(#[from] ChainCacheError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0}")]
    Message(String),
}

/// Text payload of a successful tool call.
pub type ToolOutcome = Result<String, ToolError>;

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> ToolOutcome {
    serde_json::to_string(value)
        .map_err(|e| ToolError::Message(format!("error serializing result: {}", e)))
}

/// GETs an upstream path and returns the body verbatim.
pub(crate) async fn get_passthrough(
    state: &AppState,
    ctx: &CallContext,
    action: &'static str,
    path: &str,
    query: &[(&str, String)],
) -> ToolOutcome {
    let url = state.http.endpoint(path, &utils::query_pairs(query));
    let body = state
        .http
        .get(ctx, &url)
        .await
        .map_err(|source| ToolError::Upstream { action, source })?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// POSTs a JSON body to an upstream path and returns the response verbatim.
pub(crate) async fn post_passthrough(
    state: &AppState,
    ctx: &CallContext,
    action: &'static str,
    path: &str,
    body: &Value,
) -> ToolOutcome {
    let url = state.http.endpoint(path, &[]);
    let payload = serde_json::to_vec(body)
        .map_err(|e| ToolError::Message(format!("error serializing request: {}", e)))?;
    let response = state
        .http
        .post(ctx, &url, payload)
        .await
        .map_err(|source| ToolError::Upstream { action, source })?;
    Ok(String::from_utf8_lossy(&response).into_owned())
}

/// An explicit `rpcUrl` wins; otherwise `chain` is resolved through the chain
/// cache.
pub async fn resolve_rpc_url(
    state: &AppState,
    ctx: &CallContext,
    args: &Value,
) -> Result<String, ToolError> {
    let rpc_url = utils::get_string(args, "rpcUrl");
    if !rpc_url.trim().is_empty() {
        return Ok(rpc_url.trim().to_string());
    }
    let chain = utils::get_string(args, "chain");
    if chain.trim().is_empty() {
        return Err(ValidationError::new("chain", "either chain or rpcUrl is required").into());
    }
    validate_chain_ref("chain", &chain)?;
    Ok(state.chains.resolve(ctx, &chain).await?)
}

/// Resolves the endpoint for a call and hands back a client for it.
pub async fn connect(
    state: &AppState,
    ctx: &CallContext,
    args: &Value,
) -> Result<Arc<dyn ChainRpc>, ToolError> {
    let url = resolve_rpc_url(state, ctx, args).await?;
    Ok(state.rpc.connect(&url)?)
}

/// `POST /mcp` and `GET /health`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mcp", post(mcp_endpoint))
        .route("/health", get(health::health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn mcp_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let credential = extract_api_key(&headers).or_else(|| state.default_credential.clone());
    let request = match serde_json::from_slice::<Request>(&body) {
        Ok(request) => request,
        Err(e) => {
            error!("JSON parse error: {}", e);
            return Json(Response::error(
                Value::Null,
                error_codes::PARSE_ERROR,
                format!("Parse error: {}", e),
            ))
            .into_response();
        }
    };

    match handle_mcp_request(request, state, CallContext::new(credential)).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
