use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::Value;

use super::{to_json, ToolOutcome};
use crate::mcp::context::CallContext;
use crate::mcp::{SERVER_NAME, SERVER_VERSION};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheStatus {
    initialized: bool,
    chains: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamStatus {
    base_url: String,
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthReport {
    status: &'static str,
    server: &'static str,
    version: &'static str,
    timestamp: String,
    chain_cache: CacheStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    api: Option<UpstreamStatus>,
    signing_enabled: bool,
}

async fn cache_status(state: &AppState) -> CacheStatus {
    CacheStatus {
        initialized: state.chains.is_initialized().await,
        chains: state.chains.snapshot().await.len(),
    }
}

/// `health-check` tool: loads the chain directory if needed, which doubles as
/// the upstream connectivity check.
pub async fn health_check(state: &AppState, ctx: &CallContext, _args: &Value) -> ToolOutcome {
    let upstream = state.chains.ensure_loaded(ctx).await;
    let api = UpstreamStatus {
        base_url: state.http.base_url().to_string(),
        reachable: upstream.is_ok(),
        error: upstream.err().map(|e| e.to_string()),
    };
    let report = HealthReport {
        status: if api.reachable { "healthy" } else { "degraded" },
        server: SERVER_NAME,
        version: SERVER_VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
        chain_cache: cache_status(state).await,
        api: Some(api),
        signing_enabled: state.wallet.has_key(),
    };
    to_json(&report)
}

/// `GET /health`. Never calls upstream.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthReport {
        status: "ok",
        server: SERVER_NAME,
        version: SERVER_VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
        chain_cache: cache_status(&state).await,
        api: None,
        signing_enabled: state.wallet.has_key(),
    })
}
