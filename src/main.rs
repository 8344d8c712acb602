// src/main.rs

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dashmap::DashMap;
use lifi_mcp_server::{
    api,
    blockchain::{
        client::RpcPool,
        wallet_manager::{create_keystore, load_keystore, wallet_from_private_key, WalletManager},
    },
    config::{CliArgs, Command, Config},
    lifi::HttpClient,
    mcp::{
        context::CallContext,
        handler::{handle_mcp_request, install_panic_hook},
        protocol::{error_codes, Request, Response},
    },
    AppState,
};
use secrecy::SecretString;
use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// --- HTTP Server Logic ---
async fn run_http_server(state: AppState) -> Result<()> {
    let addr = state.config.bind_address();
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🚀 HTTP Server listening on {}", addr);
    axum::serve(listener, app).await.context("HTTP server error")?;
    Ok(())
}

// --- MCP Server Logic ---

/// In-flight requests by JSON-RPC id, so `notifications/cancelled` can reach them.
type InFlight = Arc<DashMap<String, CancellationToken>>;

fn cancel_in_flight(in_flight: &InFlight, params: Option<&Value>) {
    let Some(id) = params.and_then(|p| p.get("requestId")) else {
        return;
    };
    if let Some((_, token)) = in_flight.remove(&id.to_string()) {
        debug!(request_id = %id, "cancelling request");
        token.cancel();
    }
}

async fn run_mcp_server(state: AppState) -> Result<()> {
    info!("🚀 Starting MCP server on stdin/stdout...");

    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();
    let writer = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(response) = rx.recv().await {
            let response_json = match serde_json::to_string(&response) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize response: {}", e);
                    continue;
                }
            };
            debug!("Sending: {}", response_json);
            if let Err(e) = stdout
                .write_all(format!("{}\n", response_json).as_bytes())
                .await
            {
                error!("Failed to write response: {}", e);
                break;
            }
            if let Err(e) = stdout.flush().await {
                error!("Failed to flush stdout: {}", e);
                break;
            }
        }
    });

    let in_flight: InFlight = Arc::new(DashMap::new());
    let mut lines = io::BufReader::new(io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("EOF received, shutting down MCP server");
                break;
            }
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!("Received: {}", line);

        let request = match serde_json::from_str::<Request>(line) {
            Ok(request) => request,
            Err(parse_error) => {
                error!("JSON parse error: {}", parse_error);
                let _ = tx.send(Response::error(
                    Value::Null,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", parse_error),
                ));
                continue;
            }
        };

        if request.method == "notifications/cancelled" {
            cancel_in_flight(&in_flight, request.params.as_ref());
            continue;
        }

        let ctx = CallContext::new(state.default_credential.clone());
        let key = request.id.to_string();
        if !request.is_notification() {
            in_flight.insert(key.clone(), ctx.cancellation().clone());
        }

        let state = state.clone();
        let tx = tx.clone();
        let in_flight = in_flight.clone();
        tokio::spawn(async move {
            let response = handle_mcp_request(request, state, ctx).await;
            in_flight.remove(&key);
            if let Some(response) = response {
                let _ = tx.send(response);
            }
        });
    }

    // The writer drains once every in-flight task has dropped its sender.
    drop(tx);
    if let Err(e) = writer.await {
        warn!("writer task ended abnormally: {}", e);
    }
    info!("MCP server shutting down");
    Ok(())
}

/// `new-wallet --name <name> --password <password>`
fn new_wallet(name: &str, password: String, config: &Config) -> Result<()> {
    let password = SecretString::new(password);
    let dir = config
        .keystore_dir()
        .ok_or_else(|| anyhow!("could not determine keystore directory; set KEYSTORE_DIR"))?;

    let wallet = create_keystore(&dir, name, &password)?;
    println!("Address: {:?}", wallet.address);
    println!("Keystore: {}", wallet.path.display());
    Ok(())
}

/// Keystore (name plus password) wins over a raw `PRIVATE_KEY`.
fn load_wallet(config: &Config) -> Result<WalletManager> {
    if let Some(name) = &config.keystore_name {
        let password = config
            .keystore_password
            .as_ref()
            .ok_or_else(|| anyhow!("keystore {} given without a password", name))?;
        let dir = config
            .keystore_dir()
            .ok_or_else(|| anyhow!("could not determine keystore directory; set KEYSTORE_DIR"))?;
        let wallet = load_keystore(&dir, name, password)?;
        return Ok(WalletManager::with_signer(Arc::new(wallet)));
    }
    if let Some(raw) = &config.private_key {
        let wallet = wallet_from_private_key(raw)?;
        return Ok(WalletManager::with_signer(Arc::new(wallet)));
    }
    Ok(WalletManager::empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lifi_mcp_server=debug,lifi_mcp=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    install_panic_hook();

    let args = CliArgs::parse();
    let config = Config::from_env()
        .context("failed to load configuration")?
        .with_args(&args);

    if let Some(Command::NewWallet { name, password }) = args.command {
        return new_wallet(&name, password, &config);
    }

    let wallet = load_wallet(&config)?;
    match wallet.address() {
        Some(address) => info!(address = ?address, "signing key loaded; write tools enabled"),
        None => info!("no signing key loaded; running read-only"),
    }

    let http = Arc::new(HttpClient::from_config(&config).context("failed to build HTTP client")?);
    let mcp_mode = config.mcp_mode;
    let state = AppState::new(config, http, Arc::new(RpcPool::new()), wallet);

    if mcp_mode {
        run_mcp_server(state).await
    } else {
        run_http_server(state).await
    }
}
