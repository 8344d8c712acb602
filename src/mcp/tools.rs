//! Tool catalogue advertised by `tools/list`.
//!
//! Read tools are always listed. Write tools sign with the process key and
//! are only listed when one is loaded.

use lazy_static::lazy_static;
use serde_json::{json, Map, Value};

/// Parameter kinds used in the input schemas.
#[derive(Clone, Copy)]
enum Kind {
    Str,
    Arr,
    Obj,
}

struct Param {
    name: &'static str,
    kind: Kind,
    description: &'static str,
    required: bool,
}

const fn req(name: &'static str, description: &'static str) -> Param {
    Param { name, kind: Kind::Str, description, required: true }
}

const fn opt(name: &'static str, description: &'static str) -> Param {
    Param { name, kind: Kind::Str, description, required: false }
}

const fn arr(name: &'static str, description: &'static str, required: bool) -> Param {
    Param { name, kind: Kind::Arr, description, required }
}

fn tool(name: &str, description: &str, params: &[Param]) -> Value {
    let mut properties = Map::new();
    for p in params {
        let schema = match p.kind {
            Kind::Str => json!({"type": "string", "description": p.description}),
            Kind::Arr => json!({"type": "array", "items": {}, "description": p.description}),
            Kind::Obj => json!({"type": "object", "description": p.description}),
        };
        properties.insert(p.name.to_string(), schema);
    }
    let required: Vec<&str> = params.iter().filter(|p| p.required).map(|p| p.name).collect();
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

const CHAIN: Param = req("chain", "Chain ID (e.g. '1') or name/key (e.g. 'ethereum', 'pol'). The RPC URL is looked up from the chain directory.");
const CHAIN_OPT: Param = opt("chain", "Chain ID or name/key. Used to look up the RPC URL when rpcUrl is not given.");
const RPC_URL: Param = opt("rpcUrl", "Custom JSON-RPC endpoint. Overrides the chain directory lookup.");

lazy_static! {
    static ref READ_TOOLS: Vec<Value> = vec![
        tool("health-check", "Server version, chain directory status and LI.FI API reachability.", &[]),
        tool(
            "get-tokens",
            "List tokens supported by LI.FI, optionally filtered by chain, chain type or minimum USD price.",
            &[
                opt("chains", "Comma-separated chain IDs, e.g. '1,137,42161'."),
                opt("chainTypes", "Comma-separated chain types: 'EVM', 'SVM'."),
                opt("minPriceUSD", "Minimum token price in USD."),
            ],
        ),
        tool(
            "get-token",
            "Details of one token: address, symbol, decimals and price.",
            &[
                req("chain", "Chain ID or name."),
                req("token", "Token address or symbol. The zero address denotes the native token."),
            ],
        ),
        tool(
            "get-quote",
            "Best quote for a swap or bridge, including a transactionRequest ready for execute-quote.",
            &[
                req("fromChain", "Source chain ID."),
                req("toChain", "Destination chain ID."),
                req("fromToken", "Source token address or symbol."),
                req("toToken", "Destination token address or symbol."),
                req("fromAddress", "Sender wallet address."),
                req("fromAmount", "Amount in the token's smallest unit."),
                opt("toAddress", "Recipient wallet address. Defaults to fromAddress."),
                opt("slippage", "Maximum slippage as a decimal, e.g. '0.03'."),
                opt("integrator", "Integrator identifier."),
                opt("order", "RECOMMENDED, FASTEST, CHEAPEST or SAFEST."),
                arr("allowBridges", "Bridge keys to allow.", false),
                arr("allowExchanges", "Exchange keys to allow.", false),
            ],
        ),
        tool(
            "get-status",
            "Status of a cross-chain transfer by source transaction hash.",
            &[
                req("txHash", "Source chain transaction hash."),
                opt("bridge", "Bridge used, if known."),
                opt("fromChain", "Source chain ID."),
                opt("toChain", "Destination chain ID."),
            ],
        ),
        tool(
            "get-chains",
            "Chains supported by LI.FI with native tokens, RPC and explorer URLs.",
            &[opt("chainTypes", "Comma-separated chain types: 'EVM', 'SVM'.")],
        ),
        tool(
            "get-connections",
            "Token pairs that can be moved between chains.",
            &[
                opt("fromChain", "Source chain ID."),
                opt("toChain", "Destination chain ID."),
                opt("fromToken", "Source token address."),
                opt("toToken", "Destination token address."),
                opt("chainTypes", "Comma-separated chain types."),
                arr("allowBridges", "Bridge keys to allow.", false),
            ],
        ),
        tool(
            "get-tools",
            "Bridges and exchanges LI.FI can route through.",
            &[arr("chains", "Chain IDs to filter by.", false)],
        ),
        tool(
            "get-routes",
            "Several ranked route options for a swap. Use get-step-transaction to turn a step into a transaction.",
            &[
                req("fromChainId", "Source chain ID."),
                req("toChainId", "Destination chain ID."),
                req("fromTokenAddress", "Source token address."),
                req("toTokenAddress", "Destination token address."),
                req("fromAddress", "Sender wallet address."),
                req("fromAmount", "Amount in the token's smallest unit."),
                opt("toAddress", "Recipient wallet address."),
                opt("slippage", "Maximum slippage as a decimal."),
                opt("order", "RECOMMENDED, FASTEST, CHEAPEST or SAFEST."),
            ],
        ),
        tool(
            "get-quote-with-calls",
            "Quote that runs contract calls on the destination chain after bridging.",
            &[
                req("fromChain", "Source chain ID."),
                req("toChain", "Destination chain ID."),
                req("fromToken", "Source token address."),
                req("toToken", "Token received on the destination chain before the calls."),
                req("fromAddress", "Sender wallet address."),
                req("fromAmount", "Amount in the token's smallest unit."),
                arr("contractCalls", "Calls with toContractAddress, toContractCallData and toContractGasLimit.", true),
                opt("slippage", "Maximum slippage as a decimal."),
            ],
        ),
        tool(
            "get-step-transaction",
            "Transaction data for one step of a route returned by get-routes.",
            &[Param { name: "step", kind: Kind::Obj, description: "A step object from get-routes.", required: true }],
        ),
        tool("get-gas-prices", "Current gas prices for supported EVM chains.", &[]),
        tool(
            "get-gas-suggestion",
            "Recommended gas parameters for one chain.",
            &[req("chainId", "Chain ID.")],
        ),
        tool(
            "test-api-key",
            "Check the API key sent with this request (Authorization: Bearer or X-LiFi-Api-Key).",
            &[],
        ),
        tool(
            "get-chain-by-id",
            "Chain details by numeric chain ID.",
            &[req("id", "Numeric chain ID.")],
        ),
        tool(
            "get-chain-by-name",
            "Chain details by name, key or ID (case-insensitive).",
            &[req("name", "Chain name, key or ID.")],
        ),
        tool(
            "get-native-token-balance",
            "Native token balance of an address, in wei, with symbol and decimals.",
            &[CHAIN, RPC_URL, req("address", "Wallet address.")],
        ),
        tool(
            "get-token-balance",
            "ERC-20 balance of a wallet, with symbol and decimals.",
            &[
                CHAIN,
                RPC_URL,
                req("tokenAddress", "ERC-20 contract address."),
                req("walletAddress", "Wallet address."),
            ],
        ),
        tool(
            "get-allowance",
            "ERC-20 amount a spender may move on behalf of an owner.",
            &[
                CHAIN,
                RPC_URL,
                req("tokenAddress", "ERC-20 contract address."),
                req("ownerAddress", "Token owner."),
                req("spenderAddress", "Approved spender, e.g. transactionRequest.to of a quote."),
            ],
        ),
    ];

    static ref WRITE_TOOLS: Vec<Value> = vec![
        tool("get-wallet-address", "Address of the server's signing key.", &[]),
        tool(
            "execute-quote",
            "Simulate, sign and broadcast the transactionRequest of a quote with the server's key.",
            &[
                Param { name: "transactionRequest", kind: Kind::Obj, description: "transactionRequest object from get-quote.", required: true },
                CHAIN_OPT,
                RPC_URL,
            ],
        ),
        tool(
            "approve-token",
            "Approve a spender for an ERC-20 token from the server's wallet.",
            &[
                CHAIN_OPT,
                RPC_URL,
                req("tokenAddress", "ERC-20 contract address."),
                req("spenderAddress", "Spender to approve."),
                req("amount", "Allowance in the token's smallest unit. '0' revokes."),
            ],
        ),
        tool(
            "transfer-token",
            "Send ERC-20 tokens from the server's wallet.",
            &[
                CHAIN_OPT,
                RPC_URL,
                req("tokenAddress", "ERC-20 contract address."),
                req("to", "Recipient address."),
                req("amount", "Amount in the token's smallest unit."),
            ],
        ),
        tool(
            "transfer-native",
            "Send the chain's native token from the server's wallet.",
            &[CHAIN_OPT, RPC_URL, req("to", "Recipient address."), req("amount", "Amount in wei.")],
        ),
    ];
}

/// Tools exposed for the current key state.
pub fn list(signing_enabled: bool) -> Vec<Value> {
    let mut tools = READ_TOOLS.clone();
    if signing_enabled {
        tools.extend(WRITE_TOOLS.iter().cloned());
    }
    tools
}

fn name_of(tool: &Value) -> Option<&str> {
    tool.get("name").and_then(Value::as_str)
}

pub fn is_known(name: &str) -> bool {
    READ_TOOLS
        .iter()
        .chain(WRITE_TOOLS.iter())
        .any(|t| name_of(t) == Some(name))
}

pub fn is_write_tool(name: &str) -> bool {
    WRITE_TOOLS.iter().any(|t| name_of(t) == Some(name))
}
