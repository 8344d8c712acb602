// MCP protocol surface: request context, JSON-RPC types, tool catalogue and dispatch
pub mod context;
pub mod handler;
pub mod protocol;
pub mod tools;

pub const SERVER_NAME: &str = "lifi-mcp";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
