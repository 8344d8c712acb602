// src/config.rs

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;

use crate::lifi::client::DEFAULT_BASE_URL;
use crate::lifi::rate_limiter::{DEFAULT_MAX_TOKENS, DEFAULT_PERIOD};

/// Everything the server needs at startup, loaded once from the environment
/// (and `.env`) with command-line flags taking precedence.
#[derive(Clone, Debug)]
pub struct Config {
    // HTTP transport
    pub host: String,
    pub port: u16,
    /// Serve MCP over stdin/stdout instead of HTTP.
    pub mcp_mode: bool,

    // Upstream API
    pub api_base_url: String,
    /// Process-wide credential; per-request headers override it in HTTP mode.
    pub api_key: Option<SecretString>,
    pub rate_limit_max_tokens: u32,
    pub rate_limit_period: Duration,
    pub http_timeout: Duration,

    // Signing key
    pub keystore_name: Option<String>,
    pub keystore_password: Option<SecretString>,
    pub keystore_dir: Option<PathBuf>,
    pub private_key: Option<SecretString>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            mcp_mode: false,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            rate_limit_max_tokens: DEFAULT_MAX_TOKENS,
            rate_limit_period: DEFAULT_PERIOD,
            http_timeout: Duration::from_secs(30),
            keystore_name: None,
            keystore_password: None,
            keystore_dir: None,
            private_key: None,
        }
    }
}

/// Command-line surface of `lifi_mcp`.
#[derive(Debug, Default, Parser)]
#[command(name = "lifi_mcp", about = "MCP gateway for the LI.FI cross-chain API")]
pub struct CliArgs {
    /// Serve MCP over stdin/stdout instead of HTTP.
    #[arg(long)]
    pub mcp: bool,
    /// Keystore name to load the signing key from.
    #[arg(long)]
    pub keystore: Option<String>,
    /// Password for `--keystore`.
    #[arg(long)]
    pub password: Option<String>,
    /// LI.FI API key for upstream requests.
    #[arg(long)]
    pub api_key: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an encrypted keystore and print its address.
    NewWallet {
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let mcp_mode = non_empty_var("MCP_MODE")
            .map(|m| !matches!(m.to_ascii_lowercase().as_str(), "0" | "false" | "http"))
            .unwrap_or(false);

        Ok(Config {
            host: non_empty_var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            mcp_mode,
            api_base_url: non_empty_var("LIFI_API_BASE_URL").unwrap_or(defaults.api_base_url),
            api_key: non_empty_var("LIFI_API_KEY").map(SecretString::new),
            rate_limit_max_tokens: parse_var("RATE_LIMIT_MAX_TOKENS", defaults.rate_limit_max_tokens)?,
            rate_limit_period: Duration::from_secs(parse_var(
                "RATE_LIMIT_PERIOD_SECS",
                defaults.rate_limit_period.as_secs(),
            )?),
            http_timeout: Duration::from_secs(parse_var(
                "HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
            keystore_name: non_empty_var("KEYSTORE_NAME"),
            keystore_password: non_empty_var("KEYSTORE_PASSWORD").map(SecretString::new),
            keystore_dir: non_empty_var("KEYSTORE_DIR").map(PathBuf::from),
            private_key: non_empty_var("PRIVATE_KEY").map(SecretString::new),
        })
    }

    /// Applies command-line overrides on top of the environment values.
    pub fn with_args(mut self, args: &CliArgs) -> Self {
        if args.mcp {
            self.mcp_mode = true;
        }
        if let Some(name) = &args.keystore {
            self.keystore_name = Some(name.clone());
        }
        if let Some(password) = &args.password {
            self.keystore_password = Some(SecretString::new(password.clone()));
        }
        if let Some(key) = &args.api_key {
            self.api_key = Some(SecretString::new(key.clone()));
        }
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Keystore directory, falling back to the platform's Ethereum default.
    pub fn keystore_dir(&self) -> Option<PathBuf> {
        self.keystore_dir
            .clone()
            .or_else(crate::blockchain::wallet_manager::default_keystore_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn flags_with_values_and_inline_form() {
        let args =
            CliArgs::try_parse_from(["lifi_mcp", "--mcp", "--keystore", "main", "--password=hunter2"])
                .unwrap();
        assert!(args.mcp);
        assert_eq!(args.keystore.as_deref(), Some("main"));
        assert_eq!(args.password.as_deref(), Some("hunter2"));
        assert!(args.api_key.is_none());
        assert!(args.command.is_none());
    }

    #[test]
    fn new_wallet_subcommand_requires_name_and_password() {
        let args = CliArgs::try_parse_from([
            "lifi_mcp",
            "new-wallet",
            "--name",
            "main",
            "--password",
            "hunter2",
        ])
        .unwrap();
        match args.command {
            Some(Command::NewWallet { name, password }) => {
                assert_eq!(name, "main");
                assert_eq!(password, "hunter2");
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(CliArgs::try_parse_from(["lifi_mcp", "new-wallet", "--name", "main"]).is_err());
        assert!(CliArgs::try_parse_from(["lifi_mcp", "--bogus"]).is_err());
    }

    #[test]
    fn flags_override_environment_values() {
        let config = Config {
            api_key: Some(SecretString::new("from-env".into())),
            ..Config::default()
        }
        .with_args(&CliArgs::try_parse_from(["lifi_mcp", "--api-key", "from-flag", "--mcp"]).unwrap());
        assert!(config.mcp_mode);
        assert_eq!(
            config.api_key.as_ref().map(|k| k.expose_secret().as_str()),
            Some("from-flag")
        );
    }

    #[test]
    fn defaults_match_public_tier() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "https://li.quest");
        assert_eq!(config.rate_limit_max_tokens, 200);
        assert_eq!(config.rate_limit_period, Duration::from_secs(7200));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let config = Config {
            api_key: Some(SecretString::new("super-secret".into())),
            ..Config::default()
        };
        assert!(!format!("{:?}", config).contains("super-secret"));
    }
}
