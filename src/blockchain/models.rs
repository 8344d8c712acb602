// src/blockchain/models.rs
use ethers::types::{Address, Bytes, U256};
use serde::Serialize;
use serde_json::{Map, Value};

use super::validation::ValidationError;

/// Parses a quantity given either as `0x`-prefixed hex or base-10 digits.
/// `""`, `"0x"` and `"0x0"` are zero.
pub fn parse_quantity(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "0x" || raw == "0x0" {
        return Some(U256::zero());
    }
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex_digits) => U256::from_str_radix(hex_digits, 16).ok(),
        None if raw.chars().all(|c| c.is_ascii_digit()) => U256::from_dec_str(raw).ok(),
        None => None,
    }
}

fn optional_string(
    map: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, ValidationError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::new(
            &format!("transactionRequest.{}", key),
            "must be a string",
        )),
    }
}

fn field(key: &str) -> String {
    format!("transactionRequest.{}", key)
}

/// An unsigned transaction supplied by the caller, typically copied verbatim
/// from the `transactionRequest` of an upstream quote.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDescriptor {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_price: Option<U256>,
    pub gas_limit: Option<U256>,
    pub chain_id: Option<U256>,
    pub from: Option<Address>,
}

impl TransactionDescriptor {
    pub fn call(to: Address, data: Bytes) -> Self {
        Self {
            to,
            data,
            value: U256::zero(),
            gas_price: None,
            gas_limit: None,
            chain_id: None,
            from: None,
        }
    }

    /// Parses the loose JSON shape returned by the quote endpoints.
    pub fn from_json(map: &Map<String, Value>) -> Result<Self, ValidationError> {
        let to_raw = optional_string(map, "to")?
            .ok_or_else(|| ValidationError::new(&field("to"), "address is required"))?;
        let to = super::validation::validate_address(&field("to"), &to_raw)?;

        let data_raw = optional_string(map, "data")?
            .ok_or_else(|| ValidationError::new(&field("data"), "is required"))?;
        let data_hex = data_raw
            .strip_prefix("0x")
            .or_else(|| data_raw.strip_prefix("0X"))
            .unwrap_or(&data_raw);
        let data = hex::decode(data_hex)
            .map(Bytes::from)
            .map_err(|e| ValidationError::new(&field("data"), format!("invalid hex data: {}", e)))?;

        let value = match optional_string(map, "value")? {
            None => U256::zero(),
            Some(raw) => parse_quantity(&raw).ok_or_else(|| {
                ValidationError::new(&field("value"), format!("invalid value: {}", raw))
            })?,
        };

        let gas_price = optional_string(map, "gasPrice")?
            .map(|raw| {
                parse_quantity(&raw).ok_or_else(|| {
                    ValidationError::new(&field("gasPrice"), format!("invalid gas price: {}", raw))
                })
            })
            .transpose()?;
        let gas_limit = optional_string(map, "gasLimit")?
            .map(|raw| {
                parse_quantity(&raw).ok_or_else(|| {
                    ValidationError::new(&field("gasLimit"), format!("invalid gas limit: {}", raw))
                })
            })
            .transpose()?;

        let chain_id = match map.get("chainId") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(n.as_u64().map(U256::from).ok_or_else(|| {
                ValidationError::new(&field("chainId"), format!("invalid chain ID: {}", n))
            })?),
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(parse_quantity(s).ok_or_else(|| {
                ValidationError::new(&field("chainId"), format!("invalid chain ID: {}", s))
            })?),
            Some(_) => {
                return Err(ValidationError::new(
                    &field("chainId"),
                    "must be a number or string",
                ))
            }
        };

        let from = optional_string(map, "from")?
            .map(|raw| super::validation::validate_address(&field("from"), &raw))
            .transpose()?;

        Ok(Self {
            to,
            data,
            value,
            gas_price,
            gas_limit,
            chain_id,
            from,
        })
    }
}

/// How the transaction is priced. Chosen per call from the latest block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeModel {
    Legacy { gas_price: U256 },
    Dynamic { max_fee: U256, priority_fee: U256 },
}

impl FeeModel {
    /// Highest price per gas unit this transaction may pay.
    pub fn max_price_per_gas(&self) -> U256 {
        match self {
            FeeModel::Legacy { gas_price } => *gas_price,
            FeeModel::Dynamic { max_fee, .. } => *max_fee,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeeModel::Legacy { .. } => "Legacy",
            FeeModel::Dynamic { .. } => "EIP-1559",
        }
    }
}

/// What the caller gets back after a successful broadcast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReport {
    pub transaction_hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub gas_limit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    pub transaction_type: String,
    pub nonce: String,
    pub chain_id: String,
}

/// ERC-20 metadata resolved on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMeta {
    pub symbol: String,
    pub decimals: u32,
}

impl TokenMeta {
    pub fn unknown() -> Self {
        Self {
            symbol: "Unknown".to_string(),
            decimals: 18,
        }
    }

    pub fn native_fallback() -> Self {
        Self {
            symbol: "Native Token".to_string(),
            decimals: 18,
        }
    }
}
