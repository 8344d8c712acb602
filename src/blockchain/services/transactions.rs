// src/blockchain/services/transactions.rs
//
// Validate -> ResolveNetwork -> PriceGas -> EstimateOrAcceptGasLimit ->
// SimulateCall -> Sign -> Broadcast. Any failure before Broadcast leaves the
// chain untouched.

use std::sync::Arc;

use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, Eip1559TransactionRequest,
    TransactionRequest, U256,
};
use ethers::utils::to_checksum;
use thiserror::Error;
use tracing::{info, warn};

use super::token;
use crate::blockchain::client::{ChainRpc, RpcError};
use crate::blockchain::models::{FeeModel, TokenMeta, TransactionDescriptor, TransactionReport};
use crate::blockchain::nonce_manager::NonceManager;
use crate::blockchain::validation::ValidationError;
use crate::blockchain::wallet_manager::TransactionSigner;

/// Gas used by a plain value transfer.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no private key loaded. Please start the server with a keystore")]
    NoKey,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("transaction 'from' address ({given}) doesn't match wallet address ({wallet})")]
    SenderMismatch { given: String, wallet: String },
    #[error("failed to get chain ID: {0}")]
    ChainId(RpcError),
    #[error("chain ID in transaction ({requested}) doesn't match network chain ID ({network})")]
    ChainMismatch { requested: U256, network: U256 },
    #[error("failed to suggest gas price: {0}")]
    GasPrice(RpcError),
    #[error("failed to estimate gas: {0}")]
    Estimate(RpcError),
    #[error("{action} would fail: {error}. Revert reason: {reason}")]
    Simulation {
        action: &'static str,
        error: String,
        reason: String,
    },
    #[error("insufficient token balance: have {have}, need {need}")]
    InsufficientTokenBalance { have: U256, need: U256 },
    #[error("insufficient balance: have {have}, need {need} (including {gas_note})")]
    InsufficientBalance {
        have: U256,
        need: U256,
        gas_note: &'static str,
    },
    #[error("failed to get balance: {0}")]
    Balance(RpcError),
    #[error("failed to get nonce: {0}")]
    Nonce(RpcError),
    #[error("failed to sign transaction: {0}")]
    Signing(String),
    #[error("failed to send transaction: {0}")]
    Broadcast(RpcError),
    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

/// Pulls the human-readable reason out of a node's revert error text.
pub fn revert_reason(error_text: &str) -> String {
    error_text
        .split_once("execution reverted:")
        .map(|(_, rest)| rest.split(", data:").next().unwrap_or(rest))
        .map(|r| r.trim().trim_end_matches(')').trim())
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "Unknown reason".to_string())
}

/// Extra check run once gas limit and price are known.
enum Preflight {
    None,
    NativeBalance { amount: U256 },
}

struct Plan {
    action: &'static str,
    gas_limit: Option<U256>,
    preflight: Preflight,
}

/// Outcome of a token-specific flow.
#[derive(Debug, Clone)]
pub struct TokenReceipt {
    pub report: TransactionReport,
    pub token: TokenMeta,
}

pub struct TransactionEngine {
    signer: Arc<dyn TransactionSigner>,
    nonces: NonceManager,
}

impl TransactionEngine {
    pub fn new(signer: Arc<dyn TransactionSigner>, nonces: NonceManager) -> Self {
        Self { signer, nonces }
    }

    /// Builds an engine from an optional key, failing with [`EngineError::NoKey`].
    pub fn from_optional(
        signer: Option<Arc<dyn TransactionSigner>>,
        nonces: NonceManager,
    ) -> Result<Self, EngineError> {
        signer.map(|s| Self::new(s, nonces)).ok_or(EngineError::NoKey)
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Executes an arbitrary caller-supplied transaction.
    pub async fn execute(
        &self,
        rpc: &dyn ChainRpc,
        descriptor: TransactionDescriptor,
    ) -> Result<TransactionReport, EngineError> {
        let plan = Plan {
            action: "transaction",
            gas_limit: descriptor.gas_limit,
            preflight: Preflight::None,
        };
        self.run(rpc, descriptor, plan).await
    }

    /// `approve(spender, amount)` on `token`.
    pub async fn approve(
        &self,
        rpc: &dyn ChainRpc,
        token_address: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TokenReceipt, EngineError> {
        let meta = token::token_meta_or_unknown(rpc, token_address).await;
        let descriptor =
            TransactionDescriptor::call(token_address, token::approve_data(spender, amount));
        let plan = Plan {
            action: "approval",
            gas_limit: None,
            preflight: Preflight::None,
        };
        let report = self.run(rpc, descriptor, plan).await?;
        Ok(TokenReceipt { report, token: meta })
    }

    /// `transfer(to, amount)` on `token`, refusing early when the wallet
    /// balance is short.
    pub async fn transfer_token(
        &self,
        rpc: &dyn ChainRpc,
        token_address: Address,
        to: Address,
        amount: U256,
    ) -> Result<TokenReceipt, EngineError> {
        let meta = token::token_meta_or_unknown(rpc, token_address).await;
        let have = token::balance_of(rpc, token_address, self.address())
            .await
            .map_err(EngineError::Balance)?;
        if have < amount {
            return Err(EngineError::InsufficientTokenBalance { have, need: amount });
        }

        let descriptor = TransactionDescriptor::call(token_address, token::transfer_data(to, amount));
        let plan = Plan {
            action: "transfer",
            gas_limit: None,
            preflight: Preflight::None,
        };
        let report = self.run(rpc, descriptor, plan).await?;
        Ok(TokenReceipt { report, token: meta })
    }

    /// Plain value transfer with a fixed gas limit.
    pub async fn transfer_native(
        &self,
        rpc: &dyn ChainRpc,
        to: Address,
        amount: U256,
    ) -> Result<TransactionReport, EngineError> {
        let mut descriptor = TransactionDescriptor::call(to, Bytes::new());
        descriptor.value = amount;
        let plan = Plan {
            action: "transfer",
            gas_limit: Some(U256::from(NATIVE_TRANSFER_GAS)),
            preflight: Preflight::NativeBalance { amount },
        };
        self.run(rpc, descriptor, plan).await
    }

    /// A transaction naming a sender must name this wallet.
    pub fn check_sender(&self, from: Option<Address>) -> Result<(), EngineError> {
        let wallet = self.signer.address();
        match from {
            Some(from) if from != wallet => Err(EngineError::SenderMismatch {
                given: to_checksum(&from, None),
                wallet: to_checksum(&wallet, None),
            }),
            _ => Ok(()),
        }
    }

    async fn run(
        &self,
        rpc: &dyn ChainRpc,
        descriptor: TransactionDescriptor,
        plan: Plan,
    ) -> Result<TransactionReport, EngineError> {
        let wallet = self.signer.address();

        // Validate
        self.check_sender(descriptor.from)?;

        // ResolveNetwork
        let network = rpc.chain_id().await.map_err(EngineError::ChainId)?;
        if let Some(requested) = descriptor.chain_id {
            if requested != network {
                return Err(EngineError::ChainMismatch { requested, network });
            }
        }
        if network > U256::from(u64::MAX) {
            return Err(EngineError::ChainId(RpcError::Call(format!(
                "chain ID out of range: {}",
                network
            ))));
        }
        let chain_id = network.low_u64();

        // PriceGas
        let fee = price_gas(rpc, descriptor.gas_price).await?;
        let mut tx = build_transaction(wallet, &descriptor, chain_id, fee);

        // EstimateOrAcceptGasLimit
        let gas_limit = match plan.gas_limit {
            Some(limit) => limit,
            None => {
                let estimate = rpc.estimate_gas(&tx).await.map_err(EngineError::Estimate)?;
                estimate
                    .checked_mul(U256::from(12u64))
                    .map(|scaled| scaled / 10)
                    .ok_or(EngineError::Overflow("gas limit"))?
            }
        };
        tx.set_gas(gas_limit);

        if let Preflight::NativeBalance { amount } = plan.preflight {
            let have = rpc.balance(wallet).await.map_err(EngineError::Balance)?;
            let need = gas_limit
                .checked_mul(fee.max_price_per_gas())
                .and_then(|gas| gas.checked_add(amount))
                .ok_or(EngineError::Overflow("required balance"))?;
            if have < need {
                let gas_note = match fee {
                    FeeModel::Legacy { .. } => "gas cost",
                    FeeModel::Dynamic { .. } => "max gas cost",
                };
                return Err(EngineError::InsufficientBalance { have, need, gas_note });
            }
        }

        // SimulateCall
        if let Err(err) = rpc.call(&tx).await {
            let error = err.to_string();
            let reason = revert_reason(&error);
            warn!(action = plan.action, chain_id, %reason, "simulation reverted");
            return Err(EngineError::Simulation {
                action: plan.action,
                error,
                reason,
            });
        }

        // Sign and Broadcast, one submission per sender and chain at a time.
        let _lane = self.nonces.lock(chain_id, wallet).await;
        let nonce = rpc.pending_nonce(wallet).await.map_err(EngineError::Nonce)?;
        tx.set_nonce(nonce);
        let signature = self
            .signer
            .sign_transaction(&tx)
            .map_err(EngineError::Signing)?;
        let raw = tx.rlp_signed(&signature);
        let hash = rpc
            .send_raw_transaction(raw)
            .await
            .map_err(EngineError::Broadcast)?;

        info!(
            action = plan.action,
            chain_id,
            tx_hash = ?hash,
            fee_model = fee.label(),
            "transaction broadcast"
        );

        let (gas_price, max_fee_per_gas, max_priority_fee_per_gas) = match fee {
            FeeModel::Legacy { gas_price } => (Some(gas_price.to_string()), None, None),
            FeeModel::Dynamic {
                max_fee,
                priority_fee,
            } => (None, Some(max_fee.to_string()), Some(priority_fee.to_string())),
        };
        Ok(TransactionReport {
            transaction_hash: format!("{:?}", hash),
            from: to_checksum(&wallet, None),
            to: to_checksum(&descriptor.to, None),
            value: descriptor.value.to_string(),
            gas_limit: gas_limit.to_string(),
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            transaction_type: fee.label().to_string(),
            nonce: nonce.to_string(),
            chain_id: chain_id.to_string(),
        })
    }
}

/// An explicit gas price forces a legacy transaction; otherwise the latest
/// block decides between legacy and EIP-1559 pricing.
async fn price_gas(rpc: &dyn ChainRpc, explicit: Option<U256>) -> Result<FeeModel, EngineError> {
    if let Some(gas_price) = explicit {
        return Ok(FeeModel::Legacy { gas_price });
    }
    match rpc.latest_base_fee().await.map_err(EngineError::GasPrice)? {
        Some(base_fee) => {
            let priority_fee = rpc.max_priority_fee().await.map_err(EngineError::GasPrice)?;
            let max_fee = base_fee
                .checked_mul(U256::from(2u64))
                .and_then(|doubled| doubled.checked_add(priority_fee))
                .ok_or(EngineError::Overflow("max fee per gas"))?;
            Ok(FeeModel::Dynamic {
                max_fee,
                priority_fee,
            })
        }
        None => {
            let gas_price = rpc.gas_price().await.map_err(EngineError::GasPrice)?;
            Ok(FeeModel::Legacy { gas_price })
        }
    }
}

fn build_transaction(
    from: Address,
    descriptor: &TransactionDescriptor,
    chain_id: u64,
    fee: FeeModel,
) -> TypedTransaction {
    match fee {
        FeeModel::Legacy { gas_price } => TransactionRequest::new()
            .from(from)
            .to(descriptor.to)
            .value(descriptor.value)
            .data(descriptor.data.clone())
            .gas_price(gas_price)
            .chain_id(chain_id)
            .into(),
        FeeModel::Dynamic {
            max_fee,
            priority_fee,
        } => Eip1559TransactionRequest::new()
            .from(from)
            .to(descriptor.to)
            .value(descriptor.value)
            .data(descriptor.data.clone())
            .max_fee_per_gas(max_fee)
            .max_priority_fee_per_gas(priority_fee)
            .chain_id(chain_id)
            .into(),
    }
}
