// src/blockchain/mod.rs

pub mod client;
pub use client::{ChainRpc, RpcConnector, RpcError, RpcPool};

pub mod models;
pub mod nonce_manager;
pub mod services;
pub mod validation;
pub mod wallet_manager;

pub use ethers::{
    types::{Address, H256, U256},
    utils::to_checksum,
};
