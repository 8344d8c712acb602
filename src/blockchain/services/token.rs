// src/blockchain/services/token.rs

use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, U256,
};
use ethers::utils::keccak256;

use crate::blockchain::client::{ChainRpc, RpcError};
use crate::blockchain::models::TokenMeta;

pub fn selector(sig: &str) -> [u8; 4] {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&keccak256(sig.as_bytes())[0..4]);
    sel
}

pub fn encode_call(sig: &str, tokens: &[Token]) -> Bytes {
    let mut out = selector(sig).to_vec();
    out.extend_from_slice(&encode(tokens));
    Bytes::from(out)
}

/// ABI `string`, falling back to a NUL-padded `bytes32` (older tokens).
pub fn decode_string(raw: &[u8]) -> Option<String> {
    if let Ok(tokens) = decode(&[ParamType::String], raw) {
        if let Some(Token::String(s)) = tokens.into_iter().next() {
            return Some(s);
        }
    }
    if let Ok(tokens) = decode(&[ParamType::FixedBytes(32)], raw) {
        if let Some(Token::FixedBytes(b)) = tokens.into_iter().next() {
            let trimmed: Vec<u8> = b.into_iter().take_while(|c| *c != 0).collect();
            return String::from_utf8(trimmed).ok().filter(|s| !s.is_empty());
        }
    }
    None
}

pub fn decode_u256(raw: &[u8]) -> Option<U256> {
    match decode(&[ParamType::Uint(256)], raw).ok()?.into_iter().next()? {
        Token::Uint(n) => Some(n),
        _ => None,
    }
}

pub fn balance_of_data(owner: Address) -> Bytes {
    encode_call("balanceOf(address)", &[Token::Address(owner)])
}

pub fn allowance_data(owner: Address, spender: Address) -> Bytes {
    encode_call(
        "allowance(address,address)",
        &[Token::Address(owner), Token::Address(spender)],
    )
}

pub fn approve_data(spender: Address, amount: U256) -> Bytes {
    encode_call(
        "approve(address,uint256)",
        &[Token::Address(spender), Token::Uint(amount)],
    )
}

pub fn transfer_data(to: Address, amount: U256) -> Bytes {
    encode_call(
        "transfer(address,uint256)",
        &[Token::Address(to), Token::Uint(amount)],
    )
}

fn view_call(token: Address, data: Bytes) -> TypedTransaction {
    TransactionRequest::new().to(token).data(data).into()
}

async fn call_u256(rpc: &dyn ChainRpc, token: Address, data: Bytes, what: &str) -> Result<U256, RpcError> {
    let raw = rpc.call(&view_call(token, data)).await?;
    decode_u256(&raw).ok_or_else(|| RpcError::Call(format!("failed to decode {} result", what)))
}

pub async fn balance_of(rpc: &dyn ChainRpc, token: Address, owner: Address) -> Result<U256, RpcError> {
    call_u256(rpc, token, balance_of_data(owner), "balanceOf").await
}

pub async fn allowance(
    rpc: &dyn ChainRpc,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256, RpcError> {
    call_u256(rpc, token, allowance_data(owner, spender), "allowance").await
}

/// Symbol and decimals via `symbol()` and `decimals()`.
pub async fn token_meta(rpc: &dyn ChainRpc, token: Address) -> Result<TokenMeta, RpcError> {
    let raw_symbol = rpc
        .call(&view_call(token, encode_call("symbol()", &[])))
        .await?;
    let symbol = decode_string(&raw_symbol)
        .ok_or_else(|| RpcError::Call("failed to decode symbol".into()))?;
    let decimals = call_u256(rpc, token, encode_call("decimals()", &[]), "decimals").await?;
    if decimals > U256::from(u8::MAX) {
        return Err(RpcError::Call(format!("decimals out of range: {}", decimals)));
    }
    Ok(TokenMeta {
        symbol,
        decimals: decimals.as_u32(),
    })
}

/// [`token_meta`] with the `Unknown`/18 fallback used in responses.
pub async fn token_meta_or_unknown(rpc: &dyn ChainRpc, token: Address) -> TokenMeta {
    token_meta(rpc, token).await.unwrap_or_else(|_| TokenMeta::unknown())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_selectors() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("approve(address,uint256)")), "095ea7b3");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector("allowance(address,address)")), "dd62ed3e");
    }

    #[test]
    fn transfer_calldata_layout() {
        let to = Address::repeat_byte(0xaa);
        let data = transfer_data(to, U256::from(1000));
        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[16..36], to.as_bytes());
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(1000));
    }

    #[test]
    fn string_and_bytes32_symbols_decode() {
        let abi_string = encode(&[Token::String("USDC".into())]);
        assert_eq!(decode_string(&abi_string).as_deref(), Some("USDC"));

        let mut fixed = [0u8; 32];
        fixed[..3].copy_from_slice(b"MKR");
        let bytes32 = encode(&[Token::FixedBytes(fixed.to_vec())]);
        assert_eq!(decode_string(&bytes32).as_deref(), Some("MKR"));
    }

    #[test]
    fn u256_decoding() {
        let raw = encode(&[Token::Uint(U256::from(500))]);
        assert_eq!(decode_u256(&raw), Some(U256::from(500)));
        assert_eq!(decode_u256(&[]), None);
    }
}
