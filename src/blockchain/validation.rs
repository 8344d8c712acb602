//! Argument validation shared by every tool handler.
//!
//! Each validator parses as it checks, so callers get the typed value back
//! instead of re-parsing a string that was already accepted.

use ethers::types::{Address, U256};
use thiserror::Error;

/// The all-zero address. Valid as a token address (native asset), never as a
/// recipient of value.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Upper bound on the number of characters in an amount literal.
/// `U256::MAX` has 78 decimal digits.
pub const MAX_AMOUNT_DIGITS: usize = 78;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn required(field: &str) -> Self {
        Self::new(field, "is required")
    }
}

fn parse_hex_address(address: &str) -> Option<Address> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let bytes = hex::decode(hex_part).ok()?;
    Some(Address::from_slice(&bytes))
}

/// Accepts any 20-byte hex address, with or without `0x`, in any case.
pub fn validate_address(field: &str, address: &str) -> Result<Address, ValidationError> {
    if address.is_empty() {
        return Err(ValidationError::new(field, "address is required"));
    }
    parse_hex_address(address)
        .ok_or_else(|| ValidationError::new(field, format!("invalid address format: {}", address)))
}

/// Same as [`validate_address`] but refuses the zero address.
pub fn validate_recipient_address(field: &str, address: &str) -> Result<Address, ValidationError> {
    let parsed = validate_address(field, address)?;
    if parsed.is_zero() {
        return Err(ValidationError::new(
            field,
            "cannot send to zero address (burn address) - this would permanently destroy funds",
        ));
    }
    Ok(parsed)
}

/// Token addresses may be the zero address, which denotes the native asset.
pub fn validate_token_address(field: &str, address: &str) -> Result<Address, ValidationError> {
    if address.is_empty() {
        return Err(ValidationError::new(field, "token address is required"));
    }
    parse_hex_address(address).ok_or_else(|| {
        ValidationError::new(field, format!("invalid token address format: {}", address))
    })
}

pub fn validate_chain_id(field: &str, chain_id: &str) -> Result<u64, ValidationError> {
    if chain_id.is_empty() {
        return Err(ValidationError::new(field, "chain ID is required"));
    }
    let id: i64 = chain_id.parse().map_err(|_| {
        ValidationError::new(
            field,
            format!("invalid chain ID format (must be numeric): {}", chain_id),
        )
    })?;
    if id <= 0 {
        return Err(ValidationError::new(field, "chain ID must be a positive integer"));
    }
    Ok(id as u64)
}

/// Chain arguments accepted by the upstream API may be a numeric id or a
/// chain key such as `eth`. Only the numeric form is range-checked.
pub fn validate_chain_ref(field: &str, chain: &str) -> Result<(), ValidationError> {
    if chain.is_empty() {
        return Err(ValidationError::new(field, "chain is required"));
    }
    let numeric = chain.trim_start_matches('-');
    if !numeric.is_empty() && numeric.chars().all(|c| c.is_ascii_digit()) {
        validate_chain_id(field, chain)?;
    }
    Ok(())
}

fn parse_amount(field: &str, amount: &str) -> Result<U256, ValidationError> {
    if amount.is_empty() {
        return Err(ValidationError::new(field, "amount is required"));
    }
    if amount.len() > MAX_AMOUNT_DIGITS {
        return Err(ValidationError::new(field, "amount exceeds maximum allowed digits"));
    }
    if let Some(magnitude) = amount.strip_prefix('-') {
        if !magnitude.is_empty() && magnitude.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::new(field, "amount cannot be negative"));
        }
    }
    if !amount.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new(field, format!("invalid amount format: {}", amount)));
    }
    // All digits and at most 78 of them, so the only failure left is overflow.
    U256::from_dec_str(amount)
        .map_err(|_| ValidationError::new(field, "amount exceeds uint256 maximum"))
}

/// Token arguments forwarded upstream may be a contract address or a symbol
/// such as `USDC`. Anything that looks like hex must be a full address.
pub fn validate_token_ref(field: &str, token: &str) -> Result<(), ValidationError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ValidationError::new(field, "token is required"));
    }
    if token.starts_with("0x") || token.starts_with("0X") {
        validate_token_address(field, token)?;
    } else if !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_') {
        return Err(ValidationError::new(field, format!("invalid token: {}", token)));
    }
    Ok(())
}

/// A strictly positive base-10 integer of at most [`MAX_AMOUNT_DIGITS`] characters.
pub fn validate_amount(field: &str, amount: &str) -> Result<U256, ValidationError> {
    let value = parse_amount(field, amount)?;
    if value.is_zero() {
        return Err(ValidationError::new(field, "amount cannot be zero"));
    }
    Ok(value)
}

/// Like [`validate_amount`], but zero is accepted (allowance resets and checks).
pub fn validate_amount_allow_zero(field: &str, amount: &str) -> Result<U256, ValidationError> {
    parse_amount(field, amount)
}

/// Slippage is optional; when present it is a decimal fraction in `[0, 1]`.
pub fn validate_slippage(slippage: &str) -> Result<Option<f64>, ValidationError> {
    if slippage.is_empty() {
        return Ok(None);
    }
    let value: f64 = slippage.parse().map_err(|_| {
        ValidationError::new("slippage", format!("invalid slippage format: {}", slippage))
    })?;
    if value.is_nan() {
        return Err(ValidationError::new(
            "slippage",
            format!("invalid slippage format: {}", slippage),
        ));
    }
    if value < 0.0 {
        return Err(ValidationError::new("slippage", "slippage cannot be negative"));
    }
    if value > 1.0 {
        return Err(ValidationError::new("slippage", "slippage cannot exceed 1 (100%)"));
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VITALIK: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

    #[test]
    fn address_accepts_any_case_and_optional_prefix() {
        assert!(validate_address("a", VITALIK).is_ok());
        assert!(validate_address("a", &VITALIK.to_lowercase()).is_ok());
        assert!(validate_address("a", &VITALIK[2..]).is_ok());
        assert!(validate_address("a", "0XD8DA6BF26964AF9D7EED9E03E53415D37AA96045").is_ok());
    }

    #[test]
    fn address_rejects_malformed_input() {
        let err = validate_address("owner", "").unwrap_err();
        assert_eq!(err.to_string(), "owner: address is required");
        assert!(validate_address("a", "0x1234").is_err());
        assert!(validate_address("a", "0xzz8dA6BF26964aF9D7eEd9e03E53415D37aA9604").is_err());
        assert!(validate_address("a", &format!("{}00", VITALIK)).is_err());
    }

    #[test]
    fn recipient_rejects_zero_address_only() {
        assert!(validate_address("to", ZERO_ADDRESS).is_ok());
        let err = validate_recipient_address("to", ZERO_ADDRESS).unwrap_err();
        assert!(err.message.contains("burn address"));
        assert!(validate_recipient_address("to", &ZERO_ADDRESS.to_uppercase().replace("0X", "0x")).is_err());
        assert_eq!(
            validate_recipient_address("to", VITALIK).unwrap(),
            VITALIK.parse::<Address>().unwrap()
        );
    }

    #[test]
    fn token_address_allows_zero() {
        assert!(validate_token_address("token", ZERO_ADDRESS).unwrap().is_zero());
        assert_eq!(
            validate_token_address("token", "").unwrap_err().message,
            "token address is required"
        );
    }

    #[test]
    fn chain_id_must_be_positive_integer() {
        assert_eq!(validate_chain_id("chain", "137").unwrap(), 137);
        assert!(validate_chain_id("chain", "0").is_err());
        assert!(validate_chain_id("chain", "-1").is_err());
        assert!(validate_chain_id("chain", "eth").is_err());
        assert!(validate_chain_ref("chain", "eth").is_ok());
        assert!(validate_chain_ref("chain", "0").is_err());
        assert!(validate_chain_ref("chain", "").is_err());
    }

    #[test]
    fn amount_rules() {
        assert_eq!(validate_amount("amount", "1000").unwrap(), U256::from(1000u64));
        assert_eq!(validate_amount("amount", "0").unwrap_err().message, "amount cannot be zero");
        assert_eq!(validate_amount("amount", "000").unwrap_err().message, "amount cannot be zero");
        assert_eq!(validate_amount("amount", "-5").unwrap_err().message, "amount cannot be negative");
        assert!(validate_amount("amount", "1.5").is_err());
        assert!(validate_amount("amount", "1e18").is_err());
        assert!(validate_amount("amount", "").is_err());

        let too_long = "1".repeat(MAX_AMOUNT_DIGITS + 1);
        assert_eq!(
            validate_amount("amount", &too_long).unwrap_err().message,
            "amount exceeds maximum allowed digits"
        );
        let max = U256::MAX.to_string();
        assert_eq!(max.len(), MAX_AMOUNT_DIGITS);
        assert_eq!(validate_amount("amount", &max).unwrap(), U256::MAX);
    }

    #[test]
    fn amount_above_uint256_names_the_limit() {
        let nines = "9".repeat(MAX_AMOUNT_DIGITS);
        let err = validate_amount("fromAmount", &nines).unwrap_err();
        assert_eq!(err.to_string(), "fromAmount: amount exceeds uint256 maximum");
        assert_eq!(
            validate_amount_allow_zero("amount", &nines).unwrap_err().message,
            "amount exceeds uint256 maximum"
        );
    }

    #[test]
    fn allow_zero_only_relaxes_zero() {
        assert!(validate_amount_allow_zero("amount", "0").unwrap().is_zero());
        assert!(validate_amount_allow_zero("amount", "-1").is_err());
        assert!(validate_amount_allow_zero("amount", "abc").is_err());
    }

    #[test]
    fn slippage_range() {
        assert_eq!(validate_slippage("").unwrap(), None);
        assert_eq!(validate_slippage("0.005").unwrap(), Some(0.005));
        assert!(validate_slippage("1").is_ok());
        assert!(validate_slippage("1.01").is_err());
        assert!(validate_slippage("-0.1").is_err());
        assert!(validate_slippage("lots").is_err());
    }

    #[test]
    fn token_refs_accept_symbols_and_addresses() {
        assert!(validate_token_ref("fromToken", "USDC").is_ok());
        assert!(validate_token_ref("fromToken", ZERO_ADDRESS).is_ok());
        assert!(validate_token_ref("fromToken", VITALIK).is_ok());
        assert!(validate_token_ref("fromToken", "0x1234").is_err());
        assert!(validate_token_ref("fromToken", "").is_err());
        assert!(validate_token_ref("fromToken", "US DC").is_err());
    }
}
