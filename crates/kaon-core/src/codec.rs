// kaon-core/src/codec.rs

use crate::{CoreError, CoreResult};
use num_bigint::BigUint;
use num_traits::{Num, Zero};

/// Width of a hex-encoded 256-bit word
pub const WORD_HEX_LEN: usize = 64;

pub fn remove_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

pub fn add_hex_prefix(s: &str) -> String {
    if s.starts_with("0x") {
        s.to_string()
    } else {
        format!("0x{}", s)
    }
}

pub fn add_hex_prefix_if_not_empty(s: &str) -> String {
    if s.is_empty() {
        String::new()
    } else {
        add_hex_prefix(s)
    }
}

/// Left-pad to a full 32-byte word and prefix with `0x`
pub fn add_hex_with_length_prefix(s: &str) -> String {
    let s = remove_hex_prefix(s);
    format!("0x{:0>width$}", s, width = WORD_HEX_LEN)
}

/// Decode a hex quantity with or without `0x`.
pub fn decode_big(input: &str) -> CoreResult<BigUint> {
    let digits = remove_hex_prefix(input);
    if digits.is_empty() {
        return Err(CoreError::InvalidHex(input.to_string()));
    }
    BigUint::from_str_radix(digits, 16).map_err(|_| CoreError::InvalidHex(input.to_string()))
}

pub fn decode_u64(input: &str) -> CoreResult<u64> {
    let digits = remove_hex_prefix(input);
    if digits.is_empty() {
        return Err(CoreError::InvalidHex(input.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| CoreError::InvalidHex(input.to_string()))
}

/// Ethereum quantity encoding: `0x` + lowercase hex without leading zeros
pub fn encode_big(value: &BigUint) -> String {
    if value.is_zero() {
        return "0x0".to_string();
    }
    format!("0x{}", value.to_str_radix(16))
}

pub fn encode_u64(value: u64) -> String {
    format!("{:#x}", value)
}

/// True for `0x`-prefixed strings and bare 40-char hex addresses
pub fn is_eth_hex_address(s: &str) -> bool {
    if s.starts_with("0x") {
        return true;
    }
    s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// `0x` followed by `n` zeros
pub fn zero_hex(n: usize) -> String {
    format!("0x{}", "0".repeat(n))
}
