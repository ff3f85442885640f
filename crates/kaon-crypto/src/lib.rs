// kaon-crypto/src/lib.rs

//! Cryptographic primitives for the Kaon gateway
//!
//! This crate provides:
//! - Hashing functions (SHA256, double SHA256, HASH160, Keccak256)
//! - Base58check address encoding with Kaon chain prefixes
//! - WIF account decoding and compact message signing

pub mod hash;
pub mod address;
pub mod account;

pub use hash::{double_sha256, hash160, keccak256, sha256, Digest32};
pub use address::{Address, AddressPrefix, decode_base58_address, encode_base58_address};
pub use account::{Account, Accounts};

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid address: length is less than 22 bytes - {0}")]
    AddressTooShort(usize),

    #[error("invalid address")]
    InvalidAddress,

    #[error("invalid hex address: {0}")]
    InvalidHexAddress(String),

    #[error("Invalid secret key")]
    InvalidSecretKey,

    #[error("invalid WIF: {0}")]
    InvalidWif(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_basics() {
        let address = Address::from_hex("1ce507204a6fc8fd6aa7e54d1481d30acb0dbead").unwrap();
        let encoded = address.to_base58(AddressPrefix::Test);
        assert_eq!(encoded, "ar2SzdHghSgeacypPn7zfDe3qfKAEwimus");
        assert_eq!(Address::from_base58(&encoded).unwrap(), address);
    }
}
