// kaon-crypto/src/address.rs

use crate::hash::checksum;
use crate::{CryptoError, CryptoResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum textual length of a base58 Kaon address
const MIN_BASE58_LEN: usize = 22;

/// Version byte + 20 byte key id + 4 byte checksum
const DECODED_LEN: usize = 25;

/// Version byte placed in front of the key id when encoding a base58 address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPrefix {
    Main,
    Test,
}

impl AddressPrefix {
    pub fn byte(self) -> u8 {
        match self {
            AddressPrefix::Main => 0x4d,
            AddressPrefix::Test => 0x54,
        }
    }
}

/// 20-byte account address shared by the EVM and the UTXO layer
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct Address([u8; 20]);

impl Address {
    /// Create address from bytes
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex without `0x`, the form the Kaon node expects
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)
            .map_err(|_| CryptoError::InvalidHexAddress(s.to_string()))?;
        if bytes.len() != 20 {
            return Err(CryptoError::InvalidHexAddress(s.to_string()));
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Parse a base58check address, ignoring its version byte.
    ///
    /// Only plain key-hash addresses decode here; bech32 and script-hash
    /// forms fail and callers must fall back to the node's own conversion.
    pub fn from_base58(address: &str) -> CryptoResult<Self> {
        let (_, key_id) = decode_base58_address(address)?;
        Ok(Self(key_id))
    }

    pub fn to_base58(&self, prefix: AddressPrefix) -> String {
        encode_base58_address(prefix.byte(), &self.0)
    }

    pub fn zero() -> Self {
        Self([0u8; 20])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Encode `version || payload || checksum` as base58
pub fn encode_base58_address(version: u8, payload: &[u8; 20]) -> String {
    let mut bytes = Vec::with_capacity(DECODED_LEN);
    bytes.push(version);
    bytes.extend_from_slice(payload);
    let check = checksum(&bytes);
    bytes.extend_from_slice(&check);
    bs58::encode(bytes).into_string()
}

/// Decode a base58check address into its version byte and key id
pub fn decode_base58_address(address: &str) -> CryptoResult<(u8, [u8; 20])> {
    if address.len() < MIN_BASE58_LEN {
        return Err(CryptoError::AddressTooShort(address.len()));
    }

    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|_| CryptoError::InvalidAddress)?;
    if bytes.len() != DECODED_LEN {
        return Err(CryptoError::InvalidAddress);
    }

    let (body, check) = bytes.split_at(DECODED_LEN - 4);
    if checksum(body) != check {
        return Err(CryptoError::InvalidAddress);
    }

    let mut key_id = [0u8; 20];
    key_id.copy_from_slice(&body[1..]);
    Ok((body[0], key_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_testnet_vector() {
        let address = Address::from_hex("0x1CE507204a6fC8fd6aA7e54D1481d30ACB0Dbead").unwrap();
        assert_eq!(address.to_base58(AddressPrefix::Test), "ar2SzdHghSgeacypPn7zfDe3qfKAEwimus");
    }

    #[test]
    fn test_decode_foreign_prefix() {
        let address = Address::from_base58("QYmyzKNjoox5LkaiUvibZdM252bftQotDx").unwrap();
        assert_eq!(address.to_hex(), "8585918c3ee7168ee9d79dd9b5883eb65d0e0db0");
    }

    #[test]
    fn test_short_address() {
        let err = Address::from_base58("qc1qkt33x6h").unwrap_err();
        assert!(matches!(err, CryptoError::AddressTooShort(11)));
        assert!(err.to_string().starts_with("invalid address"));
    }

    #[test]
    fn test_bad_checksum() {
        let err = Address::from_base58("ar2SzdHghSgeacypPn7zfDe3qfKAEwimut").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidAddress));
    }

    #[test]
    fn test_bech32_rejected() {
        assert!(Address::from_base58("qc1qkt33x6hkrrlwlr6v59wptwy6zskyrjfe40y0lx").is_err());
    }

    proptest! {
        #[test]
        fn prop_base58_roundtrip(bytes in any::<[u8; 20]>(), main in any::<bool>()) {
            let prefix = if main { AddressPrefix::Main } else { AddressPrefix::Test };
            let address = Address::new(bytes);
            let encoded = address.to_base58(prefix);
            let (version, decoded) = decode_base58_address(&encoded).unwrap();
            prop_assert_eq!(version, prefix.byte());
            prop_assert_eq!(decoded, bytes);
        }
    }
}
