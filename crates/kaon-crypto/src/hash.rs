// kaon-crypto/src/hash.rs

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// 32-byte digest of SHA256 or Keccak256
pub type Digest32 = [u8; 32];

pub fn sha256(data: &[u8]) -> Digest32 {
    Sha256::digest(data).into()
}

/// SHA256 applied twice, as used by base58check and message signing
pub fn double_sha256(data: &[u8]) -> Digest32 {
    sha256(&sha256(data))
}

/// RIPEMD160(SHA256(data)), the 20-byte key id of a public key
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

/// Ethereum flavoured Keccak256 (not SHA3-256)
pub fn keccak256(data: &[u8]) -> Digest32 {
    Keccak256::digest(data).into()
}

/// First 4 bytes of the double SHA256 of `data`
pub fn checksum(data: &[u8]) -> [u8; 4] {
    let hash = double_sha256(data);
    [hash[0], hash[1], hash[2], hash[3]]
}
