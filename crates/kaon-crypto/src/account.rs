// kaon-crypto/src/account.rs

use crate::address::Address;
use crate::hash::{checksum, double_sha256, hash160};
use crate::{CryptoError, CryptoResult};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::fmt;

/// Prefix mixed into every signed message, length byte included
pub const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x15Kaon Signed Message:\n";

/// A wallet key loaded from WIF
#[derive(Clone)]
pub struct Account {
    secret_key: SecretKey,
    compressed: bool,
}

impl Account {
    /// Decode a WIF private key. The version byte is not checked.
    pub fn from_wif(wif: &str) -> CryptoResult<Self> {
        let bytes = bs58::decode(wif.trim())
            .into_vec()
            .map_err(|e| CryptoError::InvalidWif(e.to_string()))?;

        let compressed = match bytes.len() {
            37 => false,
            38 if bytes[33] == 0x01 => true,
            n => return Err(CryptoError::InvalidWif(format!("unexpected length {}", n))),
        };

        let (body, check) = bytes.split_at(bytes.len() - 4);
        if checksum(body) != check {
            return Err(CryptoError::InvalidWif("checksum mismatch".into()));
        }

        let secret_key = SecretKey::from_slice(&body[1..33])
            .map_err(|_| CryptoError::InvalidSecretKey)?;

        Ok(Self { secret_key, compressed })
    }

    /// Serialized public key, compressed or not as the WIF requested
    pub fn public_key_bytes(&self) -> Vec<u8> {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &self.secret_key);
        if self.compressed {
            public_key.serialize().to_vec()
        } else {
            public_key.serialize_uncompressed().to_vec()
        }
    }

    /// HASH160 of the public key
    pub fn address(&self) -> Address {
        Address::new(hash160(&self.public_key_bytes()))
    }

    /// Produce a 65-byte compact recoverable signature over the Kaon
    /// signed-message envelope of `message`.
    pub fn sign_message(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        let digest = double_sha256(&signed_message_envelope(message));
        let msg = Message::from_digest_slice(&digest)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

        let secp = Secp256k1::signing_only();
        let signature = secp.sign_ecdsa_recoverable(&msg, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        // 27 + recovery id, plus 4 when the key is compressed
        let mut header = 27 + recovery_id.to_i32() as u8;
        if self.compressed {
            header += 4;
        }

        let mut out = Vec::with_capacity(65);
        out.push(header);
        out.extend_from_slice(&compact);
        Ok(out)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address())
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// `prefix || uvarint(len) || message`
pub fn signed_message_envelope(message: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SIGNED_MESSAGE_PREFIX.len() + 10 + message.len());
    buf.extend_from_slice(SIGNED_MESSAGE_PREFIX);

    let mut len = message.len() as u64;
    loop {
        let byte = (len & 0x7f) as u8;
        len >>= 7;
        if len == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }

    buf.extend_from_slice(message);
    buf
}

/// The set of keys the gateway can sign with
#[derive(Debug, Clone, Default)]
pub struct Accounts(Vec<Account>);

impl Accounts {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self(accounts)
    }

    pub fn find_by_address(&self, address: &Address) -> Option<&Account> {
        self.0.iter().find(|acc| &acc.address() == address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIF_1: &str = "5JK4Gu9nxCvsCxiq9Zf3KdmA9ACza6dUn5BRLVWAYEtQabdnJ89";
    const WIF_2: &str = "5JwvXtv6YCa17XNDHJ6CJaveg4mrpqFvcjdrh9FZWZEvGFpUxec";

    #[test]
    fn test_wif_addresses() {
        let acc1 = Account::from_wif(WIF_1).unwrap();
        let acc2 = Account::from_wif(WIF_2).unwrap();
        assert_eq!(acc1.address().to_hex(), "6d358cf96533189dd5a602d0937fddf0888ad3ae");
        assert_eq!(acc2.address().to_hex(), "7e22630f90e6db16283af2c6b04f688117a55db4");
    }

    #[test]
    fn test_accounts_find() {
        let accounts = Accounts::new(vec![Account::from_wif(WIF_1).unwrap(), Account::from_wif(WIF_2).unwrap()]);
        assert_eq!(accounts.len(), 2);

        let target = Address::from_hex("7e22630f90e6db16283af2c6b04f688117a55db4").unwrap();
        assert!(accounts.find_by_address(&target).is_some());
        assert!(accounts.find_by_address(&Address::zero()).is_none());
    }

    #[test]
    fn test_invalid_wif() {
        assert!(Account::from_wif("not-a-key").is_err());
    }

    #[test]
    fn test_envelope_length_prefix() {
        let envelope = signed_message_envelope(b"hello");
        assert_eq!(&envelope[..SIGNED_MESSAGE_PREFIX.len()], SIGNED_MESSAGE_PREFIX);
        assert_eq!(envelope[SIGNED_MESSAGE_PREFIX.len()], 5);
        assert!(envelope.ends_with(b"hello"));

        let long = vec![0u8; 300];
        let envelope = signed_message_envelope(&long);
        assert_eq!(&envelope[SIGNED_MESSAGE_PREFIX.len()..SIGNED_MESSAGE_PREFIX.len() + 2], &[0xac, 0x02]);
    }

    #[test]
    fn test_sign_message_header() {
        let acc = Account::from_wif(WIF_1).unwrap();
        let sig = acc.sign_message(b"hello").unwrap();
        assert_eq!(sig.len(), 65);
        assert!(sig[0] == 27 || sig[0] == 28);
    }
}
