// kaon-core/src/lib.rs

//! Chain-side data model shared by the client and the transformer
//!
//! This crate provides:
//! - Hex and big integer codec helpers
//! - Wei-scaled `Amount`
//! - Script ASM parsing for embedded EVM calls
//! - UTXO script classification
//! - Positional log topic matching

pub mod codec;
pub mod amount;
pub mod asm;
pub mod utxo;
pub mod topics;

pub use amount::Amount;
pub use asm::{ContractInfo, ScriptGrammar};
pub use codec::*;
pub use utxo::UtxoScriptType;
pub use topics::{address_allowed, filters_match, TopicSlot};

/// Result type for codec and parser operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while decoding chain data
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid hex quantity: {0}")]
    InvalidHex(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("amount overflow: {0}")]
    AmountOverflow(String),

    #[error("invalid {grammar} script: expected {expected} parts, got {got}")]
    ScriptShape {
        grammar: ScriptGrammar,
        expected: &'static str,
        got: usize,
    },

    #[error("invalid {grammar} script: {reason}")]
    ScriptField {
        grammar: ScriptGrammar,
        reason: String,
    },

    #[error("Cryptographic error: {0}")]
    CryptoError(#[from] kaon_crypto::CryptoError),
}
