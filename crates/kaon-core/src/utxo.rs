// kaon-core/src/utxo.rs

use std::fmt;
use std::str::FromStr;

/// Output script families, recognised by length and byte pattern of the hex script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UtxoScriptType {
    All,
    Unknown,
    OpReturn,
    Immature,
    P2PK,
    P2PKH,
    P2SH,
    P2WPKH,
    P2WSH,
    P2SHP2WPKH,
    P2SHP2WSH,
    P2MS,
}

impl UtxoScriptType {
    pub const ALL: [UtxoScriptType; 12] = [
        UtxoScriptType::All,
        UtxoScriptType::Unknown,
        UtxoScriptType::OpReturn,
        UtxoScriptType::Immature,
        UtxoScriptType::P2PK,
        UtxoScriptType::P2PKH,
        UtxoScriptType::P2SH,
        UtxoScriptType::P2WPKH,
        UtxoScriptType::P2WSH,
        UtxoScriptType::P2SHP2WPKH,
        UtxoScriptType::P2SHP2WSH,
        UtxoScriptType::P2MS,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UtxoScriptType::All => "all",
            UtxoScriptType::Unknown => "unknown",
            UtxoScriptType::OpReturn => "opreturn",
            UtxoScriptType::Immature => "immature",
            UtxoScriptType::P2PK => "P2PK",
            UtxoScriptType::P2PKH => "P2PKH",
            UtxoScriptType::P2SH => "P2SH",
            UtxoScriptType::P2WPKH => "P2WPKH",
            UtxoScriptType::P2WSH => "P2WSH",
            UtxoScriptType::P2SHP2WPKH => "P2SHP2WPKH",
            UtxoScriptType::P2SHP2WSH => "P2SHP2WSH",
            UtxoScriptType::P2MS => "P2MS",
        }
    }

    /// Classify a hex `scriptPubKey`. `redeem_script` is only consulted for
    /// script-hash outputs, to spot wrapped segwit.
    pub fn classify(script_pubkey: &str, redeem_script: Option<&str>) -> Self {
        let spk = script_pubkey.to_ascii_lowercase();

        if is_p2pk(&spk) {
            UtxoScriptType::P2PK
        } else if is_p2pkh(&spk) {
            UtxoScriptType::P2PKH
        } else if is_p2sh(&spk) {
            let redeem = redeem_script.map(str::to_ascii_lowercase).unwrap_or_default();
            if redeem.len() == 46 && redeem.starts_with("160014") {
                UtxoScriptType::P2SHP2WPKH
            } else if redeem.len() == 70 && redeem.starts_with("220020") {
                UtxoScriptType::P2SHP2WSH
            } else {
                UtxoScriptType::P2SH
            }
        } else if spk.len() == 44 && spk.starts_with("0014") {
            UtxoScriptType::P2WPKH
        } else if spk.len() == 68 && spk.starts_with("0020") {
            UtxoScriptType::P2WSH
        } else {
            UtxoScriptType::Unknown
        }
    }
}

// 35 bytes: <33 byte key push> ... OP_CHECKSIG
fn is_p2pk(spk: &str) -> bool {
    spk.len() == 70 && spk.starts_with("21") && spk.ends_with("ac")
}

// 25 bytes: OP_DUP OP_HASH160 <20> ... OP_EQUALVERIFY OP_CHECKSIG
fn is_p2pkh(spk: &str) -> bool {
    spk.len() == 50 && spk.starts_with("76a914") && spk.ends_with("88ac")
}

// 23 bytes: OP_HASH160 <20> ... OP_EQUAL
fn is_p2sh(spk: &str) -> bool {
    spk.len() == 46 && spk.starts_with("a914") && spk.ends_with("87")
}

impl fmt::Display for UtxoScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UtxoScriptType {
    type Err = String;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().to_ascii_lowercase() == lower)
            .ok_or_else(|| format!("unknown script type {}", s))
    }
}
