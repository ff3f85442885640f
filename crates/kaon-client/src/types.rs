// kaon-client/src/types.rs

//! Request and response shapes of the Kaon node RPC.
//!
//! Responses are deserialize-only and tolerant: missing fields take their
//! defaults and integers may arrive as numbers, floats or strings.
//! Requests know how to lay themselves out as positional parameters.

use crate::error::{KaonError, KaonResult};
use kaon_core::asm::{self, OP_CALL, OP_CREATE, OP_SPEND};
use kaon_core::{Amount, ContractInfo, TopicSlot};
use kaon_crypto::Address;
use num_bigint::BigUint;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const OP_CHECKSIG: &str = "OP_CHECKSIG";

/// `excepted` value of a receipt whose execution succeeded
pub const EXCEPTED_NONE: &str = "None";

pub mod numeric {
    //! Deserializers for node integers that may come as numbers, floats,
    //! strings or null.

    use num_bigint::BigUint;
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;
    use std::str::FromStr;

    struct U64Visitor;

    impl<'de> Visitor<'de> for U64Visitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an unsigned integer")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(E::custom)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<u64, E> {
            if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 {
                Ok(v as u64)
            } else {
                Err(E::custom(format!("not an unsigned integer: {}", v)))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            v.parse().map_err(E::custom)
        }

        fn visit_unit<E: de::Error>(self) -> Result<u64, E> {
            Ok(0)
        }
    }

    pub fn u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        d.deserialize_any(U64Visitor)
    }

    struct BigVisitor;

    impl<'de> Visitor<'de> for BigVisitor {
        type Value = BigUint;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an unsigned big integer")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigUint, E> {
            Ok(BigUint::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigUint, E> {
            u64::try_from(v).map(BigUint::from).map_err(E::custom)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<BigUint, E> {
            if v < 0.0 || v.fract() != 0.0 || !v.is_finite() {
                return Err(E::custom(format!("not an unsigned integer: {}", v)));
            }
            BigUint::from_str(&format!("{:.0}", v)).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<BigUint, E> {
            BigUint::from_str(v).map_err(E::custom)
        }

        fn visit_unit<E: de::Error>(self) -> Result<BigUint, E> {
            Ok(BigUint::default())
        }
    }

    pub fn biguint<'de, D: Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
        d.deserialize_any(BigVisitor)
    }
}

// ---------------------------------------------------------------------------
// Chain and network state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockchainInfo {
    pub chain: String,
    #[serde(deserialize_with = "numeric::u64")]
    pub blocks: u64,
    #[serde(deserialize_with = "numeric::u64")]
    pub headers: u64,
    pub bestblockhash: String,
    pub difficulty: f64,
    pub mediantime: i64,
    pub verificationprogress: f64,
    pub initialblockdownload: bool,
    pub chainwork: String,
    pub pruned: bool,
    pub warnings: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkInfo {
    pub version: i64,
    pub subversion: String,
    pub protocolversion: i64,
    #[serde(deserialize_with = "numeric::u64")]
    pub connections: u64,
    pub networkactive: bool,
    pub warnings: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PeerInfo {
    pub id: i64,
    pub addr: String,
    pub subver: String,
    pub inbound: bool,
    pub startingheight: i64,
    pub synced_blocks: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MiningInfo {
    #[serde(deserialize_with = "numeric::u64")]
    pub blocks: u64,
    pub difficulty: Value,
    pub chain: String,
    pub pooledtx: u64,
    pub warnings: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StakingInfo {
    pub enabled: bool,
    pub staking: bool,
    pub errors: String,
    pub difficulty: f64,
    #[serde(deserialize_with = "numeric::u64")]
    pub weight: u64,
    #[serde(deserialize_with = "numeric::u64")]
    pub netstakeweight: u64,
    #[serde(deserialize_with = "numeric::u64")]
    pub expectedtime: u64,
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockHeader {
    pub hash: String,
    pub confirmations: i64,
    #[serde(deserialize_with = "numeric::u64")]
    pub height: u64,
    pub version: i64,
    pub merkleroot: String,
    #[serde(deserialize_with = "numeric::u64")]
    pub time: u64,
    #[serde(deserialize_with = "numeric::u64")]
    pub nonce: u64,
    pub bits: String,
    pub difficulty: f64,
    #[serde(rename = "hashStateRoot")]
    pub hash_state_root: String,
    #[serde(rename = "hashUTXORoot")]
    pub hash_utxo_root: String,
    pub previousblockhash: String,
    pub flags: String,
    pub proposer: String,
    #[serde(rename = "gasUsed", deserialize_with = "numeric::u64")]
    pub gas_used: u64,
}

impl BlockHeader {
    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Block {
    pub hash: String,
    pub confirmations: i64,
    #[serde(deserialize_with = "numeric::u64")]
    pub size: u64,
    #[serde(deserialize_with = "numeric::u64")]
    pub height: u64,
    pub version: i64,
    pub merkleroot: String,
    #[serde(rename = "hashStateRoot")]
    pub hash_state_root: String,
    #[serde(rename = "hashUTXORoot")]
    pub hash_utxo_root: String,
    /// Ids at verbosity 1, full transactions at verbosity 2
    pub tx: Vec<Value>,
    #[serde(deserialize_with = "numeric::u64")]
    pub time: u64,
    #[serde(deserialize_with = "numeric::u64")]
    pub nonce: u64,
    pub bits: String,
    pub difficulty: f64,
    pub previousblockhash: String,
    pub nextblockhash: String,
    #[serde(rename = "Proposer")]
    pub proposer: String,
    pub flags: String,
}

impl Block {
    /// Transaction ids in block order, whatever the verbosity
    pub fn tx_ids(&self) -> Vec<String> {
        self.tx
            .iter()
            .filter_map(|tx| match tx {
                Value::String(id) => Some(id.clone()),
                Value::Object(obj) => obj.get("txid").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect()
    }

    /// Embedded transactions of a verbosity 2 block
    pub fn transactions(&self) -> KaonResult<Vec<TransactionDetails>> {
        self.tx
            .iter()
            .map(|tx| {
                serde_json::from_value(tx.clone()).map_err(|e| KaonError::decode("getblock", e))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScriptSig {
    pub asm: String,
    pub hex: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScriptPubKey {
    pub asm: String,
    pub hex: String,
    #[serde(rename = "reqSigs")]
    pub req_sigs: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub addresses: Vec<String>,
    pub address: String,
}

impl ScriptPubKey {
    /// Every base58 address the output pays to
    pub fn all_addresses(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.address.as_str())
            .chain(self.addresses.iter().map(String::as_str))
            .filter(|a| !a.is_empty())
    }

    /// First address that converts locally to a 20-byte hex key id
    pub fn first_hex_address(&self) -> Option<String> {
        self.all_addresses()
            .find_map(|a| Address::from_base58(a).ok())
            .map(|a| a.to_hex())
    }

    pub fn final_op(&self) -> Option<&str> {
        self.asm.split_whitespace().last()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TxInput {
    pub address: String,
    pub txid: String,
    #[serde(deserialize_with = "numeric::u64")]
    pub vout: u64,
    #[serde(rename = "previousPubkey")]
    pub previous_pubkey: ScriptSig,
    #[serde(rename = "scriptSig")]
    pub script_sig: ScriptSig,
    pub txinwitness: Vec<String>,
    #[serde(deserialize_with = "numeric::u64")]
    pub sequence: u64,
    pub value: Amount,
    pub coinbase: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TxOutput {
    pub value: Amount,
    #[serde(deserialize_with = "numeric::u64")]
    pub n: u64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

/// A transaction as returned by verbose getrawtransaction,
/// decoderawtransaction, or embedded in a verbosity 2 block
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionDetails {
    pub hex: String,
    pub txid: String,
    pub hash: String,
    #[serde(deserialize_with = "numeric::u64")]
    pub size: u64,
    #[serde(deserialize_with = "numeric::u64")]
    pub vsize: u64,
    pub version: i64,
    pub generated: bool,
    pub blockhash: String,
    pub blockindex: i64,
    pub index: i64,
    pub confirmations: i64,
    #[serde(deserialize_with = "numeric::u64")]
    pub time: u64,
    #[serde(deserialize_with = "numeric::u64")]
    pub blocktime: u64,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
    #[serde(rename = "gasPrice", deserialize_with = "numeric::u64")]
    pub gas_price: u64,
    #[serde(deserialize_with = "numeric::u64")]
    pub locktime: u64,
}

/// Key id of a pay-to-pubkey-hash script, if `script` is one
fn p2pkh_key_id(script: &str) -> Option<String> {
    let parts = asm::tokenize(script);
    if parts.last() != Some(&OP_CHECKSIG) {
        return None;
    }
    asm::parse_p2pkh_receiver(&parts)
        .ok()
        .and_then(|key_id| Address::from_hex(key_id).ok())
        .map(|a| a.to_hex())
}

impl TransactionDetails {
    /// Contract call or create metadata of the transaction, and whether it
    /// is a contract transaction at all.
    ///
    /// For plain transfers `from` and `to` are filled from the first input
    /// whose sender and paid output can both be resolved to key ids.
    pub fn contract_info(&self) -> KaonResult<(ContractInfo, bool)> {
        for vout in &self.vout {
            let spk = &vout.script_pub_key;
            let parts = asm::tokenize(&spk.asm);

            match parts.last().copied() {
                Some(OP_CALL) => {
                    let info = asm::parse_call(&parts)
                        .map_err(|e| KaonError::Script(format!("couldn't parse call sender ASM: {}", e)))?;
                    return Ok((info, true));
                }
                Some(OP_CREATE) => {
                    let info = asm::parse_create(&parts)
                        .map_err(|e| KaonError::Script(format!("couldn't parse create sender ASM: {}", e)))?;
                    return Ok((info, true));
                }
                Some(OP_SPEND) => {
                    return Err(KaonError::Script("OP_SPEND contract parsing is not supported".into()));
                }
                Some(OP_CHECKSIG) if self.generated && matches!(spk.kind.as_str(), "pubkey" | "pubkeyhash") => {
                    if let Some(to) = spk.first_hex_address() {
                        let info = ContractInfo { to: Some(to), ..Default::default() };
                        return Ok((info, false));
                    }
                }
                _ => {}
            }
        }

        if self.generated {
            return Ok((ContractInfo::default(), false));
        }

        for vin in &self.vin {
            let from = if vin.address.is_empty() {
                p2pkh_key_id(&vin.previous_pubkey.asm)
            } else {
                Address::from_base58(&vin.address).ok().map(|a| a.to_hex())
            };
            let Some(from) = from else { continue };

            let Some(vout) = usize::try_from(vin.vout).ok().and_then(|i| self.vout.get(i)) else {
                continue;
            };
            let to = vout
                .script_pub_key
                .first_hex_address()
                .or_else(|| p2pkh_key_id(&vout.script_pub_key.asm));
            let Some(to) = to else { continue };

            let info = ContractInfo {
                from: Some(from),
                to: Some(to),
                ..Default::default()
            };
            return Ok((info, false));
        }

        Ok((ContractInfo::default(), false))
    }

    pub fn is_contract_creation(&self) -> bool {
        self.vout
            .iter()
            .any(|v| v.script_pub_key.asm.ends_with(OP_CREATE))
    }

    /// Inputs minus outputs. Generated transactions and transactions whose
    /// inputs carry no value pay nothing.
    pub fn mining_fee(&self) -> Amount {
        if self.generated {
            return Amount::zero();
        }
        let inputs: Amount = self.vin.iter().map(|v| v.value).sum();
        if inputs.is_zero() {
            return Amount::zero();
        }
        let outputs: Amount = self.vout.iter().map(|v| v.value).sum();
        inputs - outputs
    }

    /// Total value paid to outputs
    pub fn total_output(&self) -> Amount {
        self.vout.iter().map(|v| v.value).sum()
    }

    /// Base58 address of the first input that names one
    pub fn first_input_address(&self) -> Option<&str> {
        self.vin
            .iter()
            .map(|v| v.address.as_str())
            .find(|a| !a.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Receipts and logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Log {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    /// Position inside the receipt's log array, assigned after decoding
    #[serde(skip)]
    pub index: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionReceipt {
    #[serde(rename = "blockHash")]
    pub block_hash: String,
    #[serde(rename = "blockNumber", deserialize_with = "numeric::u64")]
    pub block_number: u64,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "transactionIndex", deserialize_with = "numeric::u64")]
    pub transaction_index: u64,
    pub from: String,
    pub to: String,
    #[serde(rename = "cumulativeGasUsed", deserialize_with = "numeric::u64")]
    pub cumulative_gas_used: u64,
    #[serde(rename = "gasUsed", deserialize_with = "numeric::u64")]
    pub gas_used: u64,
    #[serde(rename = "effectiveGasPrice", deserialize_with = "numeric::u64")]
    pub effective_gas_price: u64,
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
    pub excepted: String,
    #[serde(rename = "exceptedMessage")]
    pub excepted_message: String,
    pub log: Vec<Log>,
    #[serde(rename = "outputIndex")]
    pub output_index: i64,
}

impl TransactionReceipt {
    /// Number the logs by their position
    pub fn index_logs(mut self) -> Self {
        for (i, log) in self.log.iter_mut().enumerate() {
            log.index = i;
        }
        self
    }

    pub fn succeeded(&self) -> bool {
        self.excepted == EXCEPTED_NONE
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExecutionResult {
    #[serde(rename = "gasUsed", deserialize_with = "numeric::u64")]
    pub gas_used: u64,
    pub excepted: String,
    #[serde(rename = "exceptedMessage")]
    pub excepted_message: String,
    #[serde(rename = "newAddress")]
    pub new_address: String,
    pub output: String,
    #[serde(rename = "codeDeposit")]
    pub code_deposit: i64,
    #[serde(rename = "gasRefunded", deserialize_with = "numeric::u64")]
    pub gas_refunded: u64,
    #[serde(rename = "depositSize")]
    pub deposit_size: i64,
    #[serde(rename = "gasForDeposit", deserialize_with = "numeric::u64")]
    pub gas_for_deposit: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallReceipt {
    #[serde(rename = "stateRoot")]
    pub state_root: String,
    #[serde(rename = "gasUsed", deserialize_with = "numeric::u64")]
    pub gas_used: u64,
    pub bloom: String,
    pub log: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallContractResponse {
    pub address: String,
    #[serde(rename = "executionResult")]
    pub execution_result: ExecutionResult,
    #[serde(rename = "transactionReceipt")]
    pub transaction_receipt: CallReceipt,
}

// ---------------------------------------------------------------------------
// Log search
// ---------------------------------------------------------------------------

/// Topic slots in the node's filter shape: one topic or nothing per position
fn topics_param(topics: &[TopicSlot]) -> Option<Value> {
    let slots: Vec<Value> = topics
        .iter()
        .map(|slot| match slot.as_slice() {
            [single] => Value::String(single.clone()),
            _ => Value::Null,
        })
        .collect();
    if slots.iter().all(Value::is_null) {
        None
    } else {
        Some(Value::Array(slots))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchLogsRequest {
    pub from_block: u64,
    pub to_block: u64,
    /// Contract addresses without `0x`
    pub addresses: Vec<String>,
    /// Topics without `0x`
    pub topics: Vec<TopicSlot>,
    pub min_confirmations: Option<u64>,
}

impl SearchLogsRequest {
    pub fn to_params(&self) -> Value {
        let addresses = if self.addresses.is_empty() {
            Value::Null
        } else {
            json!({ "addresses": self.addresses })
        };
        let topics = match topics_param(&self.topics) {
            Some(slots) => json!({ "topics": slots }),
            None => Value::Null,
        };

        let mut params = vec![json!(self.from_block), json!(self.to_block), addresses, topics];
        if let Some(minconf) = self.min_confirmations {
            params.push(json!(minconf));
        }
        Value::Array(params)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaitForLogsRequest {
    /// `None` waits from the node's current tip
    pub from_block: Option<u64>,
    pub addresses: Vec<String>,
    pub topics: Vec<TopicSlot>,
    pub min_confirmations: u64,
}

impl WaitForLogsRequest {
    pub fn to_params(&self) -> Value {
        let mut filter = Map::new();
        if !self.addresses.is_empty() {
            filter.insert("addresses".into(), json!(self.addresses));
        }
        if let Some(slots) = topics_param(&self.topics) {
            filter.insert("topics".into(), slots);
        }

        json!([
            self.from_block,
            Value::Null,
            Value::Object(filter),
            self.min_confirmations,
        ])
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WaitForLogsEntry {
    #[serde(rename = "blockHash")]
    pub block_hash: String,
    #[serde(rename = "blockNumber", deserialize_with = "numeric::u64")]
    pub block_number: u64,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "transactionIndex", deserialize_with = "numeric::u64")]
    pub transaction_index: u64,
    pub from: String,
    pub to: String,
    #[serde(rename = "cumulativeGasUsed", deserialize_with = "numeric::u64")]
    pub cumulative_gas_used: u64,
    #[serde(rename = "gasUsed", deserialize_with = "numeric::u64")]
    pub gas_used: u64,
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
    pub data: String,
    pub topics: Vec<String>,
    pub excepted: String,
    #[serde(rename = "outputIndex")]
    pub output_index: i64,
}

impl WaitForLogsEntry {
    pub fn log(&self) -> Log {
        Log {
            address: self.contract_address.clone(),
            topics: self.topics.clone(),
            data: self.data.clone(),
            index: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WaitForLogsResponse {
    pub entries: Vec<WaitForLogsEntry>,
    #[serde(deserialize_with = "numeric::u64")]
    pub count: u64,
    #[serde(rename = "nextBlock", deserialize_with = "numeric::u64")]
    pub next_block: u64,
}

// ---------------------------------------------------------------------------
// Accounts, balances and UTXOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccountInfo {
    pub address: String,
    #[serde(deserialize_with = "numeric::biguint")]
    pub balance: BigUint,
    pub storage: Value,
    pub code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddressBalance {
    #[serde(deserialize_with = "numeric::biguint")]
    pub balance: BigUint,
    #[serde(deserialize_with = "numeric::biguint")]
    pub received: BigUint,
    #[serde(deserialize_with = "numeric::biguint")]
    pub immature: BigUint,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Utxo {
    pub address: String,
    pub txid: String,
    #[serde(rename = "outputIndex", deserialize_with = "numeric::u64")]
    pub output_index: u64,
    pub script: String,
    pub satoshis: Amount,
    #[serde(deserialize_with = "numeric::u64")]
    pub height: u64,
    #[serde(rename = "isStake")]
    pub is_stake: bool,
}

/// `getstorage`: slot maps keyed by hashed location
pub type StorageResponse = BTreeMap<String, BTreeMap<String, String>>;

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

/// Amounts go to the node as the decimal string of the wei value
fn amount_param(amount: &Amount) -> Value {
    Value::String(amount.wei().normalize().to_string())
}

#[derive(Debug, Clone, Default)]
pub struct SendToAddressRequest {
    pub address: String,
    pub amount: Amount,
    pub sender_address: String,
}

impl SendToAddressRequest {
    pub fn to_params(&self) -> Value {
        json!([
            self.address,
            amount_param(&self.amount),
            "",
            "",
            false,
            Value::Null,
            Value::Null,
            Value::Null,
            false,
            self.sender_address,
            true,
        ])
    }
}

#[derive(Debug, Clone, Default)]
pub struct SendToContractRequest {
    pub contract_address: String,
    pub datahex: String,
    pub amount: Amount,
    pub gas_limit: u64,
    pub gas_price: String,
    pub sender_address: String,
}

impl SendToContractRequest {
    pub fn to_params(&self) -> Value {
        json!([
            self.contract_address,
            self.datahex,
            amount_param(&self.amount),
            self.gas_limit,
            self.gas_price,
            self.sender_address,
        ])
    }

    /// Output object for createrawtransaction
    pub fn to_raw_output(&self) -> Value {
        json!({
            "contractAddress": self.contract_address,
            "data": self.datahex,
            "amount": amount_param(&self.amount),
            "gasLimit": self.gas_limit,
            "gasPrice": self.gas_price,
            "senderaddress": self.sender_address,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SendToContractResponse {
    pub txid: String,
    pub sender: String,
    pub hash160: String,
}

#[derive(Debug, Clone, Default)]
pub struct CreateContractRequest {
    pub bytecode: String,
    pub gas_limit: u64,
    pub gas_price: String,
    pub sender_address: String,
}

impl CreateContractRequest {
    pub fn to_params(&self) -> Value {
        let mut params = vec![json!(self.bytecode), json!(self.gas_limit), json!(self.gas_price)];
        if !self.sender_address.is_empty() {
            params.push(json!(self.sender_address));
        }
        Value::Array(params)
    }

    pub fn to_raw_output(&self) -> Value {
        json!({
            "bytecode": self.bytecode,
            "gasLimit": self.gas_limit,
            "gasPrice": self.gas_price,
            "senderaddress": self.sender_address,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateContractResponse {
    pub txid: String,
    pub sender: String,
    pub hash160: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RawTxInput {
    pub txid: String,
    pub vout: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignRawTxResponse {
    pub hex: String,
    pub complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    // Block 2's coinbase-style contract call with an OP_SENDER prefix
    fn sender_call_tx() -> TransactionDetails {
        serde_json::from_value(json!({
            "txid": "11e97fa5877c5df349934bafc02da6218038a427e8ed081f048626fa6eb523f5",
            "hash": "11e97fa5877c5df349934bafc02da6218038a427e8ed081f048626fa6eb523f5",
            "vin": [{"txid": "7f5350dc474f2953a3f30282c1afcad2fb61cdcea5bd949c808ecc6f64ce1503", "vout": 0, "value": 10}],
            "vout": [{
                "value": 0,
                "n": 0,
                "scriptPubKey": {
                    "asm": "1 81e872329e767a0487de7e970992b13b644f1f4f 6b483045022100b83ef90bc808569fb00e29a0f6209d32c1795207c95a554c091401ac8fa8ab920220694b7ec801efd2facea2026d12e8eb5de7689c637f539a620f24c6da8fff235f0121021104b7672c2e08fe321f1bfaffc3768c2777adeedb857b4313ed9d2f15fc8ce4 OP_SENDER 4 55000 40 a9059cbb000000000000000000000000710e94d7f8a5d7a1e5be52bd783370d6e3008a2a0000000000000000000000000000000000000000000000000000000005f5e100 af1ae4e29253ba755c723bca25e883b8deb777b8 OP_CALL",
                    "type": "call_sender"
                }
            }, {
                "value": 9.5,
                "n": 1,
                "scriptPubKey": {"asm": "OP_DUP OP_HASH160 81e872329e767a0487de7e970992b13b644f1f4f OP_EQUALVERIFY OP_CHECKSIG", "type": "pubkeyhash"}
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_contract_info_sender_call() {
        let tx = sender_call_tx();
        let (info, is_contract) = tx.contract_info().unwrap();
        assert!(is_contract);
        assert_eq!(info.from.as_deref(), Some("81e872329e767a0487de7e970992b13b644f1f4f"));
        assert_eq!(info.to.as_deref(), Some("af1ae4e29253ba755c723bca25e883b8deb777b8"));
        assert_eq!(info.gas_limit, 55000);
        assert_eq!(info.gas_price, 40);
        assert!(!tx.is_contract_creation());
    }

    #[test]
    fn test_mining_fee() {
        let tx = sender_call_tx();
        assert_eq!(tx.mining_fee().to_kaon().to_string(), "0.5");

        let generated = TransactionDetails { generated: true, ..tx };
        assert!(generated.mining_fee().is_zero());
    }

    #[test]
    fn test_plain_transfer_uses_p2pkh_fallbacks() {
        let tx: TransactionDetails = serde_json::from_value(json!({
            "vin": [{
                "txid": "aa",
                "vout": 0,
                "previousPubkey": {"asm": "OP_DUP OP_HASH160 1ce507204a6fc8fd6aa7e54d1481d30acb0dbead OP_EQUALVERIFY OP_CHECKSIG"}
            }],
            "vout": [{
                "value": 1,
                "n": 0,
                "scriptPubKey": {"asm": "OP_DUP OP_HASH160 6d358cf96533189dd5a602d0937fddf0888ad3ae OP_EQUALVERIFY OP_CHECKSIG", "type": "pubkeyhash"}
            }]
        }))
        .unwrap();

        let (info, is_contract) = tx.contract_info().unwrap();
        assert!(!is_contract);
        assert_eq!(info.from.as_deref(), Some("1ce507204a6fc8fd6aa7e54d1481d30acb0dbead"));
        assert_eq!(info.to.as_deref(), Some("6d358cf96533189dd5a602d0937fddf0888ad3ae"));
    }

    #[test]
    fn test_op_spend_is_rejected() {
        let tx: TransactionDetails = serde_json::from_value(json!({
            "vout": [{"scriptPubKey": {"asm": "OP_SPEND"}}]
        }))
        .unwrap();
        assert!(matches!(tx.contract_info(), Err(KaonError::Script(_))));
    }

    #[test]
    fn test_search_logs_params() {
        let req = SearchLogsRequest {
            from_block: 10,
            to_block: 20,
            addresses: vec!["db46f738bf32cdafb9a4a70eb8b44c76646bcaf0".into()],
            topics: vec![vec!["aa".into()], vec![], vec!["bb".into(), "cc".into()]],
            min_confirmations: None,
        };
        assert_eq!(
            req.to_params(),
            json!([10, 20, {"addresses": ["db46f738bf32cdafb9a4a70eb8b44c76646bcaf0"]}, {"topics": ["aa", null, null]}])
        );

        let bare = SearchLogsRequest { topics: vec![vec![]], ..Default::default() };
        assert_eq!(bare.to_params(), json!([0, 0, null, null]));
    }

    #[test]
    fn test_wait_for_logs_params() {
        let req = WaitForLogsRequest {
            from_block: None,
            addresses: vec!["ab".into()],
            topics: vec![],
            min_confirmations: 0,
        };
        assert_eq!(req.to_params(), json!([null, null, {"addresses": ["ab"]}, 0]));
    }

    #[test]
    fn test_numeric_fields_accept_strings_and_floats() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "blockNumber": "3",
            "gasUsed": 21000.0,
            "cumulativeGasUsed": null,
            "excepted": "None",
            "log": [{"address": "a"}, {"address": "b"}]
        }))
        .unwrap();
        let receipt = receipt.index_logs();
        assert_eq!(receipt.block_number, 3);
        assert_eq!(receipt.gas_used, 21000);
        assert_eq!(receipt.cumulative_gas_used, 0);
        assert!(receipt.succeeded());
        assert_eq!(receipt.log[1].index, 1);
    }

    #[test]
    fn test_block_tx_ids_any_verbosity() {
        let block: Block = serde_json::from_value(json!({
            "hash": "bb",
            "tx": ["aa", {"txid": "cc"}],
            "Proposer": "qUbxboqjBRp96j3La8D1RYkyqx5uQbJPoW"
        }))
        .unwrap();
        assert_eq!(block.tx_ids(), vec!["aa".to_string(), "cc".to_string()]);
        assert_eq!(block.proposer, "qUbxboqjBRp96j3La8D1RYkyqx5uQbJPoW");
    }
}
