// transformer/src/eth.rs

//! Ethereum-side wire types: the JSON-RPC envelope and the result shapes
//! the proxies produce.

use crate::error::{JsonRpcError, TransformResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// 256 zero bytes, the bloom of every block and receipt
pub const EMPTY_LOGS_BLOOM: &str = "0x00000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000";

pub const DEFAULT_SHA3_UNCLES: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

pub const ZERO_WORD: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Hex of the block gas limit reported for every block
pub const DEFAULT_BLOCK_GAS_LIMIT: &str = "2625A00";

pub const ZERO_ADDRESS: &str = "0000000000000000000000000000000000000000";

pub const SUBSCRIPTION_METHOD: &str = "eth_subscription";

/// Keeps an explicit `null` apart from an absent field
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    /// Request built inside the gateway, for proxies calling proxies
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id: None,
        }
    }

    /// Positional parameters. A missing `params` reads as an empty list.
    pub fn params(&self) -> TransformResult<&[Value]> {
        match &self.params {
            Value::Array(params) => Ok(params.as_slice()),
            Value::Null => Ok(&[]),
            other => Err(JsonRpcError::invalid_params(format!(
                "Invalid RPC input: params must be an array, got {}",
                other
            ))),
        }
    }

    /// Decode the whole parameter array into `T`
    pub fn decode_params<T: serde::de::DeserializeOwned>(&self) -> TransformResult<T> {
        let params = match &self.params {
            Value::Null => Value::Array(Vec::new()),
            other => other.clone(),
        };
        serde_json::from_value(params)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid RPC input: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Server-initiated message without an id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

impl JsonRpcNotification {
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionParams {
    pub subscription: String,
    pub result: Value,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthBlock {
    pub number: String,
    pub hash: String,
    pub parent_hash: String,
    pub nonce: String,
    pub size: String,
    pub miner: String,
    pub logs_bloom: String,
    pub timestamp: String,
    pub extra_data: String,
    /// Hashes, or full transaction objects
    pub transactions: Vec<Value>,
    pub state_root: String,
    pub transactions_root: String,
    pub receipts_root: String,
    pub difficulty: String,
    pub total_difficulty: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub sha3_uncles: String,
    pub uncles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthTransaction {
    /// `None` while pending
    pub block_hash: Option<String>,
    pub block_number: Option<String>,
    pub transaction_index: Option<String>,
    pub hash: String,
    pub nonce: String,
    /// Wei
    pub value: String,
    pub input: String,
    pub from: String,
    /// `None` for contract creation
    pub to: Option<String>,
    pub gas: String,
    pub gas_price: String,
    pub cumulative_gas: String,
    pub gas_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
}

impl EthTransaction {
    pub fn is_pending(&self) -> bool {
        self.block_hash.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthLog {
    pub log_index: String,
    pub transaction_index: String,
    pub transaction_hash: String,
    pub block_hash: String,
    pub block_number: String,
    pub address: String,
    pub data: String,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthTransactionReceipt {
    pub transaction_hash: String,
    pub transaction_index: Option<String>,
    pub block_hash: Option<String>,
    pub block_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub effective_gas_price: String,
    pub cumulative_gas_used: String,
    pub gas_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub logs: Vec<EthLog>,
    pub logs_bloom: String,
    pub status: String,
}

/// Payload of a `newHeads` notification
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthNewHead {
    pub hash: String,
    pub number: String,
    pub difficulty: String,
    pub extra_data: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub logs_bloom: String,
    pub miner: String,
    pub nonce: String,
    pub parent_hash: String,
    pub receipts_root: String,
    pub sha3_uncles: String,
    pub state_root: String,
    pub timestamp: String,
    pub transactions_root: String,
    pub mix_hash: String,
}

impl From<EthBlock> for EthNewHead {
    fn from(block: EthBlock) -> Self {
        Self {
            hash: block.hash,
            number: block.number,
            difficulty: block.difficulty,
            extra_data: block.extra_data,
            gas_limit: block.gas_limit,
            gas_used: block.gas_used,
            logs_bloom: block.logs_bloom,
            miner: block.miner,
            nonce: block.nonce,
            parent_hash: block.parent_hash,
            receipts_root: block.receipts_root,
            sha3_uncles: block.sha3_uncles,
            state_root: block.state_root,
            timestamp: block.timestamp,
            transactions_root: block.transactions_root,
            mix_hash: ZERO_WORD.to_string(),
        }
    }
}

/// A UTXO as returned by `kaon_getUTXOs`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KaonUtxo {
    pub address: String,
    pub txid: String,
    pub vout: u64,
    /// KAON decimal
    pub amount: String,
    pub safe: bool,
    pub spendable: bool,
    pub confirmations: i64,
    pub height: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub script_pub_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeem_script: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_presence_is_kept() {
        let absent: JsonRpcRequest = serde_json::from_value(json!({"method": "m"})).unwrap();
        let null: JsonRpcRequest = serde_json::from_value(json!({"method": "m", "id": null})).unwrap();
        assert_eq!(absent.id, None);
        assert_eq!(null.id, Some(Value::Null));

        let resp = JsonRpcResponse::success(null.id, json!("0x1"));
        assert_eq!(serde_json::to_value(&resp).unwrap(), json!({"jsonrpc": "2.0", "result": "0x1", "id": null}));
    }

    #[test]
    fn test_null_result_is_serialized() {
        let resp = JsonRpcResponse::success(Some(json!(1)), Value::Null);
        assert_eq!(serde_json::to_value(&resp).unwrap(), json!({"jsonrpc": "2.0", "result": null, "id": 1}));
    }

    #[test]
    fn test_error_excludes_result() {
        let resp = JsonRpcResponse::failure(Some(json!("a")), JsonRpcError::invalid_params("bad"));
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"jsonrpc": "2.0", "error": {"code": -32602, "message": "bad"}, "id": "a"})
        );
    }

    #[test]
    fn test_params_must_be_array() {
        let req = JsonRpcRequest::new("m", json!({"a": 1}));
        assert!(matches!(req.params(), Err(JsonRpcError::InvalidParams(_))));
        assert!(JsonRpcRequest::new("m", Value::Null).params().unwrap().is_empty());
    }

    #[test]
    fn test_pending_transaction_nulls() {
        let tx = EthTransaction { hash: "0x01".into(), ..Default::default() };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["blockHash"], Value::Null);
        assert_eq!(value["to"], Value::Null);
        assert!(value.get("v").is_none());
        assert!(tx.is_pending());
    }
}
