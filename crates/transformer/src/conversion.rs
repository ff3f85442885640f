// transformer/src/conversion.rs

//! Shared translation helpers: block parameters, log extraction and
//! filtering, topic and address parsing, gas units.

use crate::error::{JsonRpcError, TransformResult};
use crate::eth::EthLog;
use kaon_client::types::{Log, SearchLogsRequest, TransactionReceipt};
use kaon_client::KaonClient;
use kaon_core::{
    add_hex_prefix, address_allowed, decode_u64, encode_u64, filters_match, remove_hex_prefix,
    Amount, TopicSlot,
};
use rust_decimal::Decimal;
use serde_json::Value;

/// Smallest gas price the node accepts, in KAON
pub fn minimum_gas_price() -> Decimal {
    Decimal::new(1, 9)
}

/// Gas limit below which the node is likely to reject a transaction
pub const MINIMUM_GAS_LIMIT: u64 = 22_000;

/// Default gas limit of sent transactions
pub const DEFAULT_GAS_LIMIT: u64 = 210_000;

/// Default gas price of sent transactions, wei
pub const DEFAULT_GAS_PRICE_WEI: u64 = 2_000_000_000;

/// One satoshi per gas is 10^10 wei per gas
pub const WEI_PER_SATOSHI: u64 = 10_000_000_000;

/// Receipt data attached to every extracted log
pub trait LogBlockData {
    fn transaction_hash(&self) -> &str;
    fn transaction_index(&self) -> u64;
    fn block_hash(&self) -> &str;
    fn block_number(&self) -> u64;
}

impl LogBlockData for TransactionReceipt {
    fn transaction_hash(&self) -> &str {
        &self.transaction_hash
    }

    fn transaction_index(&self) -> u64 {
        self.transaction_index
    }

    fn block_hash(&self) -> &str {
        &self.block_hash
    }

    fn block_number(&self) -> u64 {
        self.block_number
    }
}

/// Shape native logs as Ethereum logs. `logIndex` is the log's position in
/// its receipt, which survives filtering.
pub fn extract_eth_logs(block: &impl LogBlockData, logs: &[Log]) -> Vec<EthLog> {
    logs.iter()
        .map(|log| EthLog {
            log_index: encode_u64(log.index as u64),
            transaction_index: encode_u64(block.transaction_index()),
            transaction_hash: add_hex_prefix(block.transaction_hash()),
            block_hash: add_hex_prefix(block.block_hash()),
            block_number: encode_u64(block.block_number()),
            address: add_hex_prefix(&log.address),
            data: add_hex_prefix(&log.data),
            topics: log.topics.iter().map(|t| add_hex_prefix(t)).collect(),
        })
        .collect()
}

/// Logs of `addresses` whose topics satisfy `filters`
pub fn filter_kaon_logs(addresses: &[String], filters: &[TopicSlot], logs: &[Log]) -> Vec<Log> {
    if addresses.is_empty() && filters.is_empty() {
        return logs.to_vec();
    }
    logs.iter()
        .filter(|log| address_allowed(addresses, &log.address))
        .filter(|log| filters_match(filters, &log.topics))
        .cloned()
        .collect()
}

/// Run `searchlogs`, then apply the topic slots the node can't express
/// (alternatives) and drop receipts left without logs.
pub async fn search_logs_and_filter_extra_topics(
    client: &KaonClient,
    req: &SearchLogsRequest,
) -> TransformResult<Vec<TransactionReceipt>> {
    let receipts = client
        .search_logs(req)
        .await
        .map_err(JsonRpcError::from)?;

    if req.topics.is_empty() && req.addresses.is_empty() {
        return Ok(receipts);
    }

    Ok(receipts
        .into_iter()
        .filter_map(|mut receipt| {
            receipt.log = filter_kaon_logs(&req.addresses, &req.topics, &receipt.log);
            (!receipt.log.is_empty()).then_some(receipt)
        })
        .collect())
}

/// Ethereum topic filter to positional slots, `0x` stripped.
/// `null` is a wildcard, a string is exact, an array is any-of.
pub fn translate_topics(topics: &[Value]) -> Result<Vec<TopicSlot>, String> {
    topics
        .iter()
        .map(|topic| match topic {
            Value::Null => Ok(Vec::new()),
            Value::String(s) => Ok(vec![remove_hex_prefix(s).to_string()]),
            Value::Array(alternatives) => alternatives
                .iter()
                .filter(|t| !t.is_null())
                .map(|t| {
                    t.as_str()
                        .map(|s| remove_hex_prefix(s).to_string())
                        .ok_or_else(|| format!("invalid topic {}, string expected", t))
                })
                .collect(),
            other => Err(format!("invalid topic {}, string or array expected", other)),
        })
        .collect()
}

/// Filter `address` field: a string or a list of strings, `0x` stripped
pub fn parse_filter_addresses(address: &Value) -> TransformResult<Vec<String>> {
    match address {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![remove_hex_prefix(s).to_string()]),
        Value::Array(list) => list
            .iter()
            .map(|a| {
                a.as_str()
                    .map(|s| remove_hex_prefix(s).to_string())
                    .ok_or_else(|| JsonRpcError::invalid_params(format!("invalid address {}, string expected", a)))
            })
            .collect(),
        other => Err(JsonRpcError::invalid_params(format!(
            "invalid address {}, string or array expected",
            other
        ))),
    }
}

/// Block height named by a raw JSON parameter: an integer, or a string
/// handled by [`block_number_by_param`]. Absent reads as an empty string.
pub async fn block_number_by_raw_param(client: &KaonClient, raw: &Value, default_latest: bool) -> TransformResult<u64> {
    match raw {
        Value::String(s) => block_number_by_param(client, s, default_latest).await,
        Value::Null => block_number_by_param(client, "", default_latest).await,
        Value::Number(n) => n.as_u64().ok_or_else(invalid_block_format),
        _ => Err(invalid_block_format()),
    }
}

fn invalid_block_format() -> JsonRpcError {
    JsonRpcError::invalid_params("invalid parameter format - string or integer is expected")
}

/// Block height from a tag or hex quantity.
///
/// An empty value means `latest` when `default_latest` is set, and is an
/// error otherwise.
pub async fn block_number_by_param(client: &KaonClient, param: &str, default_latest: bool) -> TransformResult<u64> {
    if param.is_empty() {
        if !default_latest {
            return Err(JsonRpcError::invalid_params("empty parameter value"));
        }
        return latest_block(client).await;
    }

    match param {
        "latest" => latest_block(client).await,
        "earliest" => Ok(0),
        "pending" => Err(JsonRpcError::invalid_request("pending tag is not supported")),
        _ => {
            if !param.starts_with("0x") {
                return Err(JsonRpcError::invalid_params("quantity values must start with 0x"));
            }
            decode_u64(param).map_err(|_| {
                tracing::debug!(value = param, "Failed to decode hex block parameter");
                JsonRpcError::invalid_params("couldn't decode hex number to big int")
            })
        }
    }
}

async fn latest_block(client: &KaonClient) -> TransformResult<u64> {
    let info = client.get_blockchain_info().await?;
    tracing::debug!(latest = info.blocks, "Got latest block");
    Ok(info.blocks)
}

/// Wei hex quantity to an amount, `default` when absent
pub fn eth_value_to_amount(value: Option<&str>, default: Amount) -> TransformResult<Amount> {
    match value.filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(hex) => Amount::from_wei_hex(hex).map_err(|e| JsonRpcError::invalid_params(e.to_string())),
    }
}

/// Ethereum gas price (wei hex) to the node's KAON-per-gas string,
/// clamped to the minimum the node accepts.
pub fn eth_gas_price_to_kaon(gas_price_hex: Option<&str>) -> TransformResult<String> {
    let minimum = minimum_gas_price();
    let price = match gas_price_hex.filter(|v| !v.is_empty()) {
        None => minimum,
        Some(hex) => Amount::from_wei_hex(hex)
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?
            .to_kaon(),
    };
    Ok(price.max(minimum).normalize().to_string())
}

/// `0x` + 16 zero-padded hex digits
pub fn format_kaon_nonce(nonce: u64) -> String {
    format!("0x{:016x}", nonce)
}
