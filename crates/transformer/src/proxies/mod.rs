// transformer/src/proxies/mod.rs

//! One proxy per Ethereum method.

pub mod accounts;
pub mod blocks;
pub mod call;
pub mod kaon;
pub mod logs;
pub mod network;
pub mod send;
pub mod subscribe;
pub mod transactions;

use crate::error::{JsonRpcError, TransformResult};
use crate::filters::FilterSimulator;
use crate::registry::EthProxy;
use kaon_client::KaonClient;
use kaon_core::decode_u64;
use serde_json::Value;
use std::sync::Arc;

static NULL: Value = Value::Null;

/// Every proxy the gateway serves
pub fn default_proxies(client: &KaonClient, filters: &Arc<FilterSimulator>) -> Vec<Arc<dyn EthProxy>> {
    let c = || client.clone();
    let mut proxies: Vec<Arc<dyn EthProxy>> = vec![
        // Blocks and transactions
        Arc::new(blocks::GetBlockByHash::new(c())),
        Arc::new(blocks::GetBlockByNumber::new(c())),
        Arc::new(blocks::BlockNumber::new(c())),
        Arc::new(transactions::GetTransactionByHash::new(c())),
        Arc::new(transactions::GetTransactionByBlockHashAndIndex::new(c())),
        Arc::new(transactions::GetTransactionByBlockNumberAndIndex::new(c())),
        Arc::new(transactions::GetTransactionReceipt::new(c())),
        // Execution
        Arc::new(call::Call::new(c())),
        Arc::new(call::EstimateGas::new(c())),
        // State
        Arc::new(accounts::GetBalance::new(c())),
        Arc::new(accounts::GetCode::new(c())),
        Arc::new(accounts::GetStorageAt::new(c())),
        Arc::new(accounts::GetTransactionCount::new(c())),
        Arc::new(accounts::Accounts::new(c())),
        Arc::new(accounts::Sign::new(c())),
        // Logs and filters
        Arc::new(logs::GetLogs::new(c())),
        Arc::new(logs::NewFilter::new(c(), filters.clone())),
        Arc::new(logs::NewBlockFilter::new(c(), filters.clone())),
        Arc::new(logs::GetFilterChanges::new(c(), filters.clone())),
        Arc::new(logs::GetFilterLogs::new(c(), filters.clone())),
        Arc::new(logs::UninstallFilter::new(filters.clone())),
        // Sending
        Arc::new(send::SendTransaction::new(c())),
        Arc::new(send::SignTransaction::new(c())),
        Arc::new(send::SendRawTransaction::new(c())),
        // Network
        Arc::new(network::ChainId::new(c())),
        Arc::new(network::NetVersion::new(c())),
        Arc::new(network::GasPrice::new(c())),
        Arc::new(network::Hashrate::new(c())),
        Arc::new(network::Mining::new(c())),
        Arc::new(network::NetListening::new(c())),
        Arc::new(network::NetPeerCount::new(c())),
        Arc::new(network::ClientVersion),
        Arc::new(network::Sha3),
        // Kaon extensions
        Arc::new(kaon::GetUtxos::new(c())),
        Arc::new(kaon::FromHexAddress::new(c())),
        Arc::new(kaon::GetHexAddress::new(c())),
        Arc::new(kaon::GenerateToAddress::new(c())),
        Arc::new(kaon::StringPassthrough::new(c(), "dev_gethexaddress", "gethexaddress")),
        Arc::new(kaon::StringPassthrough::new(c(), "dev_fromhexaddress", "fromhexaddress")),
        // Subscriptions
        Arc::new(subscribe::Subscribe),
        Arc::new(subscribe::Unsubscribe),
    ];
    proxies.extend(network::stubs());
    proxies
}

/// Positional parameter, `null` when absent
pub(crate) fn param(params: &[Value], index: usize) -> &Value {
    params.get(index).unwrap_or(&NULL)
}

pub(crate) fn string_param(params: &[Value], index: usize) -> TransformResult<&str> {
    match param(params, index) {
        Value::String(s) => Ok(s),
        Value::Null => Err(JsonRpcError::invalid_params(format!(
            "missing value for required argument {}",
            index
        ))),
        _ => Err(JsonRpcError::invalid_params(format!(
            "invalid argument {}: string expected",
            index
        ))),
    }
}

/// Object member, `null` when absent
pub(crate) fn field<'a>(object: &'a serde_json::Map<String, Value>, key: &str) -> &'a Value {
    object.get(key).unwrap_or(&NULL)
}

/// Absent and `null` read as false
pub(crate) fn bool_param(params: &[Value], index: usize) -> TransformResult<bool> {
    match param(params, index) {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        _ => Err(JsonRpcError::invalid_params(format!(
            "invalid argument {}: bool expected",
            index
        ))),
    }
}

/// A quantity that may come as a hex string or a plain number
pub(crate) fn quantity(value: &Value) -> TransformResult<Option<u64>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => decode_u64(s)
            .map(Some)
            .map_err(|e| JsonRpcError::invalid_params(e.to_string())),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| JsonRpcError::invalid_params(format!("invalid quantity {}", n))),
        other => Err(JsonRpcError::invalid_params(format!("invalid quantity {}", other))),
    }
}
