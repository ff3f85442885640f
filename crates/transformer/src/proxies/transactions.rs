// transformer/src/proxies/transactions.rs

//! Transaction and receipt reconstruction.

use super::blocks::block_by_hash;
use super::{param, string_param};
use crate::conversion::{block_number_by_raw_param, extract_eth_logs, WEI_PER_SATOSHI};
use crate::error::{JsonRpcError, TransformResult};
use crate::eth::{EthTransaction, EthTransactionReceipt, JsonRpcRequest, EMPTY_LOGS_BLOOM, ZERO_ADDRESS, ZERO_WORD};
use crate::registry::{EthProxy, RequestContext};
use async_trait::async_trait;
use kaon_client::types::TransactionDetails;
use kaon_client::{KaonClient, KaonError};
use kaon_core::{add_hex_prefix, add_hex_prefix_if_not_empty, decode_u64, encode_big, encode_u64, Amount};
use num_bigint::BigUint;
use serde_json::Value;

/// Where a mined transaction sits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPosition {
    pub hash: String,
    pub number: u64,
    pub index: u64,
}

pub(crate) fn satoshi_to_wei_hex(satoshi: u64) -> String {
    encode_big(&(BigUint::from(satoshi) * WEI_PER_SATOSHI))
}

/// Look a transaction up by id. `None` when the node doesn't know it.
pub async fn transaction_by_hash(client: &KaonClient, hash: &str) -> TransformResult<Option<EthTransaction>> {
    let details = match client.get_raw_transaction(hash).await {
        Ok(details) => details,
        Err(KaonError::InvalidAddress(_)) | Err(KaonError::InvalidParameter(_)) | Err(KaonError::EmptyResponse) => {
            tracing::debug!(hash, "Transaction not found");
            return Ok(None);
        }
        Err(err) => return Err(JsonRpcError::upstream("couldn't get raw transaction", err)),
    };

    let position = block_position(client, &details).await?;
    format_transaction(client, &details, position).await.map(Some)
}

/// Height and index of a mined transaction, `None` while in the mempool
async fn block_position(client: &KaonClient, details: &TransactionDetails) -> TransformResult<Option<BlockPosition>> {
    if details.blockhash.is_empty() {
        return Ok(None);
    }

    let block = client
        .get_block(&details.blockhash, 1)
        .await
        .map_err(|e| JsonRpcError::upstream("couldn't get block", e))?;

    let index = block
        .tx_ids()
        .iter()
        .position(|id| id == &details.txid)
        .ok_or_else(|| JsonRpcError::callback(format!("transaction {} not found in its block", details.txid)))?;

    Ok(Some(BlockPosition {
        hash: details.blockhash.clone(),
        number: block.height,
        index: index as u64,
    }))
}

/// Shape a node transaction as an Ethereum one
pub async fn format_transaction(
    client: &KaonClient,
    details: &TransactionDetails,
    position: Option<BlockPosition>,
) -> TransformResult<EthTransaction> {
    let (info, is_contract) = details
        .contract_info()
        .map_err(|e| JsonRpcError::upstream("couldn't get contract info", e))?;

    let from = match &info.from {
        Some(from) => from.clone(),
        None => sender_of(client, details).await?,
    };

    let mut tx = EthTransaction {
        hash: add_hex_prefix(&details.txid),
        nonce: "0x0".to_string(),
        from: add_hex_prefix(&from),
        ..Default::default()
    };

    if let Some(position) = position {
        tx.block_hash = Some(add_hex_prefix(&position.hash));
        tx.block_number = Some(encode_u64(position.number));
        tx.transaction_index = Some(encode_u64(position.index));
    }

    if is_contract {
        tx.input = add_hex_prefix(&info.user_input);
        tx.to = info.to.as_deref().map(add_hex_prefix);
        tx.gas = encode_u64(info.gas_limit);
        tx.gas_price = satoshi_to_wei_hex(info.gas_price);
        tx.value = contract_value(details).to_hex();
    } else {
        tx.input = "0x".to_string();
        tx.to = info.to.as_deref().map(add_hex_prefix);
        tx.gas = "0x0".to_string();
        tx.gas_price = "0x0".to_string();
        tx.value = transfer_value(details, info.to.as_deref()).to_hex();
    }
    tx.gas_used = tx.gas.clone();
    tx.cumulative_gas = tx.gas.clone();

    Ok(tx)
}

/// Value attached to the contract output
fn contract_value(details: &TransactionDetails) -> Amount {
    details
        .vout
        .iter()
        .filter(|out| {
            let op = out.script_pub_key.final_op();
            op == Some(kaon_core::asm::OP_CALL) || op == Some(kaon_core::asm::OP_CREATE)
        })
        .map(|out| out.value)
        .sum()
}

/// Outputs paying the recipient, all outputs when it is unknown
fn transfer_value(details: &TransactionDetails, to: Option<&str>) -> Amount {
    match to {
        Some(to) => details
            .vout
            .iter()
            .filter(|out| out.script_pub_key.first_hex_address().as_deref() == Some(to))
            .map(|out| out.value)
            .sum(),
        None => details.total_output(),
    }
}

/// Hex sender of a transaction without OP_SENDER: the first input address,
/// else the output it spends. Generated transactions have none.
async fn sender_of(client: &KaonClient, details: &TransactionDetails) -> TransformResult<String> {
    if let Some(address) = details.first_input_address() {
        return client
            .base58_to_hex(address)
            .await
            .map_err(|e| JsonRpcError::upstream("couldn't convert sender address", e));
    }

    let Some(input) = details.vin.iter().find(|vin| !vin.txid.is_empty()) else {
        return Ok(ZERO_ADDRESS.to_string());
    };

    let previous = match client.get_raw_transaction(&input.txid).await {
        Ok(previous) => previous,
        Err(KaonError::Shutdown) => return Err(JsonRpcError::Shutdown),
        Err(err) => {
            tracing::debug!(error = %err, txid = %input.txid, "Couldn't load spent transaction");
            return Ok(ZERO_ADDRESS.to_string());
        }
    };

    Ok(usize::try_from(input.vout)
        .ok()
        .and_then(|n| previous.vout.get(n))
        .and_then(|out| out.script_pub_key.first_hex_address())
        .unwrap_or_else(|| ZERO_ADDRESS.to_string()))
}

fn to_value<T: serde::Serialize>(value: T) -> TransformResult<Value> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::Internal(e.to_string()))
}

pub struct GetTransactionByHash {
    client: KaonClient,
}

impl GetTransactionByHash {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for GetTransactionByHash {
    fn method(&self) -> &str {
        "eth_getTransactionByHash"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let hash = string_param(req.params()?, 0)?;
        if hash.is_empty() {
            return Err(JsonRpcError::invalid_params("transaction hash is empty"));
        }

        match transaction_by_hash(&self.client, hash).await? {
            Some(tx) => to_value(tx),
            None => Ok(Value::Null),
        }
    }
}

/// Transaction at `index` of the block `hash`, `None` past the end
async fn transaction_in_block(client: &KaonClient, hash: &str, index: u64) -> TransformResult<Option<EthTransaction>> {
    let block = match block_by_hash(client, hash, false).await? {
        Some(block) => block,
        None => return Ok(None),
    };

    let Some(txid) = usize::try_from(index).ok().and_then(|i| block.transactions.get(i)).and_then(Value::as_str)
    else {
        return Ok(None);
    };

    let details = match client.get_raw_transaction(txid).await {
        Ok(details) => details,
        Err(KaonError::InvalidAddress(_)) | Err(KaonError::InvalidParameter(_)) => return Ok(None),
        Err(err) => return Err(JsonRpcError::upstream("couldn't get raw transaction", err)),
    };

    let position = BlockPosition {
        hash: kaon_core::remove_hex_prefix(&block.hash).to_string(),
        number: decode_u64(&block.number).unwrap_or(0),
        index,
    };
    format_transaction(client, &details, Some(position)).await.map(Some)
}

fn index_param(params: &[Value]) -> TransformResult<u64> {
    let raw = string_param(params, 1)?;
    decode_u64(raw).map_err(|_| JsonRpcError::invalid_params("invalid argument 1: hex string expected"))
}

pub struct GetTransactionByBlockHashAndIndex {
    client: KaonClient,
}

impl GetTransactionByBlockHashAndIndex {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for GetTransactionByBlockHashAndIndex {
    fn method(&self) -> &str {
        "eth_getTransactionByBlockHashAndIndex"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let params = req.params()?;
        let hash = string_param(params, 0)?;
        if hash.is_empty() {
            return Err(JsonRpcError::invalid_params("invalid argument 0: empty hex string"));
        }
        let index = index_param(params)?;

        match transaction_in_block(&self.client, hash, index).await? {
            Some(tx) => to_value(tx),
            None => Ok(Value::Null),
        }
    }
}

pub struct GetTransactionByBlockNumberAndIndex {
    client: KaonClient,
}

impl GetTransactionByBlockNumberAndIndex {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for GetTransactionByBlockNumberAndIndex {
    fn method(&self) -> &str {
        "eth_getTransactionByBlockNumberAndIndex"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let params = req.params()?;
        if matches!(param(params, 0), Value::String(s) if s.is_empty()) {
            return Err(JsonRpcError::invalid_params("invalid argument 0: empty hex string"));
        }
        let index = index_param(params)?;

        let number = block_number_by_raw_param(&self.client, param(params, 0), false).await?;
        let hash = match self.client.get_block_hash(number).await {
            Ok(hash) => hash,
            Err(KaonError::InvalidParameter(_)) => return Ok(Value::Null),
            Err(err) => return Err(JsonRpcError::upstream("couldn't get block hash", err)),
        };

        match transaction_in_block(&self.client, &hash, index).await? {
            Some(tx) => to_value(tx),
            None => Ok(Value::Null),
        }
    }
}

pub struct GetTransactionReceipt {
    client: KaonClient,
}

impl GetTransactionReceipt {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }

    async fn receipt(&self, hash: &str) -> TransformResult<Option<EthTransactionReceipt>> {
        let receipt = match self.client.get_transaction_receipt(hash).await {
            Ok(receipt) => receipt,
            Err(KaonError::Shutdown) => return Err(JsonRpcError::Shutdown),
            Err(err) => {
                tracing::debug!(error = %err, hash, "No contract receipt, rebuilding from the transaction");
                return self.plain_receipt(hash, err).await;
            }
        };

        let status = if receipt.succeeded() { "0x1" } else { "0x0" };
        let mut eth_receipt = EthTransactionReceipt {
            transaction_hash: add_hex_prefix(&receipt.transaction_hash),
            transaction_index: Some(encode_u64(receipt.transaction_index)),
            block_hash: Some(add_hex_prefix(&receipt.block_hash)),
            block_number: Some(encode_u64(receipt.block_number)),
            from: Some(add_hex_prefix_if_not_empty(&receipt.from)).filter(|s| !s.is_empty()),
            to: Some(add_hex_prefix_if_not_empty(&receipt.to)).filter(|s| !s.is_empty()),
            effective_gas_price: satoshi_to_wei_hex(receipt.effective_gas_price),
            cumulative_gas_used: encode_u64(receipt.cumulative_gas_used),
            gas_used: encode_u64(receipt.gas_used),
            contract_address: Some(add_hex_prefix_if_not_empty(&receipt.contract_address)).filter(|s| !s.is_empty()),
            logs: extract_eth_logs(&receipt, &receipt.log),
            logs_bloom: EMPTY_LOGS_BLOOM.to_string(),
            status: status.to_string(),
        };

        let details = self
            .client
            .get_raw_transaction(hash)
            .await
            .map_err(|e| JsonRpcError::upstream("couldn't get transaction", e))?;
        if details.is_contract_creation() {
            eth_receipt.to = None;
        } else {
            eth_receipt.contract_address = None;
        }

        if eth_receipt.block_hash.as_deref() == Some(ZERO_WORD) {
            eth_receipt.contract_address = None;
            eth_receipt.block_number = None;
            eth_receipt.block_hash = None;
        }

        Ok(Some(eth_receipt))
    }

    /// Receipt of a transaction without contract execution, e.g. a reward
    async fn plain_receipt(&self, hash: &str, cause: KaonError) -> TransformResult<Option<EthTransactionReceipt>> {
        let tx = match transaction_by_hash(&self.client, hash).await {
            Ok(Some(tx)) => tx,
            Ok(None) if matches!(cause, KaonError::EmptyResponse) => return Ok(None),
            Ok(None) => return Err(JsonRpcError::upstream("couldn't get transaction receipt", cause)),
            Err(err) => return Err(err),
        };

        Ok(Some(EthTransactionReceipt {
            transaction_hash: tx.hash,
            transaction_index: tx.transaction_index,
            block_hash: tx.block_hash,
            block_number: tx.block_number,
            from: Some(tx.from),
            to: tx.to,
            effective_gas_price: tx.gas_price,
            cumulative_gas_used: tx.cumulative_gas,
            gas_used: tx.gas,
            contract_address: None,
            logs: Vec::new(),
            logs_bloom: EMPTY_LOGS_BLOOM.to_string(),
            status: "0x1".to_string(),
        }))
    }
}

#[async_trait]
impl EthProxy for GetTransactionReceipt {
    fn method(&self) -> &str {
        "eth_getTransactionReceipt"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let hash = string_param(req.params()?, 0)?;
        if hash.is_empty() {
            return Err(JsonRpcError::invalid_params("empty transaction hash"));
        }

        match self.receipt(hash).await? {
            Some(receipt) => to_value(receipt),
            None => Ok(Value::Null),
        }
    }
}
