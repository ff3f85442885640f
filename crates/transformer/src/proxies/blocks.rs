// transformer/src/proxies/blocks.rs

//! Block reconstruction: `eth_getBlockByHash`, `eth_getBlockByNumber`,
//! `eth_blockNumber`.

use super::transactions::{format_transaction, transaction_by_hash, BlockPosition};
use super::{bool_param, param, string_param};
use crate::conversion::{block_number_by_raw_param, format_kaon_nonce};
use crate::error::{JsonRpcError, TransformResult};
use crate::eth::{
    EthBlock, JsonRpcRequest, DEFAULT_BLOCK_GAS_LIMIT, DEFAULT_SHA3_UNCLES, EMPTY_LOGS_BLOOM, ZERO_ADDRESS,
    ZERO_WORD,
};
use crate::registry::{EthProxy, RequestContext};
use async_trait::async_trait;
use kaon_client::types::TransactionDetails;
use kaon_client::{KaonClient, KaonError};
use kaon_core::{add_hex_prefix, encode_u64, remove_hex_prefix};
use serde_json::Value;
use std::sync::Arc;

/// Secondary source mapping an Ethereum block hash to the node's hash.
///
/// Consulted alongside the node when a lookup by hash finds nothing.
#[async_trait]
pub trait BlockHashResolver: Send + Sync {
    async fn kaon_block_hash(&self, eth_hash: &str) -> Result<Option<String>, String>;
}

pub struct GetBlockByHash {
    client: KaonClient,
    resolver: Option<Arc<dyn BlockHashResolver>>,
}

impl GetBlockByHash {
    pub fn new(client: KaonClient) -> Self {
        Self { client, resolver: None }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn BlockHashResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Primary lookup and resolver lookup run together. The primary answer
    /// wins unless it found nothing or failed.
    async fn lookup(&self, hash: &str, full: bool) -> TransformResult<Option<EthBlock>> {
        let Some(resolver) = &self.resolver else {
            return block_by_hash(&self.client, hash, full).await;
        };

        let secondary = async {
            match resolver.kaon_block_hash(hash).await {
                Ok(Some(kaon_hash)) => block_by_hash(&self.client, &kaon_hash, full).await.ok().flatten(),
                Ok(None) => None,
                Err(err) => {
                    tracing::debug!(error = %err, hash, "Block hash resolver failed");
                    None
                }
            }
        };
        let (primary, secondary) = tokio::join!(block_by_hash(&self.client, hash, full), secondary);

        match primary {
            Ok(Some(block)) => Ok(Some(block)),
            Ok(None) => Ok(secondary),
            Err(err) => secondary.map(Some).ok_or(err),
        }
    }
}

#[async_trait]
impl EthProxy for GetBlockByHash {
    fn method(&self) -> &str {
        "eth_getBlockByHash"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let params = req.params()?;
        let hash = string_param(params, 0)?;
        let full = bool_param(params, 1)?;

        let block = self.lookup(hash, full).await?;
        Ok(block.map(to_value).transpose()?.unwrap_or(Value::Null))
    }
}

pub struct GetBlockByNumber {
    client: KaonClient,
}

impl GetBlockByNumber {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for GetBlockByNumber {
    fn method(&self) -> &str {
        "eth_getBlockByNumber"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let params = req.params()?;
        let full = bool_param(params, 1)?;

        let number = block_number_by_raw_param(&self.client, param(params, 0), false)
            .await
            .map_err(|e| match e {
                JsonRpcError::Shutdown | JsonRpcError::InvalidParams(_) => e,
                e => JsonRpcError::callback(format!("couldn't get block number by parameter: {}", e)),
            })?;

        let hash = match self.client.get_block_hash(number).await {
            Ok(hash) => hash,
            Err(KaonError::InvalidParameter(_)) => return Ok(Value::Null),
            Err(err) => return Err(JsonRpcError::upstream("unexpected error", err)),
        };

        let block = block_by_hash(&self.client, &hash, full).await?;
        Ok(block.map(to_value).transpose()?.unwrap_or(Value::Null))
    }
}

pub struct BlockNumber {
    client: KaonClient,
}

impl BlockNumber {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for BlockNumber {
    fn method(&self) -> &str {
        "eth_blockNumber"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let count = self.client.get_block_count().await?;
        Ok(Value::String(encode_u64(count)))
    }
}

fn to_value(block: EthBlock) -> TransformResult<Value> {
    serde_json::to_value(block).map_err(|e| JsonRpcError::Internal(e.to_string()))
}

/// Rebuild an Ethereum block from the node's header and block. `None` when
/// the node doesn't know the hash.
pub async fn block_by_hash(client: &KaonClient, hash: &str, full: bool) -> TransformResult<Option<EthBlock>> {
    let hash = remove_hex_prefix(hash);

    let header = match client.get_block_header(hash).await {
        Ok(header) => header,
        Err(KaonError::InvalidAddress(_)) | Err(KaonError::InvalidParameter(_)) => {
            tracing::debug!(hash, "Block not found");
            return Ok(None);
        }
        Err(err) => return Err(JsonRpcError::upstream("couldn't get block header", err)),
    };

    let verbosity = if full { 2 } else { 1 };
    let block = client
        .get_block(hash, verbosity)
        .await
        .map_err(|e| JsonRpcError::upstream("couldn't get block", e))?;

    let difficulty = encode_u64(header.difficulty as u64);
    let mut eth_block = EthBlock {
        hash: add_hex_prefix(&header.hash),
        number: encode_u64(header.height),
        nonce: format_kaon_nonce(block.nonce),
        size: encode_u64(block.size),
        timestamp: encode_u64(header.time),
        logs_bloom: EMPTY_LOGS_BLOOM.to_string(),
        extra_data: ZERO_WORD.to_string(),
        state_root: add_hex_prefix(&header.hash_state_root),
        transactions_root: add_hex_prefix(&header.merkleroot),
        receipts_root: add_hex_prefix(&header.merkleroot),
        difficulty: difficulty.clone(),
        total_difficulty: difficulty,
        gas_limit: add_hex_prefix(DEFAULT_BLOCK_GAS_LIMIT),
        gas_used: encode_u64(header.gas_used),
        sha3_uncles: DEFAULT_SHA3_UNCLES.to_string(),
        uncles: Vec::new(),
        ..Default::default()
    };

    if header.is_genesis() {
        eth_block.parent_hash = ZERO_WORD.to_string();
        eth_block.miner = add_hex_prefix(ZERO_ADDRESS);
    } else {
        eth_block.parent_hash = add_hex_prefix(&header.previousblockhash);
        let proposer = if header.proposer.is_empty() { &block.proposer } else { &header.proposer };
        eth_block.miner = if proposer.is_empty() {
            add_hex_prefix(ZERO_ADDRESS)
        } else {
            add_hex_prefix(proposer)
        };
    }

    eth_block.transactions = if full {
        full_transactions(client, &block.hash, header.height, &block.tx).await?
    } else {
        block.tx_ids().iter().map(|id| Value::String(add_hex_prefix(id))).collect()
    };

    Ok(Some(eth_block))
}

/// Embedded transactions of a verbosity 2 block, cumulative gas running
/// over the block
async fn full_transactions(
    client: &KaonClient,
    block_hash: &str,
    height: u64,
    entries: &[Value],
) -> TransformResult<Vec<Value>> {
    let mut transactions = Vec::with_capacity(entries.len());
    let mut cumulative: u64 = 0;

    for (index, entry) in entries.iter().enumerate() {
        let tx = match entry {
            Value::String(txid) => match transaction_by_hash(client, txid).await? {
                Some(tx) => tx,
                None if height == 0 => {
                    tracing::debug!(txid = %txid, "Skipping unknown genesis transaction");
                    continue;
                }
                None if client.options().ignore_unknown_transactions => {
                    tracing::warn!(txid = %txid, "Skipping unknown transaction in block");
                    continue;
                }
                None => {
                    return Err(JsonRpcError::callback(format!(
                        "couldn't get transaction by hash included in a block: {}",
                        txid
                    )))
                }
            },
            Value::Object(_) => {
                let details: TransactionDetails = match serde_json::from_value(entry.clone()) {
                    Ok(details) => details,
                    Err(err) => {
                        tracing::debug!(error = %err, index, "Skipping undecodable block transaction");
                        continue;
                    }
                };
                let position = BlockPosition {
                    hash: block_hash.to_string(),
                    number: height,
                    index: index as u64,
                };
                match format_transaction(client, &details, Some(position)).await {
                    Ok(tx) => tx,
                    Err(JsonRpcError::Shutdown) => return Err(JsonRpcError::Shutdown),
                    Err(err) => {
                        tracing::debug!(error = %err, txid = %details.txid, "Skipping transaction");
                        continue;
                    }
                }
            }
            _ => continue,
        };

        let mut tx = tx;
        let gas = kaon_core::decode_u64(&tx.gas).unwrap_or(0);
        tx.gas_used = tx.gas.clone();
        tx.cumulative_gas = encode_u64(cumulative);
        cumulative = cumulative.saturating_add(gas);

        transactions.push(serde_json::to_value(tx).map_err(|e| JsonRpcError::Internal(e.to_string()))?);
    }

    Ok(transactions)
}
