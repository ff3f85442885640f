// transformer/src/proxies/logs.rs

//! `eth_getLogs` and the polling filter family.

use super::{field, param, string_param};
use crate::conversion::{
    block_number_by_raw_param, extract_eth_logs, parse_filter_addresses, search_logs_and_filter_extra_topics,
    translate_topics,
};
use crate::error::{JsonRpcError, TransformResult};
use crate::eth::{EthLog, JsonRpcRequest};
use crate::filters::{Filter, FilterKind, FilterSimulator, LogFilterRequest};
use crate::registry::{EthProxy, RequestContext};
use async_trait::async_trait;
use kaon_client::types::SearchLogsRequest;
use kaon_client::KaonClient;
use kaon_core::{add_hex_prefix, decode_u64, encode_u64};
use serde_json::Value;
use std::sync::Arc;

/// Read a log filter object; block bounds default to `latest`
async fn parse_log_filter(client: &KaonClient, params: &[Value]) -> TransformResult<LogFilterRequest> {
    let object = match param(params, 0) {
        Value::Object(object) => object,
        Value::Null => return Ok(default_filter(client).await?),
        _ => return Err(JsonRpcError::invalid_params("invalid argument 0: filter object expected")),
    };

    let from_block = block_number_by_raw_param(client, field(object, "fromBlock"), true).await?;
    let to_block = block_number_by_raw_param(client, field(object, "toBlock"), true).await?;
    let addresses = parse_filter_addresses(field(object, "address"))?;
    let topics = match field(object, "topics") {
        Value::Null => Vec::new(),
        Value::Array(topics) => translate_topics(topics).map_err(JsonRpcError::invalid_params)?,
        other => {
            return Err(JsonRpcError::invalid_params(format!(
                "invalid topics {}, array expected",
                other
            )))
        }
    };

    Ok(LogFilterRequest {
        from_block,
        to_block,
        addresses,
        topics,
    })
}

async fn default_filter(client: &KaonClient) -> TransformResult<LogFilterRequest> {
    let latest = block_number_by_raw_param(client, &Value::Null, true).await?;
    Ok(LogFilterRequest {
        from_block: latest,
        to_block: latest,
        ..Default::default()
    })
}

/// Logs of `from..=to` matching a filter's addresses and topics
async fn logs_in_range(client: &KaonClient, filter: &LogFilterRequest, from: u64, to: u64) -> TransformResult<Vec<EthLog>> {
    let req = SearchLogsRequest {
        from_block: from,
        to_block: to,
        addresses: filter.addresses.clone(),
        topics: filter.topics.clone(),
        min_confirmations: None,
    };
    let receipts = search_logs_and_filter_extra_topics(client, &req).await?;
    Ok(receipts
        .iter()
        .flat_map(|receipt| extract_eth_logs(receipt, &receipt.log))
        .collect())
}

fn logs_value(logs: Vec<EthLog>) -> TransformResult<Value> {
    serde_json::to_value(logs).map_err(|e| JsonRpcError::Internal(e.to_string()))
}

fn filter_id(params: &[Value]) -> TransformResult<u64> {
    let raw = string_param(params, 0)?;
    decode_u64(raw).map_err(|_| JsonRpcError::invalid_params(format!("invalid filter id {}", raw)))
}

fn lookup(filters: &FilterSimulator, id: u64) -> TransformResult<Filter> {
    filters
        .filter(id)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("Invalid filter id {}", encode_u64(id))))
}

pub struct GetLogs {
    client: KaonClient,
}

impl GetLogs {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for GetLogs {
    fn method(&self) -> &str {
        "eth_getLogs"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let filter = parse_log_filter(&self.client, req.params()?).await?;
        let logs = logs_in_range(&self.client, &filter, filter.from_block, filter.to_block).await?;
        tracing::debug!(from = filter.from_block, to = filter.to_block, count = logs.len(), "Found logs");
        logs_value(logs)
    }
}

pub struct NewFilter {
    client: KaonClient,
    filters: Arc<FilterSimulator>,
}

impl NewFilter {
    pub fn new(client: KaonClient, filters: Arc<FilterSimulator>) -> Self {
        Self { client, filters }
    }
}

#[async_trait]
impl EthProxy for NewFilter {
    fn method(&self) -> &str {
        "eth_newFilter"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let request = parse_log_filter(&self.client, req.params()?).await?;
        let cursor = request.from_block;
        let filter = self.filters.new_filter(FilterKind::NewFilter, Some(request), cursor);
        Ok(Value::String(encode_u64(filter.id)))
    }
}

pub struct NewBlockFilter {
    client: KaonClient,
    filters: Arc<FilterSimulator>,
}

impl NewBlockFilter {
    pub fn new(client: KaonClient, filters: Arc<FilterSimulator>) -> Self {
        Self { client, filters }
    }
}

#[async_trait]
impl EthProxy for NewBlockFilter {
    fn method(&self) -> &str {
        "eth_newBlockFilter"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let count = self.client.get_block_count().await?;
        let filter = self.filters.new_filter(FilterKind::NewBlockFilter, None, count);
        self.client.generate_if_possible().await;
        Ok(Value::String(encode_u64(filter.id)))
    }
}

pub struct GetFilterChanges {
    client: KaonClient,
    filters: Arc<FilterSimulator>,
}

impl GetFilterChanges {
    pub fn new(client: KaonClient, filters: Arc<FilterSimulator>) -> Self {
        Self { client, filters }
    }

    async fn block_hashes(&self, filter: &Filter, count: u64) -> TransformResult<Vec<Value>> {
        let mut hashes = Vec::new();
        for height in filter.last_block_number.saturating_add(1)..=count {
            let hash = self
                .client
                .get_block_hash(height)
                .await
                .map_err(|e| JsonRpcError::upstream("couldn't get block hash", e))?;
            hashes.push(Value::String(add_hex_prefix(&hash)));
        }
        Ok(hashes)
    }
}

#[async_trait]
impl EthProxy for GetFilterChanges {
    fn method(&self) -> &str {
        "eth_getFilterChanges"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let filter = lookup(&self.filters, filter_id(req.params()?)?)?;
        let count = self.client.get_block_count().await?;

        let changes = match filter.kind {
            FilterKind::NewBlockFilter => Value::Array(self.block_hashes(&filter, count).await?),
            FilterKind::NewFilter => {
                if count <= filter.last_block_number {
                    return Ok(Value::Array(Vec::new()));
                }
                let request = filter.request.clone().unwrap_or_default();
                let logs = logs_in_range(&self.client, &request, filter.last_block_number + 1, count).await?;
                logs_value(logs)?
            }
            FilterKind::NewPendingTransactionFilter => {
                return Err(JsonRpcError::invalid_params("Unknown filter type"));
            }
        };

        self.filters.advance(filter.id, count);
        Ok(changes)
    }
}

/// Whole range of a log filter, the cursor stays put
pub struct GetFilterLogs {
    client: KaonClient,
    filters: Arc<FilterSimulator>,
}

impl GetFilterLogs {
    pub fn new(client: KaonClient, filters: Arc<FilterSimulator>) -> Self {
        Self { client, filters }
    }
}

#[async_trait]
impl EthProxy for GetFilterLogs {
    fn method(&self) -> &str {
        "eth_getFilterLogs"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let filter = lookup(&self.filters, filter_id(req.params()?)?)?;
        let Some(request) = filter.request.filter(|_| filter.kind == FilterKind::NewFilter) else {
            return Err(JsonRpcError::invalid_params("filter not found"));
        };

        let logs = logs_in_range(&self.client, &request, request.from_block, request.to_block).await?;
        logs_value(logs)
    }
}

pub struct UninstallFilter {
    filters: Arc<FilterSimulator>,
}

impl UninstallFilter {
    pub fn new(filters: Arc<FilterSimulator>) -> Self {
        Self { filters }
    }
}

#[async_trait]
impl EthProxy for UninstallFilter {
    fn method(&self) -> &str {
        "eth_uninstallFilter"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let id = filter_id(req.params()?)?;
        Ok(Value::Bool(self.filters.uninstall(id)))
    }
}
