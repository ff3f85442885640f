// transformer/src/proxies/kaon.rs

//! Kaon-specific extensions: UTXO listing, address conversion and
//! regtest block generation.

use super::param;
use crate::error::{JsonRpcError, TransformResult};
use crate::eth::{JsonRpcRequest, KaonUtxo};
use crate::registry::{EthProxy, RequestContext};
use async_trait::async_trait;
use kaon_client::KaonClient;
use kaon_core::{add_hex_prefix, is_eth_hex_address, remove_hex_prefix, Amount, UtxoScriptType};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashSet;

/// Parsed `kaon_getUTXOs` parameters:
/// `[address, minSumAmount?, ...types]` where the amount may be left out
/// and the types start right after the address.
#[derive(Debug, Clone, PartialEq)]
pub struct GetUtxosRequest {
    pub address: String,
    /// KAON; zero means return everything
    pub min_sum: Decimal,
    /// Empty means every type
    pub types: HashSet<UtxoScriptType>,
}

impl GetUtxosRequest {
    pub fn from_params(params: &[Value]) -> TransformResult<Self> {
        let unmarshal = || JsonRpcError::invalid_params("couldn't unmarshal request parameters");
        let strings = params
            .iter()
            .map(|p| p.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .ok_or_else(unmarshal)?;

        let (address, rest) = strings.split_first().ok_or_else(unmarshal)?;

        let mut min_sum = Decimal::ZERO;
        let mut type_names = rest;
        if let Some((first, tail)) = rest.split_first() {
            match first.parse::<Decimal>() {
                Ok(amount) => {
                    min_sum = amount;
                    type_names = tail;
                }
                Err(_) if first.parse::<UtxoScriptType>().is_ok() => {}
                Err(_) => return Err(unmarshal()),
            }
        }

        let mut types: HashSet<UtxoScriptType> = type_names.iter().filter_map(|name| name.parse().ok()).collect();
        if !type_names.is_empty() && types.is_empty() {
            return Err(JsonRpcError::invalid_params("unknown script type requested"));
        }
        if types.contains(&UtxoScriptType::All) {
            types.clear();
        }

        if !is_eth_hex_address(address) {
            return Err(JsonRpcError::invalid_params("couldn't validate parameters value"));
        }

        Ok(Self {
            address: address.clone(),
            min_sum,
            types,
        })
    }

    fn all_types(&self) -> bool {
        self.types.is_empty()
    }

    fn wants(&self, kind: UtxoScriptType) -> bool {
        self.all_types() || self.types.contains(&kind)
    }
}

pub struct GetUtxos {
    client: KaonClient,
}

impl GetUtxos {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }

    async fn utxos(&self, req: &GetUtxosRequest) -> TransformResult<Vec<KaonUtxo>> {
        let address = self
            .client
            .hex_to_base58(remove_hex_prefix(&req.address))
            .await
            .map_err(|_| JsonRpcError::invalid_params("couldn't convert Ethereum address to Kaon address"))?;

        let utxos = self.client.get_address_utxos(&[address]).await?;
        let block_count = self.client.get_block_count().await?;
        let mature_after = self.client.mature_block_height();

        let minimum = Amount::from_kaon(req.min_sum).map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
        let querying_all = minimum.is_zero();

        let mut selected = Vec::new();
        let mut sum = Amount::zero();
        for utxo in utxos {
            let kind = UtxoScriptType::classify(&utxo.script, None);
            if !req.wants(kind) {
                continue;
            }

            let mut safe = true;
            if utxo.is_stake && block_count <= utxo.height.saturating_add(mature_after) {
                safe = false;
                if !req.wants(UtxoScriptType::Immature) {
                    continue;
                }
            }

            let confirmations = block_count as i64 - utxo.height as i64;
            if confirmations < 0 {
                tracing::error!(block_count, height = utxo.height, txid = %utxo.txid, "Computed negative confirmations");
                return Err(JsonRpcError::Internal(format!(
                    "computed negative confirmations: {} - {} = {}",
                    block_count, utxo.height, confirmations
                )));
            }

            if safe {
                sum = sum + utxo.satoshis;
            }
            selected.push(KaonUtxo {
                address: utxo.address,
                txid: utxo.txid,
                vout: utxo.output_index,
                amount: utxo.satoshis.to_kaon().normalize().to_string(),
                safe,
                spendable: true,
                confirmations,
                height: utxo.height,
                kind: kind.to_string(),
                script_pub_key: utxo.script,
                redeem_script: None,
            });

            if !querying_all && sum >= minimum {
                return Ok(selected);
            }
        }

        if querying_all {
            return Ok(selected);
        }
        Err(JsonRpcError::callback(
            "required minimum amount is greater than total amount of UTXOs",
        ))
    }
}

#[async_trait]
impl EthProxy for GetUtxos {
    fn method(&self) -> &str {
        "kaon_getUTXOs"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let request = GetUtxosRequest::from_params(req.params()?)?;
        let utxos = self.utxos(&request).await?;
        serde_json::to_value(utxos).map_err(|e| JsonRpcError::Internal(e.to_string()))
    }
}

/// First param as a non-empty string
fn address_param(params: &[Value]) -> TransformResult<&str> {
    if params.is_empty() {
        return Err(JsonRpcError::invalid_params("params must be set"));
    }
    let address = param(params, 0)
        .as_str()
        .ok_or_else(|| JsonRpcError::callback("json unmarshal: string expected"))?;
    if address.is_empty() {
        return Err(JsonRpcError::invalid_params("address is empty"));
    }
    Ok(address)
}

/// Hex key id to base58
pub struct FromHexAddress {
    client: KaonClient,
}

impl FromHexAddress {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for FromHexAddress {
    fn method(&self) -> &str {
        "kaon_fromhexaddress"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let address = address_param(req.params()?)?;
        if !is_eth_hex_address(address) {
            return Err(JsonRpcError::invalid_params("address is invalid"));
        }

        let base58 = self
            .client
            .from_hex_address(remove_hex_prefix(address))
            .await
            .map_err(|e| JsonRpcError::callback(e.to_string()))?;
        Ok(Value::String(base58))
    }
}

/// Base58 to hex key id, with the node handling script-hash and bech32
pub struct GetHexAddress {
    client: KaonClient,
}

impl GetHexAddress {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for GetHexAddress {
    fn method(&self) -> &str {
        "kaon_gethexaddress"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let address = address_param(req.params()?)?;
        let hex = self
            .client
            .base58_to_hex(address)
            .await
            .map_err(|e| JsonRpcError::callback(e.to_string()))?;
        Ok(Value::String(add_hex_prefix(&hex)))
    }
}

/// `dev_generatetoaddress [blocks, address]`, regtest only
pub struct GenerateToAddress {
    client: KaonClient,
}

impl GenerateToAddress {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

fn block_count_param(value: &Value) -> TransformResult<i64> {
    match value {
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| JsonRpcError::invalid_params("Couldn't parse blocks")),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| JsonRpcError::invalid_params("Couldn't parse blocks")),
        other => Err(JsonRpcError::invalid_params(format!("Unknown blocks type: {}", other))),
    }
}

#[async_trait]
impl EthProxy for GenerateToAddress {
    fn method(&self) -> &str {
        "dev_generatetoaddress"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        if !self.client.can_generate().await {
            return Err(JsonRpcError::invalid_request("Can only generate on regtest"));
        }

        let params = req.params()?;
        if params.len() != 2 {
            return Err(JsonRpcError::invalid_params(
                "require 2 arguments: blocks, the base58/hex address to mine rewards to",
            ));
        }
        let target = params[1]
            .as_str()
            .ok_or_else(|| JsonRpcError::invalid_params("second parameter must be string"))?;
        let blocks = block_count_param(&params[0])?;
        if blocks <= 0 {
            return Err(JsonRpcError::invalid_params("Blocks to generate must be > 0"));
        }

        // Hex first, else assume it is already base58
        let address = match self.client.from_hex_address(remove_hex_prefix(target)).await {
            Ok(base58) => base58,
            Err(_) => target.to_string(),
        };

        let hashes = self
            .client
            .generate_to_address(blocks as u64, &address, None)
            .await
            .map_err(|e| JsonRpcError::invalid_request(e.to_string()))?;
        tracing::debug!(blocks, address = %address, "Generated blocks");
        Ok(Value::from(hashes))
    }
}

/// Forwards a single string argument to a native method as-is
pub struct StringPassthrough {
    client: KaonClient,
    method: &'static str,
    native: &'static str,
}

impl StringPassthrough {
    pub fn new(client: KaonClient, method: &'static str, native: &'static str) -> Self {
        Self { client, method, native }
    }
}

#[async_trait]
impl EthProxy for StringPassthrough {
    fn method(&self) -> &str {
        self.method
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let params = req.params()?;
        if params.iter().any(|p| !p.is_string()) {
            return Err(JsonRpcError::invalid_params("couldn't unmarshal request parameters"));
        }
        if params.len() != 1 {
            return Err(JsonRpcError::invalid_params("require 1 argument: the base58 Kaon address"));
        }

        self.client
            .request_raw(self.native, Value::Array(params.to_vec()))
            .await
            .map_err(|e| JsonRpcError::invalid_request(e.to_string()))
    }
}
