// transformer/src/proxies/network.rs

//! Chain identity, node status, and the fixed answers for methods a
//! proof-of-stake UTXO chain has no equivalent for.

use super::string_param;
use crate::conversion::WEI_PER_SATOSHI;
use crate::error::{JsonRpcError, TransformResult};
use crate::eth::JsonRpcRequest;
use crate::registry::{EthProxy, RequestContext};
use async_trait::async_trait;
use kaon_client::KaonClient;
use kaon_core::{encode_big, encode_u64, remove_hex_prefix};
use kaon_crypto::keccak256;
use num_bigint::BigUint;
use serde_json::{json, Value};
use std::sync::Arc;

/// Reported by `web3_clientVersion`
pub const CLIENT_NAME: &str = "eth-rpc-gate";

/// Declares a proxy that only needs the node handle
macro_rules! client_proxy {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            client: KaonClient,
        }

        impl $name {
            pub fn new(client: KaonClient) -> Self {
                Self { client }
            }
        }
    };
}

client_proxy!(ChainId);
client_proxy!(
    /// Same value as `eth_chainId`
    NetVersion
);
client_proxy!(GasPrice);
client_proxy!(
    /// Staking difficulty, bit-cast to an integer
    Hashrate
);
client_proxy!(Mining);
client_proxy!(NetListening);
client_proxy!(NetPeerCount);

async fn chain_id_hex(client: &KaonClient) -> TransformResult<Value> {
    let id = client
        .chain_id()
        .await
        .map_err(|e| JsonRpcError::upstream("couldn't get chain id", e))?;
    Ok(Value::String(encode_u64(id)))
}

#[async_trait]
impl EthProxy for ChainId {
    fn method(&self) -> &str {
        "eth_chainId"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        chain_id_hex(&self.client).await
    }
}

#[async_trait]
impl EthProxy for NetVersion {
    fn method(&self) -> &str {
        "net_version"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        chain_id_hex(&self.client).await
    }
}

#[async_trait]
impl EthProxy for GasPrice {
    fn method(&self) -> &str {
        "eth_gasPrice"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let satoshi = self
            .client
            .get_gas_price()
            .await
            .map_err(|e| JsonRpcError::callback(e.to_string()))?;
        let wei = BigUint::from(satoshi) * BigUint::from(WEI_PER_SATOSHI);
        Ok(Value::String(encode_big(&wei)))
    }
}

#[async_trait]
impl EthProxy for Hashrate {
    fn method(&self) -> &str {
        "eth_hashrate"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let info = self
            .client
            .get_staking_info()
            .await
            .map_err(|e| JsonRpcError::callback(e.to_string()))?;
        Ok(Value::String(encode_u64(info.difficulty.to_bits())))
    }
}

#[async_trait]
impl EthProxy for Mining {
    fn method(&self) -> &str {
        "eth_mining"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let info = self
            .client
            .get_staking_info()
            .await
            .map_err(|e| JsonRpcError::callback(e.to_string()))?;
        Ok(Value::Bool(info.staking))
    }
}

#[async_trait]
impl EthProxy for NetListening {
    fn method(&self) -> &str {
        "net_listening"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let info = self.client.get_network_info().await.map_err(|e| {
            tracing::debug!(error = %e, "Failed to query network info");
            JsonRpcError::callback(e.to_string())
        })?;
        tracing::debug!(active = info.networkactive, "Network state");
        Ok(Value::Bool(info.networkactive))
    }
}

#[async_trait]
impl EthProxy for NetPeerCount {
    fn method(&self) -> &str {
        "net_peerCount"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let peers = self
            .client
            .get_peer_info()
            .await
            .map_err(|e| JsonRpcError::callback(e.to_string()))?;
        Ok(Value::String(encode_u64(peers.len() as u64)))
    }
}

pub struct ClientVersion;

impl ClientVersion {
    pub fn version() -> String {
        format!(
            "{}/{}/{}-{}/rust",
            CLIENT_NAME,
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        )
    }
}

#[async_trait]
impl EthProxy for ClientVersion {
    fn method(&self) -> &str {
        "web3_clientVersion"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        Ok(Value::String(Self::version()))
    }
}

/// Keccak-256 of hex-encoded data
pub struct Sha3;

#[async_trait]
impl EthProxy for Sha3 {
    fn method(&self) -> &str {
        "web3_sha3"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let params = req.params()?;
        if params.len() > 1 {
            return Err(JsonRpcError::invalid_params("too many arguments, want at most 1"));
        }
        let data = string_param(params, 0)?;
        let bytes = hex::decode(remove_hex_prefix(data))
            .map_err(|e| JsonRpcError::invalid_params(format!("invalid argument 0: {}", e)))?;
        Ok(Value::String(format!("0x{}", hex::encode(keccak256(&bytes)))))
    }
}

/// A method with a fixed answer
pub struct StaticProxy {
    method: &'static str,
    value: Value,
}

impl StaticProxy {
    pub fn new(method: &'static str, value: Value) -> Self {
        Self { method, value }
    }
}

#[async_trait]
impl EthProxy for StaticProxy {
    fn method(&self) -> &str {
        self.method
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        Ok(self.value.clone())
    }
}

/// Uncles, compilers and the like
pub fn stubs() -> Vec<Arc<dyn EthProxy>> {
    [
        ("eth_protocolVersion", json!("0x41")),
        ("personal_unlockAccount", json!(true)),
        ("eth_getCompilers", json!([])),
        ("eth_getUncleByBlockHashAndIndex", Value::Null),
        ("eth_getUncleCountByBlockHash", json!("0x0")),
        ("eth_getUncleCountByBlockNumber", json!("0x0")),
    ]
    .into_iter()
    .map(|(method, value)| Arc::new(StaticProxy::new(method, value)) as Arc<dyn EthProxy>)
    .collect()
}
