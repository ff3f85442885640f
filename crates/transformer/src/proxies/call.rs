// transformer/src/proxies/call.rs

//! `eth_call` and `eth_estimateGas` over `callcontract`.

use super::accounts::balance_of;
use super::{param, quantity};
use crate::conversion::MINIMUM_GAS_LIMIT;
use crate::error::{JsonRpcError, TransformResult};
use crate::eth::{JsonRpcRequest, ZERO_ADDRESS};
use crate::registry::{EthProxy, RequestContext};
use async_trait::async_trait;
use kaon_client::types::CallContractResponse;
use kaon_client::{KaonClient, KaonError};
use kaon_core::{add_hex_with_length_prefix, encode_u64, is_eth_hex_address, remove_hex_prefix};
use serde::Deserialize;
use serde_json::Value;

/// Calls asking for more gas than this are answered with empty output
pub const MAX_CALL_GAS: u64 = 90_000_000;

const NATIVE_TOKEN_SYMBOL: &str = "KAON";

const SELECTOR_BALANCE_OF: &str = "70a08231";
const SELECTOR_NAME: &str = "06fdde03";
const SELECTOR_TOTAL_SUPPLY: &str = "18160ddd";
const SELECTOR_DECIMALS: &str = "313ce567";
const SELECTOR_SYMBOL: &str = "95d89b41";

/// Call object shared by `eth_call` and `eth_estimateGas`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallRequest {
    pub from: String,
    pub to: String,
    pub gas: Value,
    #[serde(rename = "gasPrice")]
    pub gas_price: Value,
    pub value: String,
    #[serde(alias = "input")]
    pub data: String,
}

impl CallRequest {
    fn from_params(params: &[Value]) -> TransformResult<Self> {
        match param(params, 0) {
            obj @ Value::Object(_) => serde_json::from_value(obj.clone())
                .map_err(|e| JsonRpcError::invalid_params(format!("invalid argument 0: {}", e))),
            _ => Err(JsonRpcError::invalid_params("invalid argument 0: call object expected")),
        }
    }
}

/// Run `callcontract` for a call object. The sender goes to the node in
/// base58 when it is given as hex.
async fn call_contract(client: &KaonClient, req: &CallRequest, gas: Option<u64>) -> Result<CallContractResponse, KaonError> {
    if let Some(gas) = gas {
        if gas < MINIMUM_GAS_LIMIT {
            tracing::warn!(gas, minimum = MINIMUM_GAS_LIMIT, "Gas limit is too low");
        }
    }

    let from = if !req.from.is_empty() && is_eth_hex_address(&req.from) {
        Some(client.from_hex_address(&req.from).await?)
    } else if req.from.is_empty() {
        None
    } else {
        Some(req.from.clone())
    };

    client.call_contract(&req.to, &req.data, from.as_deref(), gas).await
}

fn padded_string(s: &str) -> String {
    format!("0x{:0<64}", hex::encode(s))
}

pub struct Call {
    client: KaonClient,
}

impl Call {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }

    /// Answers for ERC-20 reads against the zero address, which stands for
    /// the native coin
    async fn native_token(&self, data: &str) -> TransformResult<Option<String>> {
        let data = remove_hex_prefix(data);
        let selector = data.get(..8).unwrap_or_default();

        let answer = match selector {
            SELECTOR_BALANCE_OF => {
                let word = data.get(32..).unwrap_or_default();
                let owner = word.get(word.len().saturating_sub(40)..).unwrap_or(word);
                balance_of(&self.client, &format!("0x{}", owner)).await?
            }
            SELECTOR_NAME | SELECTOR_SYMBOL => padded_string(NATIVE_TOKEN_SYMBOL),
            // 2^112 - 1
            SELECTOR_TOTAL_SUPPLY => format!("0x{}", "f".repeat(28)),
            SELECTOR_DECIMALS => "0x12".to_string(),
            _ => return Ok(None),
        };
        Ok(Some(answer))
    }
}

#[async_trait]
impl EthProxy for Call {
    fn method(&self) -> &str {
        "eth_call"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let call = CallRequest::from_params(req.params()?)?;

        if remove_hex_prefix(&call.to).eq_ignore_ascii_case(ZERO_ADDRESS) {
            if let Some(answer) = self.native_token(&call.data).await? {
                return Ok(Value::String(answer));
            }
        }

        let gas = quantity(&call.gas)?;
        if let Some(gas) = gas.filter(|g| *g > MAX_CALL_GAS) {
            tracing::warn!(gas, cap = MAX_CALL_GAS, "Caller gas above allowance, capping");
            return Ok(Value::String("0x".to_string()));
        }

        match call_contract(&self.client, &call, gas).await {
            Ok(resp) => Ok(Value::String(add_hex_with_length_prefix(&resp.execution_result.output))),
            Err(KaonError::InvalidAddress(_)) => Ok(Value::String("0x".to_string())),
            Err(err) => Err(err.into()),
        }
    }
}

pub struct EstimateGas {
    client: KaonClient,
}

impl EstimateGas {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

/// Used gas plus a 10% buffer, capped at `u64::MAX`
pub fn buffered_gas(gas_used: u64) -> u64 {
    let buffered = u128::from(gas_used) * 11 / 10;
    u64::try_from(buffered).unwrap_or(u64::MAX)
}

#[async_trait]
impl EthProxy for EstimateGas {
    fn method(&self) -> &str {
        "eth_estimateGas"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let call = CallRequest::from_params(req.params()?)?;

        let resp = call_contract(&self.client, &call, None).await?;
        let gas = buffered_gas(resp.execution_result.gas_used);
        tracing::debug!(used = resp.execution_result.gas_used, estimate = gas, "Estimated gas");
        Ok(Value::String(encode_u64(gas)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaon_client::transport::mock::MockTransport;
    use kaon_client::{Chain, ClientOptions, NetworkSetting};
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn client(mock: Arc<MockTransport>) -> KaonClient {
        let options = ClientOptions {
            network: NetworkSetting::Fixed(Chain::Test),
            ..Default::default()
        };
        KaonClient::new(mock, options, CancellationToken::new())
    }

    async fn call(mock: Arc<MockTransport>, params: Value) -> TransformResult<Value> {
        Call::new(client(mock))
            .request(&JsonRpcRequest::new("eth_call", params), &RequestContext::default())
            .await
    }

    #[tokio::test]
    async fn test_call_pads_output() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("fromhexaddress", json!("ar2SzdHghSgeacypPn7zfDe3qfKAEwimus"));
        mock.respond("callcontract", json!({"executionResult": {"gasUsed": 21678, "excepted": "None", "output": "0001"}}));

        let result = call(
            mock.clone(),
            json!([{"from": "0x1ce507204a6fc8fd6aa7e54d1481d30acb0dbead", "to": "0x1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "gas": "0x5208", "data": "0x06fdde03"}, "latest"]),
        )
        .await
        .unwrap();

        assert_eq!(result, json!(format!("0x{}0001", "0".repeat(60))));
        assert_eq!(
            mock.calls_to("callcontract")[0],
            json!(["1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "06fdde03", "ar2SzdHghSgeacypPn7zfDe3qfKAEwimus", 21000])
        );
    }

    #[tokio::test]
    async fn test_gas_above_allowance() {
        let mock = Arc::new(MockTransport::new());
        let result = call(mock.clone(), json!([{"to": "0x1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "gas": "0x5F5E101"}])).await;
        assert_eq!(result.unwrap(), json!("0x"));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_native_token_reads() {
        let mock = Arc::new(MockTransport::new());
        let zero = "0x0000000000000000000000000000000000000000";

        let name = call(mock.clone(), json!([{"to": zero, "data": "0x06fdde03"}])).await.unwrap();
        assert_eq!(name, json!("0x4b414f4e00000000000000000000000000000000000000000000000000000000"));
        let decimals = call(mock.clone(), json!([{"to": zero, "data": "0x313ce567"}])).await.unwrap();
        assert_eq!(decimals, json!("0x12"));
        let supply = call(mock.clone(), json!([{"to": zero, "data": "0x18160ddd"}])).await.unwrap();
        assert_eq!(supply, json!("0xffffffffffffffffffffffffffff"));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_address_is_empty_output() {
        let mock = Arc::new(MockTransport::new());
        mock.fail("callcontract", KaonError::InvalidAddress("Invalid contract address".into()));
        let result = call(mock, json!([{"to": "0x1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "data": "0x00"}])).await;
        assert_eq!(result.unwrap(), json!("0x"));
    }

    #[tokio::test]
    async fn test_estimate_adds_buffer() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("callcontract", json!({"executionResult": {"gasUsed": 216780}}));
        let proxy = EstimateGas::new(client(mock));
        let req = JsonRpcRequest::new("eth_estimateGas", json!([{"to": "0x1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "data": "0x00"}]));
        assert_eq!(proxy.request(&req, &RequestContext::default()).await.unwrap(), json!("0x3a37a"));
    }

    #[test]
    fn test_buffered_gas() {
        assert_eq!(buffered_gas(216780), 238458);
        assert_eq!(buffered_gas(0), 0);
        assert_eq!(buffered_gas(u64::MAX), u64::MAX);
        assert_eq!(buffered_gas(u64::MAX / 2), 10_145_709_240_540_253_387);
        assert!(buffered_gas(u64::MAX / 11 * 10) >= u64::MAX / 11 * 10);
    }
}
