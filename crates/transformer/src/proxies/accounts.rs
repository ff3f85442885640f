// transformer/src/proxies/accounts.rs

//! Account state and wallet keys: balances, code, storage, nonces,
//! `eth_accounts` and `eth_sign`.

use super::{param, string_param};
use crate::conversion::{block_number_by_param, block_number_by_raw_param, WEI_PER_SATOSHI};
use crate::error::{JsonRpcError, TransformResult};
use crate::eth::{JsonRpcRequest, ZERO_ADDRESS, ZERO_WORD};
use crate::registry::{EthProxy, RequestContext};
use async_trait::async_trait;
use kaon_client::{KaonClient, KaonError};
use kaon_core::{add_hex_prefix, encode_big, encode_u64, remove_hex_prefix, WORD_HEX_LEN};
use kaon_crypto::Address;
use num_bigint::BigUint;
use serde_json::Value;

/// Balance of a hex address: contract balances come from the account
/// state, wallet balances from the address index in wei.
pub(crate) async fn balance_of(client: &KaonClient, address: &str) -> TransformResult<String> {
    let address = remove_hex_prefix(address);
    if address.eq_ignore_ascii_case(ZERO_ADDRESS) {
        return Ok("0x0".to_string());
    }

    match client.get_account_info(address).await {
        Ok(info) => return Ok(encode_big(&info.balance)),
        Err(KaonError::Shutdown) => return Err(JsonRpcError::Shutdown),
        Err(err) => tracing::debug!(error = %err, address, "Not a contract, reading address balance"),
    }

    let base58 = client
        .hex_to_base58(address)
        .await
        .map_err(|e| JsonRpcError::upstream("couldn't convert address", e))?;

    match client.get_address_balance(&base58).await {
        Ok(balance) => Ok(encode_big(&(balance.balance * BigUint::from(WEI_PER_SATOSHI)))),
        Err(KaonError::InvalidAddress(_)) => Ok("0x0".to_string()),
        Err(err) => Err(JsonRpcError::upstream("couldn't get address balance", err)),
    }
}

pub struct GetBalance {
    client: KaonClient,
}

impl GetBalance {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for GetBalance {
    fn method(&self) -> &str {
        "eth_getBalance"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let address = string_param(req.params()?, 0)?;
        balance_of(&self.client, address).await.map(Value::String)
    }
}

pub struct GetCode {
    client: KaonClient,
}

impl GetCode {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for GetCode {
    fn method(&self) -> &str {
        "eth_getCode"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let address = string_param(req.params()?, 0)?;

        match self.client.get_account_info(address).await {
            Ok(info) => Ok(Value::String(add_hex_prefix(&info.code))),
            Err(KaonError::InvalidAddress(_)) => Ok(Value::String("0x".to_string())),
            Err(err) => Err(JsonRpcError::upstream("couldn't get account info", err)),
        }
    }
}

pub struct GetStorageAt {
    client: KaonClient,
}

impl GetStorageAt {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for GetStorageAt {
    fn method(&self) -> &str {
        "eth_getStorageAt"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let params = req.params()?;
        let address = string_param(params, 0)?;
        let index = string_param(params, 1)?;
        let tag = match param(params, 2) {
            Value::String(s) => s.as_str(),
            _ => "",
        };
        let block = block_number_by_param(&self.client, tag, false).await?;

        let storage = self.client.get_storage(address, Some(block), None).await?;

        let slot = format!("{:0>width$}", remove_hex_prefix(index), width = WORD_HEX_LEN);
        let value = storage
            .values()
            .find_map(|slots| slots.get(&slot))
            .map(|v| add_hex_prefix(v))
            .unwrap_or_else(|| ZERO_WORD.to_string());
        Ok(Value::String(value))
    }
}

pub struct GetTransactionCount {
    client: KaonClient,
}

impl GetTransactionCount {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for GetTransactionCount {
    fn method(&self) -> &str {
        "eth_getTransactionCount"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let params = req.params()?;
        let address = string_param(params, 0)?;
        let block = block_number_by_raw_param(&self.client, param(params, 1), true).await?;

        let count = self.client.get_transaction_count(address, Some(block)).await?;
        Ok(Value::String(encode_u64(count)))
    }
}

/// Hex addresses of the loaded wallet keys
pub struct Accounts {
    client: KaonClient,
}

impl Accounts {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for Accounts {
    fn method(&self) -> &str {
        "eth_accounts"
    }

    async fn request(&self, _req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let addresses = self
            .client
            .accounts()
            .iter()
            .map(|account| Value::String(add_hex_prefix(&account.address().to_hex())))
            .collect();
        Ok(Value::Array(addresses))
    }
}

/// Compact signature over the Kaon signed-message envelope
pub struct Sign {
    client: KaonClient,
}

impl Sign {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

/// `0x` data is hex decoded, anything else is signed as text
fn message_bytes(message: &str) -> TransformResult<Vec<u8>> {
    match message.strip_prefix("0x") {
        Some(digits) => hex::decode(digits).map_err(|e| JsonRpcError::invalid_params(format!("invalid message: {}", e))),
        None => Ok(message.as_bytes().to_vec()),
    }
}

#[async_trait]
impl EthProxy for Sign {
    fn method(&self) -> &str {
        "eth_sign"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let params = req.params()?;
        let account = remove_hex_prefix(string_param(params, 0)?);
        let message = message_bytes(string_param(params, 1)?)?;

        let address = Address::from_hex(account)
            .map_err(|_| JsonRpcError::invalid_params(format!("No such account: {}", account)))?;
        let Some(key) = self.client.accounts().find_by_address(&address) else {
            tracing::debug!(account, "Unknown account");
            return Err(JsonRpcError::invalid_params(format!("No such account: {}", account)));
        };

        let signature = key
            .sign_message(&message)
            .map_err(|e| JsonRpcError::callback(e.to_string()))?;
        tracing::debug!(account, "Signed message");
        Ok(Value::String(format!("0x{}", hex::encode(signature))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaon_client::transport::mock::MockTransport;
    use kaon_client::{Chain, ClientOptions, NetworkSetting};
    use kaon_crypto::{Account, Accounts as Keys};
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    const WIF: &str = "5JK4Gu9nxCvsCxiq9Zf3KdmA9ACza6dUn5BRLVWAYEtQabdnJ89";

    fn client(mock: Arc<MockTransport>, accounts: Keys) -> KaonClient {
        let options = ClientOptions {
            network: NetworkSetting::Fixed(Chain::Test),
            accounts,
            ..Default::default()
        };
        KaonClient::new(mock, options, CancellationToken::new())
    }

    async fn run(proxy: &dyn EthProxy, params: Value) -> TransformResult<Value> {
        proxy
            .request(&JsonRpcRequest::new(proxy.method(), params), &RequestContext::default())
            .await
    }

    #[tokio::test]
    async fn test_wallet_balance_in_wei() {
        let mock = Arc::new(MockTransport::new());
        mock.fail("getaccountinfo", KaonError::InvalidAddress("Address does not exist".into()));
        mock.respond("getaddressbalance", json!({"balance": 100000000, "received": 100000000, "immature": 0}));

        let proxy = GetBalance::new(client(mock, Keys::default()));
        let balance = run(&proxy, json!(["0x1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "latest"])).await;
        assert_eq!(balance.unwrap(), json!("0xde0b6b3a7640000"));
    }

    #[tokio::test]
    async fn test_contract_balance_is_raw() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("getaccountinfo", json!({"address": "1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "balance": 12431243, "code": "60"}));

        let proxy = GetBalance::new(client(mock.clone(), Keys::default()));
        let balance = run(&proxy, json!(["0x1e6f89d7399081b4f8f8aa1ae2805a5efff2f960"])).await;
        assert_eq!(balance.unwrap(), json!("0xbdaf8b"));

        let zero = run(&proxy, json!(["0x0000000000000000000000000000000000000000"])).await;
        assert_eq!(zero.unwrap(), json!("0x0"));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_code_of_unknown_account() {
        let mock = Arc::new(MockTransport::new());
        mock.fail("getaccountinfo", KaonError::InvalidAddress("Address does not exist".into()));
        let proxy = GetCode::new(client(mock, Keys::default()));
        assert_eq!(run(&proxy, json!(["0x00", "latest"])).await.unwrap(), json!("0x"));
    }

    #[tokio::test]
    async fn test_storage_slot_lookup() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("getblockchaininfo", json!({"blocks": 100}));
        mock.respond(
            "getstorage",
            json!({
                "e2a5a3b9ba1a6d9ac3c2f4f6e9e8c4a1c2e8b7f7c6b5a49382716d5c4b3a2910": {
                    "0000000000000000000000000000000000000000000000000000000000000001": "00000000000000000000000000000000000000000000000000000000000000ff"
                }
            }),
        );

        let proxy = GetStorageAt::new(client(mock.clone(), Keys::default()));
        let hit = run(&proxy, json!(["0x1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "0x1", "latest"])).await;
        assert_eq!(hit.unwrap(), json!("0x00000000000000000000000000000000000000000000000000000000000000ff"));
        let miss = run(&proxy, json!(["0x1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "0x2", "latest"])).await;
        assert_eq!(miss.unwrap(), json!(ZERO_WORD));
        assert_eq!(mock.calls_to("getstorage")[0], json!(["1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", 100]));
    }

    #[tokio::test]
    async fn test_accounts_and_sign() {
        let keys = Keys::new(vec![Account::from_wif(WIF).unwrap()]);
        let address = keys.iter().next().unwrap().address().to_hex();
        let kaon = client(Arc::new(MockTransport::new()), keys);

        let accounts = run(&Accounts::new(kaon.clone()), json!([])).await.unwrap();
        assert_eq!(accounts, json!([format!("0x{}", address)]));

        let sign = Sign::new(kaon);
        let signature = run(&sign, json!([format!("0x{}", address), "0x68656c6c6f"])).await.unwrap();
        assert_eq!(signature.as_str().unwrap().len(), 2 + 130);

        let unknown = run(&sign, json!(["0x1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "0x00"])).await;
        assert_eq!(
            unknown.unwrap_err(),
            JsonRpcError::invalid_params("No such account: 1e6f89d7399081b4f8f8aa1ae2805a5efff2f960")
        );
    }
}
