// kaon-client/src/methods.rs

//! Typed wrappers over the native methods the gateway uses.

use crate::error::{KaonError, KaonResult};
use crate::types::*;
use crate::KaonClient;
use kaon_core::codec::remove_hex_prefix;
use kaon_crypto::Address;
use serde_json::{json, Value};

impl KaonClient {
    pub async fn get_block_count(&self) -> KaonResult<u64> {
        self.request("getblockcount", json!([])).await
    }

    pub async fn get_block_hash(&self, height: u64) -> KaonResult<String> {
        self.request("getblockhash", json!([height])).await
    }

    pub async fn get_block_header(&self, hash: &str) -> KaonResult<BlockHeader> {
        self.request("getblockheader", json!([hash, true])).await
    }

    /// Verbosity 1 lists transaction ids, 2 embeds the transactions
    pub async fn get_block(&self, hash: &str, verbosity: u8) -> KaonResult<Block> {
        self.request("getblock", json!([hash, verbosity])).await
    }

    pub async fn get_blockchain_info(&self) -> KaonResult<BlockchainInfo> {
        self.request("getblockchaininfo", json!([])).await
    }

    pub async fn get_network_info(&self) -> KaonResult<NetworkInfo> {
        self.request("getnetworkinfo", json!([])).await
    }

    pub async fn get_peer_info(&self) -> KaonResult<Vec<PeerInfo>> {
        self.request("getpeerinfo", json!([])).await
    }

    pub async fn get_mining_info(&self) -> KaonResult<MiningInfo> {
        self.request("getmininginfo", json!([])).await
    }

    pub async fn get_staking_info(&self) -> KaonResult<StakingInfo> {
        self.request("getstakinginfo", json!([])).await
    }

    pub async fn get_gas_price(&self) -> KaonResult<u64> {
        let raw = self.request_raw("getgasprice", json!([])).await?;
        match &raw {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .ok_or_else(|| KaonError::decode("getgasprice", raw.clone())),
            Value::String(s) => s.parse().map_err(|e| KaonError::decode("getgasprice", e)),
            other => Err(KaonError::decode("getgasprice", other)),
        }
    }

    /// `to` and `data` are hex, with or without `0x`
    pub async fn call_contract(
        &self,
        to: &str,
        data: &str,
        from: Option<&str>,
        gas_limit: Option<u64>,
    ) -> KaonResult<CallContractResponse> {
        let mut params = vec![json!(remove_hex_prefix(to)), json!(remove_hex_prefix(data))];
        if from.is_some() || gas_limit.is_some() {
            params.push(json!(from.unwrap_or_default()));
        }
        if let Some(gas) = gas_limit {
            params.push(json!(gas));
        }
        self.request("callcontract", Value::Array(params)).await
    }

    /// Receipts in range, each log numbered by its position
    pub async fn search_logs(&self, req: &SearchLogsRequest) -> KaonResult<Vec<TransactionReceipt>> {
        let receipts: Vec<TransactionReceipt> = self.request("searchlogs", req.to_params()).await?;
        Ok(receipts.into_iter().map(TransactionReceipt::index_logs).collect())
    }

    pub async fn wait_for_logs(&self, req: &WaitForLogsRequest) -> KaonResult<WaitForLogsResponse> {
        self.request("waitforlogs", req.to_params()).await
    }

    /// The node answers with an array; anything but one receipt is empty
    pub async fn get_transaction_receipt(&self, hash: &str) -> KaonResult<TransactionReceipt> {
        let mut receipts: Vec<TransactionReceipt> = self
            .request("gettransactionreceipt", json!([remove_hex_prefix(hash)]))
            .await?;
        if receipts.len() != 1 {
            return Err(KaonError::EmptyResponse);
        }
        Ok(receipts.remove(0).index_logs())
    }

    pub async fn get_raw_transaction(&self, txid: &str) -> KaonResult<TransactionDetails> {
        self.request("getrawtransaction", json!([remove_hex_prefix(txid), true])).await
    }

    pub async fn decode_raw_transaction(&self, hex: &str) -> KaonResult<TransactionDetails> {
        self.request("decoderawtransaction", json!([remove_hex_prefix(hex)])).await
    }

    /// Addresses are base58
    pub async fn get_address_utxos(&self, addresses: &[String]) -> KaonResult<Vec<Utxo>> {
        self.request("getaddressutxos", json!([{ "addresses": addresses }])).await
    }

    pub async fn get_address_balance(&self, address: &str) -> KaonResult<AddressBalance> {
        self.request("getaddressbalance", json!([address])).await
    }

    /// `address` is hex without `0x`
    pub async fn get_account_info(&self, address: &str) -> KaonResult<AccountInfo> {
        self.request("getaccountinfo", json!([remove_hex_prefix(address)])).await
    }

    pub async fn get_storage(&self, address: &str, block: Option<u64>, index: Option<u64>) -> KaonResult<StorageResponse> {
        let mut params = vec![json!(remove_hex_prefix(address))];
        if block.is_some() || index.is_some() {
            params.push(json!(block));
        }
        if let Some(index) = index {
            params.push(json!(index));
        }
        self.request("getstorage", Value::Array(params)).await
    }

    pub async fn get_transaction_count(&self, address: &str, block: Option<u64>) -> KaonResult<u64> {
        let mut params = vec![json!(remove_hex_prefix(address))];
        if let Some(block) = block {
            params.push(json!(block));
        }
        self.request("gettransactioncount", Value::Array(params)).await
    }

    /// Base58 address of a hex key id
    pub async fn from_hex_address(&self, hex: &str) -> KaonResult<String> {
        self.request("fromhexaddress", json!([remove_hex_prefix(hex)])).await
    }

    /// Hex key id of a base58 address
    pub async fn get_hex_address(&self, base58: &str) -> KaonResult<String> {
        self.request("gethexaddress", json!([base58])).await
    }

    /// Local conversion first; the node handles the script types we can't
    pub async fn base58_to_hex(&self, base58: &str) -> KaonResult<String> {
        match Address::from_base58(base58) {
            Ok(address) => Ok(address.to_hex()),
            Err(_) => self.get_hex_address(base58).await,
        }
    }

    /// Local conversion with the detected chain's prefix, node fallback
    pub async fn hex_to_base58(&self, hex: &str) -> KaonResult<String> {
        let address = Address::from_hex(hex).map_err(|e| KaonError::InvalidAddress(e.to_string()))?;
        match self.chain().await?.address_prefix() {
            Ok(prefix) => Ok(address.to_base58(prefix)),
            Err(_) => self.from_hex_address(&address.to_hex()).await,
        }
    }

    pub async fn send_raw_transaction(&self, hex: &str) -> KaonResult<Value> {
        self.request_raw("sendrawtransaction", json!([remove_hex_prefix(hex)])).await
    }

    /// Returns the txid
    pub async fn send_to_address(&self, req: &SendToAddressRequest) -> KaonResult<String> {
        self.request("sendtoaddress", req.to_params()).await
    }

    pub async fn send_to_contract(&self, req: &SendToContractRequest) -> KaonResult<SendToContractResponse> {
        self.request("sendtocontract", req.to_params()).await
    }

    pub async fn create_contract(&self, req: &CreateContractRequest) -> KaonResult<CreateContractResponse> {
        self.request("createcontract", req.to_params()).await
    }

    /// Unsigned transaction hex
    pub async fn create_raw_transaction(&self, inputs: &[RawTxInput], outputs: Value) -> KaonResult<String> {
        self.request("createrawtransaction", json!([inputs, outputs])).await
    }

    pub async fn sign_raw_transaction_with_wallet(&self, hex: &str) -> KaonResult<SignRawTxResponse> {
        self.request("signrawtransactionwithwallet", json!([hex])).await
    }

    /// Mines `blocks` blocks paying `address`, returns their hashes
    pub async fn generate_to_address(&self, blocks: u64, address: &str, max_tries: Option<u64>) -> KaonResult<Vec<String>> {
        let mut params = vec![json!(blocks), json!(address)];
        if let Some(max_tries) = max_tries {
            params.push(json!(max_tries));
        }
        self.request("generatetoaddress", Value::Array(params)).await
    }

    /// Mine one block on regtest so sent transactions confirm.
    /// Failures are logged, never returned.
    pub async fn generate_if_possible(&self) {
        if !self.can_generate().await {
            return;
        }

        let address = match self.generation_address().await {
            Some(address) => address,
            None => {
                tracing::debug!("No address to mine to, skipping block generation");
                return;
            }
        };

        if let Err(err) = self.generate_to_address(1, &address, None).await {
            tracing::error!(error = %err, "Error generating new block");
        }
    }

    /// Configured reward address, else the first loaded account
    async fn generation_address(&self) -> Option<String> {
        if let Some(address) = &self.options().generate_to_address {
            return Some(address.clone());
        }
        let account = self.accounts().iter().next()?;
        let prefix = self.chain().await.ok()?.address_prefix().ok()?;
        Some(account.address().to_base58(prefix))
    }
}
