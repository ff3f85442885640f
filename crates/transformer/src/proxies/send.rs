// transformer/src/proxies/send.rs

//! Transaction submission: `eth_sendTransaction`, `eth_signTransaction`,
//! `eth_sendRawTransaction`.

use super::{param, quantity, string_param};
use crate::conversion::{
    eth_gas_price_to_kaon, eth_value_to_amount, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE_WEI, MINIMUM_GAS_LIMIT,
};
use crate::error::{JsonRpcError, TransformResult};
use crate::eth::JsonRpcRequest;
use crate::registry::{EthProxy, RequestContext};
use async_trait::async_trait;
use kaon_client::types::{CreateContractRequest, RawTxInput, SendToAddressRequest, SendToContractRequest};
use kaon_client::KaonClient;
use kaon_core::{add_hex_prefix, encode_u64, is_eth_hex_address, remove_hex_prefix, Amount};
use kaon_crypto::Address;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// The three shapes a transaction request can take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    CreateContract,
    SendEther,
    CallContract,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SendTransactionRequest {
    pub from: String,
    pub to: String,
    pub gas: Value,
    #[serde(rename = "gasPrice")]
    pub gas_price: Value,
    pub value: String,
    #[serde(alias = "input")]
    pub data: String,
    pub nonce: Value,
}

impl SendTransactionRequest {
    fn from_params(params: &[Value]) -> TransformResult<Self> {
        match param(params, 0) {
            obj @ Value::Object(_) => serde_json::from_value(obj.clone())
                .map_err(|e| JsonRpcError::invalid_params(format!("invalid argument 0: {}", e))),
            _ => Err(JsonRpcError::invalid_params("invalid argument 0: transaction object expected")),
        }
    }

    /// Exactly one shape applies, or none
    pub fn kind(&self) -> Option<TransactionKind> {
        if self.to.is_empty() && !self.data.is_empty() {
            Some(TransactionKind::CreateContract)
        } else if !self.to.is_empty() && !self.from.is_empty() && !self.value.is_empty() && self.data.is_empty() {
            Some(TransactionKind::SendEther)
        } else if !self.to.is_empty() && !self.data.is_empty() {
            Some(TransactionKind::CallContract)
        } else {
            None
        }
    }

    fn gas_limit(&self) -> TransformResult<u64> {
        let gas = quantity(&self.gas)?.unwrap_or(DEFAULT_GAS_LIMIT);
        if gas < MINIMUM_GAS_LIMIT {
            tracing::warn!(gas, minimum = MINIMUM_GAS_LIMIT, "Gas limit is too low");
        }
        Ok(gas)
    }

    /// KAON per gas
    fn gas_price(&self) -> TransformResult<String> {
        let wei = match &self.gas_price {
            Value::Null => encode_u64(DEFAULT_GAS_PRICE_WEI),
            Value::String(s) if s.is_empty() => encode_u64(DEFAULT_GAS_PRICE_WEI),
            Value::String(s) => s.clone(),
            Value::Number(n) => n
                .as_u64()
                .map(encode_u64)
                .ok_or_else(|| JsonRpcError::invalid_params(format!("invalid gas price {}", n)))?,
            other => return Err(JsonRpcError::invalid_params(format!("invalid gas price {}", other))),
        };
        eth_gas_price_to_kaon(Some(&wei))
    }

    fn amount(&self) -> TransformResult<Amount> {
        eth_value_to_amount(Some(&self.value), Amount::zero())
    }
}

/// Base58 form of a hex address; anything else passes through
async fn kaon_address(client: &KaonClient, address: &str) -> TransformResult<String> {
    if address.is_empty() || !is_eth_hex_address(address) {
        return Ok(address.to_string());
    }
    client
        .from_hex_address(address)
        .await
        .map_err(|e| JsonRpcError::upstream("couldn't convert address", e))
}

fn unknown_operation(method: &str) -> JsonRpcError {
    tracing::debug!(method, "Transaction is an unknown request");
    JsonRpcError::invalid_params("Unknown operation")
}

pub struct SendTransaction {
    client: KaonClient,
}

impl SendTransaction {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }

    async fn send(&self, tx: &SendTransactionRequest, kind: TransactionKind) -> TransformResult<String> {
        let txid = match kind {
            TransactionKind::CreateContract => {
                let req = CreateContractRequest {
                    bytecode: remove_hex_prefix(&tx.data).to_string(),
                    gas_limit: tx.gas_limit()?,
                    gas_price: tx.gas_price()?,
                    sender_address: kaon_address(&self.client, &tx.from).await?,
                };
                self.client.create_contract(&req).await?.txid
            }
            TransactionKind::SendEther => {
                let req = SendToAddressRequest {
                    address: kaon_address(&self.client, &tx.to).await?,
                    amount: tx.amount()?,
                    sender_address: kaon_address(&self.client, &tx.from).await?,
                };
                self.client.send_to_address(&req).await?
            }
            TransactionKind::CallContract => {
                let req = SendToContractRequest {
                    contract_address: remove_hex_prefix(&tx.to).to_string(),
                    datahex: remove_hex_prefix(&tx.data).to_string(),
                    amount: tx.amount()?,
                    gas_limit: tx.gas_limit()?,
                    gas_price: tx.gas_price()?,
                    sender_address: kaon_address(&self.client, &tx.from).await?,
                };
                self.client.send_to_contract(&req).await?.txid
            }
        };
        Ok(txid)
    }
}

#[async_trait]
impl EthProxy for SendTransaction {
    fn method(&self) -> &str {
        "eth_sendTransaction"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let tx = SendTransactionRequest::from_params(req.params()?)?;
        let kind = tx.kind().ok_or_else(|| unknown_operation(self.method()))?;
        tracing::debug!(?kind, "Sending transaction");

        let txid = self.send(&tx, kind).await?;
        self.client.generate_if_possible().await;
        Ok(Value::String(add_hex_prefix(&txid)))
    }
}

/// Builds and signs a raw transaction from the sender's own UTXOs
pub struct SignTransaction {
    client: KaonClient,
}

impl SignTransaction {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }

    /// Walk the sender's UTXOs until `needed` is covered
    async fn select_utxos(&self, from: &str, needed: Amount) -> TransformResult<(Vec<RawTxInput>, Amount)> {
        let base58 = self
            .client
            .hex_to_base58(from)
            .await
            .map_err(|e| JsonRpcError::upstream("couldn't convert sender address", e))?;
        let utxos = self.client.get_address_utxos(&[base58]).await?;

        let mut inputs = Vec::new();
        let mut total = Amount::zero();
        for utxo in utxos {
            total = total + utxo.satoshis;
            inputs.push(RawTxInput {
                txid: utxo.txid,
                vout: utxo.output_index,
            });
            if total >= needed {
                return Ok((inputs, total));
            }
        }

        Err(JsonRpcError::callback("Insufficient UTXO value attempted to be sent"))
    }

    async fn inputs_and_change(&self, from: &str, needed: Amount) -> TransformResult<(Vec<RawTxInput>, Amount)> {
        let (inputs, balance) = self.select_utxos(from, needed).await?;
        if balance < needed {
            return Err(JsonRpcError::callback("insufficient funds to create fee to chain"));
        }
        Ok((inputs, balance - needed))
    }

    async fn sign(&self, inputs: &[RawTxInput], outputs: Value) -> TransformResult<String> {
        let raw = self.client.create_raw_transaction(inputs, outputs).await?;
        let signed = self.client.sign_raw_transaction_with_wallet(&raw).await?;
        if !signed.complete {
            return Err(JsonRpcError::callback(
                "something went wrong with signing the transaction; transaction incomplete",
            ));
        }
        Ok(add_hex_prefix(&signed.hex))
    }
}

/// Gas fee plus value, in KAON at wei scale
fn needed_amount(value: Amount, gas_limit: u64, gas_price: &str) -> TransformResult<Amount> {
    let price: Decimal = gas_price
        .parse()
        .map_err(|_| JsonRpcError::invalid_params(format!("invalid gas price {}", gas_price)))?;
    let fee = Decimal::from(gas_limit)
        .checked_mul(price)
        .and_then(|fee| Amount::from_kaon(fee).ok())
        .ok_or_else(|| JsonRpcError::invalid_params("gas fee overflow"))?;
    value
        .checked_add(&fee)
        .ok_or_else(|| JsonRpcError::invalid_params("amount overflow"))
}

fn output_amount(amount: Amount) -> Value {
    Value::String(amount.to_kaon().normalize().to_string())
}

#[async_trait]
impl EthProxy for SignTransaction {
    fn method(&self) -> &str {
        "eth_signTransaction"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let tx = SendTransactionRequest::from_params(req.params()?)?;
        let kind = tx.kind().ok_or_else(|| unknown_operation(self.method()))?;
        tracing::debug!(?kind, "Signing transaction");

        let signed = match kind {
            TransactionKind::CreateContract => {
                let gas_limit = tx.gas_limit()?;
                let gas_price = tx.gas_price()?;
                let sender = kaon_address(&self.client, &tx.from).await?;
                let needed = needed_amount(Amount::zero(), gas_limit, &gas_price)?;
                let (inputs, change) = self.inputs_and_change(&tx.from, needed).await?;

                let create = CreateContractRequest {
                    bytecode: remove_hex_prefix(&tx.data).to_string(),
                    gas_limit,
                    gas_price,
                    sender_address: sender.clone(),
                };
                let outputs = json!([{ "contract": create.to_raw_output() }, { sender: output_amount(change) }]);
                self.sign(&inputs, outputs).await?
            }
            TransactionKind::SendEther => {
                let to = kaon_address(&self.client, &tx.to).await?;
                let from = kaon_address(&self.client, &tx.from).await?;
                let amount = tx.amount()?;
                let (inputs, change) = self.inputs_and_change(&tx.from, amount).await?;

                let mut outputs = Map::new();
                outputs.insert(to, output_amount(amount));
                outputs.insert(from, output_amount(change));
                self.sign(&inputs, Value::Object(outputs)).await?
            }
            TransactionKind::CallContract => {
                let account = remove_hex_prefix(&tx.from).to_ascii_lowercase();
                let known = Address::from_hex(&account)
                    .ok()
                    .and_then(|address| self.client.accounts().find_by_address(&address).cloned());
                if known.is_none() {
                    return Err(JsonRpcError::invalid_params(format!("No such account: {}", account)));
                }

                let gas_limit = tx.gas_limit()?;
                let gas_price = tx.gas_price()?;
                let amount = tx.amount()?;
                let needed = needed_amount(amount, gas_limit, &gas_price)?;
                let (inputs, change) = self.inputs_and_change(&tx.from, needed).await?;

                let call = SendToContractRequest {
                    contract_address: remove_hex_prefix(&tx.to).to_string(),
                    datahex: remove_hex_prefix(&tx.data).to_string(),
                    amount,
                    gas_limit,
                    gas_price,
                    sender_address: kaon_address(&self.client, &tx.from).await?,
                };
                let outputs = json!([
                    { "contract": call.to_raw_output() },
                    { call.sender_address.clone(): output_amount(change) }
                ]);
                self.sign(&inputs, outputs).await?
            }
        };

        Ok(Value::String(signed))
    }
}

pub struct SendRawTransaction {
    client: KaonClient,
}

impl SendRawTransaction {
    pub fn new(client: KaonClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EthProxy for SendRawTransaction {
    fn method(&self) -> &str {
        "eth_sendRawTransaction"
    }

    async fn request(&self, req: &JsonRpcRequest, _ctx: &RequestContext) -> TransformResult<Value> {
        let raw = string_param(req.params()?, 0)?;
        if remove_hex_prefix(raw).is_empty() {
            return Err(JsonRpcError::invalid_params("empty raw transaction"));
        }

        let result = self.client.send_raw_transaction(raw).await?;
        Ok(match result {
            Value::String(txid) => Value::String(add_hex_prefix(&txid)),
            other => other,
        })
    }
}
