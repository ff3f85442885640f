// kaon-client/src/lib.rs

//! Client for the Kaon node RPC
//!
//! This crate provides:
//! - A `Transport` trait with an HTTP implementation and a test mock
//! - Error classification of node answers
//! - Fixed-delay retry of transient failures
//! - Chain auto-detection
//! - Typed request and response shapes for the native methods

pub mod error;
pub mod transport;
pub mod retry;
pub mod chain;
pub mod types;
pub mod methods;

pub use chain::{Chain, ChainDetector, DetectionState, NetworkSetting};
pub use error::{KaonError, KaonResult};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Transport};

use kaon_crypto::Accounts;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Stake outputs younger than this many blocks are immature
pub const DEFAULT_MATURE_BLOCK_HEIGHT: u64 = 21;

/// Base interval of the chain detection backoff
pub const DETECTION_INTERVAL: Duration = Duration::from_millis(250);

/// Gateway-side settings the proxies read through the client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub network: NetworkSetting,
    pub accounts: Accounts,
    /// Reward address for regtest auto-mining, base58
    pub generate_to_address: Option<String>,
    pub mature_block_height: u64,
    pub ignore_unknown_transactions: bool,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            network: NetworkSetting::Auto,
            accounts: Accounts::default(),
            generate_to_address: None,
            mature_block_height: DEFAULT_MATURE_BLOCK_HEIGHT,
            ignore_unknown_transactions: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// Shared handle to the node, cheap to clone
#[derive(Clone)]
pub struct KaonClient {
    transport: Arc<dyn Transport>,
    detector: ChainDetector,
    shutdown: CancellationToken,
    options: Arc<ClientOptions>,
}

impl KaonClient {
    pub fn new(transport: Arc<dyn Transport>, options: ClientOptions, shutdown: CancellationToken) -> Self {
        let detector = ChainDetector::new(
            options.network.clone(),
            transport.clone(),
            shutdown.clone(),
            DETECTION_INTERVAL,
        );
        Self {
            transport,
            detector,
            shutdown,
            options: Arc::new(options),
        }
    }

    /// Call `method` with positional `params`, retrying transient failures
    pub async fn request_raw(&self, method: &str, params: Value) -> KaonResult<Value> {
        self.options
            .retry
            .run(&self.shutdown, || self.transport.call(method, params.clone()))
            .await
    }

    /// Like `request_raw`, decoding the result
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> KaonResult<T> {
        let raw = self.request_raw(method, params).await?;
        serde_json::from_value(raw).map_err(|e| KaonError::decode(method, e))
    }

    pub async fn chain(&self) -> KaonResult<Chain> {
        self.detector.chain().await
    }

    pub async fn chain_id(&self) -> KaonResult<u64> {
        Ok(self.chain().await?.chain_id())
    }

    pub async fn can_generate(&self) -> bool {
        matches!(self.chain().await, Ok(chain) if chain.can_generate())
    }

    pub fn detector(&self) -> &ChainDetector {
        &self.detector
    }

    pub fn accounts(&self) -> &Accounts {
        &self.options.accounts
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn mature_block_height(&self) -> u64 {
        self.options.mature_block_height
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use serde_json::json;
    use std::time::Instant;

    fn client(mock: Arc<MockTransport>) -> KaonClient {
        let options = ClientOptions {
            network: NetworkSetting::Fixed(Chain::RegTest),
            ..Default::default()
        };
        KaonClient::new(mock, options, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_call_contract_retries_work_queue_depth() {
        let mock = Arc::new(MockTransport::new());
        for _ in 0..4 {
            mock.push("callcontract", Err(KaonError::WorkQueueDepth));
        }
        mock.respond(
            "callcontract",
            json!({"address": "1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "executionResult": {"gasUsed": 21678}}),
        );

        let started = Instant::now();
        let resp = client(mock.clone())
            .call_contract("1e6f89d7399081b4f8f8aa1ae2805a5efff2f960", "", None, None)
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(resp.execution_result.gas_used, 21678);
        assert_eq!(mock.calls_to("callcontract").len(), 5);
    }

    #[tokio::test]
    async fn test_decode_error_names_method() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("getblockcount", json!("not a number"));
        let err = client(mock).get_block_count().await.unwrap_err();
        assert!(matches!(err, KaonError::Decode { ref method, .. } if method == "getblockcount"));
    }
}
