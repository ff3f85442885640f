// rpc/src/health.rs

//! Liveness checks served on `/live` and `/ready`.

use crate::analytics::Analytics;
use kaon_client::{Chain, KaonClient, KaonError};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Receipt looked up to see whether the node indexes log events
const PROBE_TRANSACTION: &str = "9d37c33f92231cfc1a099029543f54e5996baaf7235e79dfd2e72c7bbeb96683";

const CHAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Block heights lost before the drop is treated as a real problem
const LOST_BLOCKS_THRESHOLD: u64 = 10;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HealthError {
    #[error("kaond has no connections")]
    NoConnections,

    #[error("Cannot detect chain kaond is connected to")]
    UnknownChain,

    #[error("-logevents might not be enabled: {0}")]
    LogEventsDisabled(String),

    #[error("Block syncing seems stalled")]
    SyncStalled,

    #[error("Lost a lot of blocks, expected block height to be higher")]
    LostManyBlocks,

    #[error("Lost a few blocks, expected block height to be higher")]
    LostFewBlocks,

    #[error("{0} request success rate is {1}<{2}")]
    LowSuccessRate(&'static str, f32, f32),

    #[error("{0}")]
    Kaond(String),
}

impl From<KaonError> for HealthError {
    fn from(err: KaonError) -> Self {
        HealthError::Kaond(err.to_string())
    }
}

/// Height tracking between `kaond-blocks-syncing` runs
#[derive(Debug, Default)]
struct SyncState {
    last_block: u64,
    next_check: Option<Instant>,
    status: Option<HealthError>,
}

/// Outcome of every check, by name
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub checks: Vec<(&'static str, Result<(), HealthError>)>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|(_, result)| result.is_ok())
    }

    /// `{"check": "OK" | "error text"}`
    pub fn to_json(&self) -> Value {
        let checks: Map<String, Value> = self
            .checks
            .iter()
            .map(|(name, result)| {
                let status = match result {
                    Ok(()) => "OK".to_string(),
                    Err(err) => err.to_string(),
                };
                (name.to_string(), Value::String(status))
            })
            .collect();
        Value::Object(checks)
    }
}

pub struct HealthChecker {
    client: KaonClient,
    kaon_analytics: Arc<Analytics>,
    eth_analytics: Arc<Analytics>,
    /// Minimum success rate, 0..=100
    percent: u32,
    sync: Mutex<SyncState>,
}

impl HealthChecker {
    pub fn new(client: KaonClient, kaon_analytics: Arc<Analytics>, eth_analytics: Arc<Analytics>, percent: u32) -> Self {
        Self {
            client,
            kaon_analytics,
            eth_analytics,
            percent,
            sync: Mutex::new(SyncState::default()),
        }
    }

    pub async fn report(&self) -> HealthReport {
        let checks = vec![
            ("kaond-connection", self.check_connection().await),
            ("kaond-logevents-enabled", self.check_log_events().await),
            ("kaond-blocks-syncing", self.check_blocks_syncing().await),
            ("kaond-error-rate", self.check_rate("kaond", &self.kaon_analytics)),
            ("ethrpcgate-error-rate", self.check_rate("client eth", &self.eth_analytics)),
        ];
        for (name, result) in &checks {
            if let Err(err) = result {
                tracing::warn!(check = name, error = %err, "Liveness check failed");
            }
        }
        HealthReport { checks }
    }

    async fn check_connection(&self) -> Result<(), HealthError> {
        let info = self.client.get_network_info().await.map_err(|e| {
            tracing::debug!(error = %e, "kaond getnetworkinfo errored");
            HealthError::from(e)
        })?;

        let chain = match tokio::time::timeout(CHAIN_TIMEOUT, self.client.chain()).await {
            Ok(Ok(chain)) => chain,
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => return Err(HealthError::UnknownChain),
        };

        // Regtest runs without peers
        if chain == Chain::RegTest {
            return Ok(());
        }
        if info.connections == 0 {
            return Err(HealthError::NoConnections);
        }
        Ok(())
    }

    async fn check_log_events(&self) -> Result<(), HealthError> {
        match self.client.get_transaction_receipt(PROBE_TRANSACTION).await {
            Err(KaonError::InternalError(message)) => Err(HealthError::LogEventsDisabled(message)),
            _ => Ok(()),
        }
    }

    /// Cached between runs; how long depends on what the last run saw
    async fn check_blocks_syncing(&self) -> Result<(), HealthError> {
        let mut state = self.sync.lock().await;
        let now = Instant::now();
        if let Some(next) = state.next_check {
            if next > now {
                return state.status.clone().map_or(Ok(()), Err);
            }
        }

        let blocks = self.client.get_blockchain_info().await?.blocks;

        let (status, recheck) = if blocks == state.last_block {
            (Some(HealthError::SyncStalled), Duration::from_secs(15))
        } else if blocks < state.last_block {
            if state.last_block - blocks > LOST_BLOCKS_THRESHOLD {
                state.last_block = 0;
                (Some(HealthError::LostManyBlocks), Duration::from_secs(60))
            } else {
                (Some(HealthError::LostFewBlocks), Duration::from_secs(10))
            }
        } else {
            state.last_block = blocks;
            (None, Duration::from_secs(90))
        };

        state.next_check = Some(now + recheck);
        state.status = status;
        state.status.clone().map_or(Ok(()), Err)
    }

    fn check_rate(&self, who: &'static str, analytics: &Analytics) -> Result<(), HealthError> {
        let minimum = self.percent as f32 / 100.0;
        let rate = analytics.success_rate();
        if rate < minimum {
            return Err(HealthError::LowSuccessRate(who, rate, minimum));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaon_client::transport::mock::MockTransport;
    use kaon_client::{ClientOptions, NetworkSetting};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn checker(mock: Arc<MockTransport>, chain: Chain) -> (HealthChecker, Arc<Analytics>) {
        let options = ClientOptions {
            network: NetworkSetting::Fixed(chain),
            ..Default::default()
        };
        let client = KaonClient::new(mock, options, CancellationToken::new());
        let eth = Arc::new(Analytics::new(10));
        (HealthChecker::new(client, Arc::new(Analytics::new(10)), eth.clone(), 80), eth)
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_sync_cache() {
        let mock = Arc::new(MockTransport::new());
        mock.push("getblockchaininfo", Ok(json!({"blocks": 100})));
        mock.push("getblockchaininfo", Ok(json!({"blocks": 100})));
        mock.push("getblockchaininfo", Ok(json!({"blocks": 95})));
        mock.push("getblockchaininfo", Ok(json!({"blocks": 50})));
        let (health, _) = checker(mock.clone(), Chain::Main);

        assert_eq!(health.check_blocks_syncing().await, Ok(()));
        // cached for 90s
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(health.check_blocks_syncing().await, Ok(()));
        assert_eq!(mock.calls_to("getblockchaininfo").len(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(health.check_blocks_syncing().await, Err(HealthError::SyncStalled));

        tokio::time::advance(Duration::from_secs(16)).await;
        assert_eq!(health.check_blocks_syncing().await, Err(HealthError::LostFewBlocks));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(health.check_blocks_syncing().await, Err(HealthError::LostManyBlocks));
        assert_eq!(mock.calls_to("getblockchaininfo").len(), 4);
    }

    #[tokio::test]
    async fn test_connection_check() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("getnetworkinfo", json!({"connections": 0, "networkactive": true}));

        let (main, _) = checker(mock.clone(), Chain::Main);
        assert_eq!(main.check_connection().await, Err(HealthError::NoConnections));

        let (regtest, _) = checker(mock, Chain::RegTest);
        assert_eq!(regtest.check_connection().await, Ok(()));
    }

    #[tokio::test]
    async fn test_log_events_check() {
        let mock = Arc::new(MockTransport::new());
        mock.fail("gettransactionreceipt", KaonError::InternalError("Internal error".into()));
        let (health, _) = checker(mock, Chain::Main);
        assert!(matches!(
            health.check_log_events().await,
            Err(HealthError::LogEventsDisabled(_))
        ));
    }

    #[test]
    fn test_error_rate_uses_fraction() {
        let mock = Arc::new(MockTransport::new());
        let (health, eth) = checker(mock, Chain::Main);
        for _ in 0..8 {
            eth.success();
        }
        eth.failure();
        eth.failure();
        assert_eq!(health.check_rate("client eth", &eth), Ok(()));

        eth.failure();
        assert!(health.check_rate("client eth", &eth).is_err());
    }

    #[tokio::test]
    async fn test_report_json() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("getnetworkinfo", json!({"connections": 3}));
        mock.respond("gettransactionreceipt", json!([]));
        mock.respond("getblockchaininfo", json!({"blocks": 7}));
        let (health, _) = checker(mock, Chain::Main);

        let report = health.report().await;
        assert!(report.is_healthy());
        assert_eq!(report.to_json()["kaond-blocks-syncing"], json!("OK"));
        assert_eq!(report.to_json().as_object().unwrap().len(), 5);
    }
}
